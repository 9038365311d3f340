// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Software implementations of every `ot-hil` trait, plus a shared-medium
//! multi-`Instance` harness, for exercising `ot-core` on a development
//! host without real 802.15.4 hardware.
//!
//! Mirrors the role a Tock board crate plays for `capsules-extra` — one
//! concrete peripheral implementation per HIL trait — except every
//! "peripheral" here is software: a broadcast medium standing in for the
//! radio, a `Cell<u32>`-backed clock the test drives by hand, and an
//! in-memory map standing in for flash-backed settings.

pub mod clock;
pub mod medium;
pub mod radio;
pub mod rng;
pub mod settings;

pub use clock::{SimAlarm, SimClock};
pub use medium::Medium;
pub use radio::SoftwareRadio;
pub use rng::SimRng;
pub use settings::InMemorySettings;

use ot_core::instance::Instance;
use ot_core::crypto::SoftwareAesCcm;

/// The concrete `Instance` type every integration test drives.
pub type SimInstance = Instance<SoftwareRadio, SoftwareAesCcm, SimAlarm, SimRng, InMemorySettings>;
