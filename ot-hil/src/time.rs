// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Millisecond-resolution time, modeled on `kernel::hil::time::{Time, Alarm,
//! AlarmClient}` as used by `capsules/core/src/virtualizers/virtual_alarm.rs`.
//!
//! The scheduler (`ot_core::scheduler`) only ever deals in [`Millis`];
//! a platform's `Alarm` implementation is responsible for converting its
//! own tick frequency to milliseconds in `Time::now`.

/// A point in time, in milliseconds, represented modulo 2^32.
///
/// Comparisons must go through [`Millis::has_elapsed`] rather than a plain
/// integer comparison: deadlines wrap around after ~49.7 days, and a
/// signed-delta comparison keeps that wraparound invisible within any
/// 2^31 ms (~24.8 day) window, matching the scheduler's `alarm_at`
/// contract.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Millis(pub u32);

impl Millis {
    pub const ZERO: Millis = Millis(0);

    pub fn new(ms: u32) -> Self {
        Millis(ms)
    }

    /// `self + dt_ms`, wrapping at 2^32.
    pub fn wrapping_add(self, dt_ms: u32) -> Self {
        Millis(self.0.wrapping_add(dt_ms))
    }

    /// `self - other`, interpreted as a signed delta within a 2^31 window.
    pub fn signed_delta(self, other: Millis) -> i32 {
        self.0.wrapping_sub(other.0) as i32
    }

    /// Whether `self` is at or after `deadline`, tolerating 2^32 wraparound.
    pub fn has_elapsed(self, deadline: Millis) -> bool {
        self.signed_delta(deadline) >= 0
    }

    /// Whether `self` is strictly before `other`, tolerating wraparound.
    pub fn is_before(self, other: Millis) -> bool {
        self.signed_delta(other) < 0
    }
}

/// A free-running clock. A platform provides one implementation backed by
/// its timer peripheral; `ot-sim` provides a software clock driven by the
/// test harness.
pub trait Time {
    fn now(&self) -> Millis;
}

/// Callback delivered when an armed alarm's deadline is reached.
pub trait AlarmClient {
    fn alarm(&mut self);
}

/// A single oneshot hardware alarm. `ot-core`'s scheduler virtualizes many
/// logical timers on top of one `Alarm`, the way `VirtualMuxAlarm`
/// virtualizes many virtual alarms on top of one physical alarm in the
/// teacher.
pub trait Alarm: Time {
    /// Arm the alarm to fire at `reference.wrapping_add(dt_ms)`.
    fn set_alarm(&mut self, reference: Millis, dt_ms: u32);
    /// The currently-armed deadline, if any.
    fn get_alarm(&self) -> Option<Millis>;
    /// Disarm. Idempotent: disarming an already-disarmed alarm is not an error.
    fn disarm(&mut self);
    fn is_armed(&self) -> bool;
}
