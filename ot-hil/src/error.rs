// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The narrow error type HAL implementations (radio, crypto, timer) report.
//!
//! `ot-core` maps these into its own, richer `Error` taxonomy at the
//! seam, the way `capsules/extra/src/ieee802154/framer.rs` maps
//! `kernel::ErrorCode` into frame-level failures.

use core::fmt;

/// Failure reported by a HAL implementation.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ErrorCode {
    /// The peripheral is mid-operation and cannot accept a new request.
    Busy,
    /// The peripheral is powered down.
    Off,
    /// A request was made with an invalid argument.
    Invalid,
    /// A buffer was too small for the operation.
    Size,
    /// An acknowledgement was expected and did not arrive in time.
    NoAck,
    /// Catch-all failure without a more specific cause.
    Fail,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::Busy => "peripheral busy",
            ErrorCode::Off => "peripheral off",
            ErrorCode::Invalid => "invalid argument",
            ErrorCode::Size => "buffer too small",
            ErrorCode::NoAck => "no acknowledgement",
            ErrorCode::Fail => "operation failed",
        };
        f.write_str(s)
    }
}
