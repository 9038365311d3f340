// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The mesh core's error type.
//!
//! `ot-hil::ErrorCode` is the narrow set of failures a HAL implementation
//! can signal; `Error` is the wider set the core itself produces, and
//! wraps an `ErrorCode` when a HAL call fails underneath it.

use thiserror::Error;

#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
pub enum Error {
    #[error("malformed TLV or frame")]
    Parse,
    #[error("security check failed (MIC mismatch or replayed frame counter)")]
    Security,
    #[error("no message buffers available")]
    NoBufs,
    #[error("no route to destination")]
    NoRoute,
    #[error("address query in progress")]
    AddressQuery,
    #[error("radio channel access failure")]
    ChannelAccess,
    #[error("no acknowledgment received")]
    NoAck,
    #[error("resource busy")]
    Busy,
    #[error("operation invalid in current role/state")]
    InvalidState,
    #[error("entry not found")]
    NotFound,
    #[error("entry already exists")]
    Already,
    #[error("invalid argument")]
    InvalidArgs,
    #[error("not implemented")]
    NotImplemented,
    #[error("underlying HAL error: {0}")]
    Hal(ot_hil::ErrorCode),
}

impl From<ot_hil::ErrorCode> for Error {
    fn from(e: ot_hil::ErrorCode) -> Self {
        Error::Hal(e)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
