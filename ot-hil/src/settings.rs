// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A settings/persistence seam, modeled on the way this pack's HIL
//! traits specify a capability and leave the concrete (flash-backed,
//! in-memory, ...) implementation to the platform, the same role
//! `libraries/tickv` plays for Tock boards — not reimplemented here
//! since on-flash layout is out of this crate's scope.
//!
//! Keys are the 16-bit ids `original_source/include/openthread/
//! platform/settings.h` defines: active/pending operational dataset,
//! network-info, parent-info, one or more child-info records, the
//! auto-start flag, and the SLAAC IID secret key.

use crate::ErrorCode;

pub const MAX_SETTING_LEN: usize = 256;

/// A 16-bit settings key. `ot-core` never interprets the numeric value;
/// it only uses the constants it defines for its own record kinds.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct SettingsKey(pub u16);

impl SettingsKey {
    pub const ACTIVE_DATASET: SettingsKey = SettingsKey(1);
    pub const PENDING_DATASET: SettingsKey = SettingsKey(2);
    pub const NETWORK_INFO: SettingsKey = SettingsKey(3);
    pub const PARENT_INFO: SettingsKey = SettingsKey(4);
    /// Multi-valued: one record per child, added via `add`.
    pub const CHILD_INFO: SettingsKey = SettingsKey(5);
    pub const AUTO_START: SettingsKey = SettingsKey(6);
    pub const SLAAC_IID_SECRET: SettingsKey = SettingsKey(7);
}

/// A non-volatile settings store a platform provides. Single-valued
/// keys (`ACTIVE_DATASET`, `NETWORK_INFO`, ...) are overwritten by
/// `set`; multi-valued keys (`CHILD_INFO`) accumulate records via `add`
/// and are enumerated with `iter`.
pub trait SettingsStore {
    /// The first (or only) record stored under `key`, copied into a
    /// caller-owned buffer. Returns the number of bytes written.
    fn get(&self, key: SettingsKey, out: &mut [u8; MAX_SETTING_LEN]) -> Option<usize>;

    /// Overwrite `key`'s single value.
    fn set(&mut self, key: SettingsKey, value: &[u8]) -> Result<(), ErrorCode>;

    /// Append another record under a multi-valued `key`.
    fn add(&mut self, key: SettingsKey, value: &[u8]) -> Result<(), ErrorCode>;

    /// Delete every record under `key`.
    fn delete(&mut self, key: SettingsKey);

    /// Delete all persisted state (`factory_reset`).
    fn wipe(&mut self);
}
