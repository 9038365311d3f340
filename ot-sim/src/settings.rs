// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! An in-memory `SettingsStore`, standing in for `libraries/tickv`'s
//! flash-backed layout the way every other `ot-sim` peripheral stands in
//! for real hardware: a `HashMap` keyed on the 16-bit settings key, with
//! `Vec` values to support `CHILD_INFO`'s multi-record semantics.

use std::collections::HashMap;

use ot_hil::settings::{SettingsKey, SettingsStore, MAX_SETTING_LEN};
use ot_hil::ErrorCode;

#[derive(Default)]
pub struct InMemorySettings {
    records: HashMap<u16, Vec<Vec<u8>>>,
}

impl InMemorySettings {
    pub fn new() -> Self {
        InMemorySettings::default()
    }
}

impl SettingsStore for InMemorySettings {
    fn get(&self, key: SettingsKey, out: &mut [u8; MAX_SETTING_LEN]) -> Option<usize> {
        let value = self.records.get(&key.0)?.first()?;
        let len = value.len().min(MAX_SETTING_LEN);
        out[..len].copy_from_slice(&value[..len]);
        Some(len)
    }

    fn set(&mut self, key: SettingsKey, value: &[u8]) -> Result<(), ErrorCode> {
        if value.len() > MAX_SETTING_LEN {
            return Err(ErrorCode::Size);
        }
        self.records.insert(key.0, vec![value.to_vec()]);
        Ok(())
    }

    fn add(&mut self, key: SettingsKey, value: &[u8]) -> Result<(), ErrorCode> {
        if value.len() > MAX_SETTING_LEN {
            return Err(ErrorCode::Size);
        }
        self.records.entry(key.0).or_default().push(value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: SettingsKey) {
        self.records.remove(&key.0);
    }

    fn wipe(&mut self) {
        self.records.clear();
    }
}
