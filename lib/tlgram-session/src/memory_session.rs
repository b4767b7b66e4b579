// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::generated::types::{UpdateState, User};
use crate::{DEFAULT_DC, DcOption, KNOWN_DC_OPTIONS, Session};

/// A basic session implementation, kept only in-memory. Useful for one-off
/// scripts or tests, since every bit of state is lost once it's dropped.
pub struct MemorySession {
    home_dc: AtomicI32,
    dc_options: Mutex<Vec<DcOption>>,
    user: Mutex<Option<User>>,
    state: Mutex<Option<UpdateState>>,
}

impl MemorySession {
    /// Create a new session instance.
    pub fn new() -> Self {
        Self {
            home_dc: AtomicI32::new(DEFAULT_DC),
            dc_options: Mutex::new(KNOWN_DC_OPTIONS.to_vec()),
            user: Mutex::new(None),
            state: Mutex::new(None),
        }
    }
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl Session for MemorySession {
    fn home_dc_id(&self) -> i32 {
        self.home_dc.load(Ordering::Relaxed)
    }

    fn set_home_dc_id(&self, dc_id: i32) {
        self.home_dc.store(dc_id, Ordering::Relaxed);
    }

    fn dc_option(&self, dc_id: i32) -> Option<DcOption> {
        self.dc_options
            .lock()
            .unwrap()
            .iter()
            .find(|dc| dc.id == dc_id)
            .cloned()
    }

    fn set_dc_option(&self, dc_option: &DcOption) {
        let mut dc_options = self.dc_options.lock().unwrap();
        if let Some(existing) = dc_options.iter_mut().find(|dc| dc.id == dc_option.id) {
            *existing = dc_option.clone();
        } else {
            dc_options.push(dc_option.clone());
        }
    }

    fn signed_in_user(&self) -> Option<User> {
        self.user.lock().unwrap().clone()
    }

    fn set_signed_in_user(&self, user: User) {
        *self.user.lock().unwrap() = Some(user);
    }

    fn get_state(&self) -> Option<UpdateState> {
        self.state.lock().unwrap().clone()
    }

    fn set_state(&self, state: UpdateState) {
        *self.state.lock().unwrap() = Some(state);
    }

    fn save(&self) -> io::Result<()> {
        Ok(())
    }
}
