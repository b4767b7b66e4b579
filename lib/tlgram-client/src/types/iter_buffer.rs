// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Generic pagination buffer shared by the request iterators (currently just
//! [`crate::client::dialogs::DialogIter`]).

use crate::Client;
use std::collections::VecDeque;

/// Buffers the output of a paginated request so callers can pull items one at a time,
/// while the concrete iterator built on top only has to worry about refilling `buffer`
/// and updating `request` between calls.
///
/// Borrows the `Client` mutably for its lifetime rather than cloning a handle to it,
/// matching the single-owned, non-`Send` client the rest of the crate builds around.
pub struct IterBuffer<'a, R, T> {
    pub(crate) client: &'a mut Client,
    pub(crate) request: R,
    pub(crate) buffer: VecDeque<T>,
    pub(crate) total: Option<usize>,
    pub(crate) last_chunk: bool,
    limit: Option<usize>,
}

impl<'a, R, T> IterBuffer<'a, R, T> {
    pub(crate) fn from_request(client: &'a mut Client, request: R) -> Self {
        Self {
            client,
            request,
            buffer: VecDeque::new(),
            total: None,
            last_chunk: false,
            limit: None,
        }
    }

    /// Limit how many items this iterator will ever yield, across all pages.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns the next buffered item without touching the network, if any, or `None` if
    /// the caller should fetch another page (or the configured `limit` was reached).
    pub(crate) fn next_raw(&mut self) -> Option<Option<T>> {
        if let Some(0) = self.limit {
            return Some(None);
        }

        if let Some(item) = self.pop_item() {
            return Some(Some(item));
        }

        if self.last_chunk {
            return Some(None);
        }

        None
    }

    pub(crate) fn pop_item(&mut self) -> Option<T> {
        let item = self.buffer.pop_front();
        if item.is_some() {
            if let Some(limit) = &mut self.limit {
                *limit = limit.saturating_sub(1);
            }
        }
        item
    }

    /// Clamp the per-request page size to both `max` and whatever remains of `limit`.
    pub(crate) fn determine_limit(&self, max: usize) -> i32 {
        self.limit.map(|remaining| remaining.min(max)).unwrap_or(max) as i32
    }
}
