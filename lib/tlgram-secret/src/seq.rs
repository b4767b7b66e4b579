// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Raw wire sequence numbers and the logical counters they encode.
//!
//! Every `decryptedMessageLayer` carries `in_seq_no`/`out_seq_no` doubled and
//! offset by whether the sender is the chat's admin (the creator): the
//! admin's outgoing raw numbers are odd (`2*n + 1`), the participant's are
//! even (`2*n`), and each side's incoming raw number is the other side's
//! outgoing scheme. This lets either party tell, from the parity alone,
//! whether a raw number was meant to be produced by the admin or not.

use crate::errors::{seq_error, SeqError};

/// Converts a logical counter to the raw wire value the given role writes.
pub fn to_raw(logical: i32, is_admin: bool) -> i32 {
    2 * logical + if is_admin { 1 } else { 0 }
}

/// Converts a raw wire value we know came from the given role back to its
/// logical counter. Truncating division matches the reference client, which
/// does not reject a raw value of the wrong parity here; parity is instead
/// checked explicitly by [`check_parity`].
pub fn from_raw(raw: i32) -> i32 {
    raw.div_euclid(2)
}

/// Whether a raw sequence number has the parity expected of messages sent by
/// the chat's admin (odd) or its other participant (even).
pub fn check_parity(raw: i32, expected_from_admin: bool) -> Result<(), SeqError> {
    let is_odd = raw % 2 != 0;
    if is_odd == expected_from_admin {
        Ok(())
    } else {
        seq_error::BadParitySnafu.fail()
    }
}

/// Tracks the two monotonic counters of a secret chat: how many messages we
/// have sent (`out_seq_no`), and how many consecutive ones from the peer we
/// have accepted (`in_seq_no`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeqTracker {
    pub out_seq_no: i32,
    pub in_seq_no: i32,
}

impl SeqTracker {
    /// Allocates the next outgoing logical sequence number.
    pub fn next_out(&mut self) -> i32 {
        let n = self.out_seq_no;
        self.out_seq_no += 1;
        n
    }

    /// Validates an incoming message's logical `(in_seq_no, out_seq_no)`
    /// pair (the peer's acknowledgement of us, and their own counter).
    ///
    /// Returns `Ok(None)` when the message is the next one expected, or
    /// `Ok(Some(gap))` describing a hole to request a resend for -
    /// `(first_missing, last_missing)`, both inclusive, before this message
    /// can be delivered. The message itself is not yet marked as seen;
    /// callers should do so via [`Self::accept`] once it (and anything
    /// filling the hole) is actually applied in order.
    pub fn check_incoming(
        &self,
        peer_in_seq_no: i32,
        peer_out_seq_no: i32,
    ) -> Result<Option<(i32, i32)>, SeqError> {
        if peer_in_seq_no > self.out_seq_no {
            return seq_error::AckTooHighSnafu {
                claimed: peer_in_seq_no,
                ours: self.out_seq_no,
            }
            .fail();
        }
        if peer_out_seq_no < self.in_seq_no {
            return seq_error::AlreadySeenSnafu {
                out_seq_no: peer_out_seq_no,
                in_seq_no: self.in_seq_no,
            }
            .fail();
        }
        if peer_out_seq_no > self.in_seq_no {
            return Ok(Some((self.in_seq_no, peer_out_seq_no - 1)));
        }
        Ok(None)
    }

    /// Marks a message with the given logical `out_seq_no` as received,
    /// advancing `in_seq_no` past it. Must only be called once any hole
    /// before it has been filled.
    pub fn accept(&mut self, peer_out_seq_no: i32) {
        self.in_seq_no = self.in_seq_no.max(peer_out_seq_no + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_and_participant_raw_numbers_have_opposite_parity() {
        assert_eq!(to_raw(0, true), 1);
        assert_eq!(to_raw(0, false), 0);
        assert_eq!(to_raw(5, true), 11);
        assert_eq!(to_raw(5, false), 10);
    }

    #[test]
    fn raw_round_trips_through_logical() {
        for n in 0..100 {
            assert_eq!(from_raw(to_raw(n, true)), n);
            assert_eq!(from_raw(to_raw(n, false)), n);
        }
    }

    #[test]
    fn parity_check_rejects_swapped_roles() {
        let admin_raw = to_raw(3, true);
        assert!(check_parity(admin_raw, true).is_ok());
        assert!(check_parity(admin_raw, false).is_err());
    }

    #[test]
    fn in_order_message_has_no_gap() {
        let tracker = SeqTracker::default();
        assert_eq!(tracker.check_incoming(0, 0), Ok(None));
    }

    #[test]
    fn out_of_order_message_reports_the_hole() {
        let tracker = SeqTracker::default();
        assert_eq!(tracker.check_incoming(0, 3), Ok(Some((0, 2))));
    }

    #[test]
    fn duplicate_message_is_rejected() {
        let mut tracker = SeqTracker::default();
        tracker.accept(0);
        assert!(tracker.check_incoming(0, 0).is_err());
    }

    #[test]
    fn ack_beyond_our_out_seq_no_is_rejected() {
        let tracker = SeqTracker::default();
        assert!(tracker.check_incoming(1, 0).is_err());
    }
}
