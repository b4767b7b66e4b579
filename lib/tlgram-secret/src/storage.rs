// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The interface an embedder implements to persist messages this crate
//! cannot yet fully process: outgoing messages the peer has not yet
//! acknowledged, and incoming ones that arrived ahead of a hole in the
//! sequence. Actually storing them on disk (or wherever) is out of scope
//! here; this crate only needs to read and prune them back.

/// Which side produced an [`UnconfirmedMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretMessageDirection {
    Outgoing,
    Incoming,
}

/// A message kept around because its place in the sequence is not yet
/// settled: an outgoing one the peer hasn't acknowledged via `in_seq_no`
/// yet, or an incoming one received ahead of a gap we're still waiting to
/// have filled.
#[derive(Debug, Clone, PartialEq)]
pub struct UnconfirmedMessage {
    pub message_id: i64,
    pub date: i64,
    pub chat_id: i32,
    pub in_seq_no: i32,
    pub out_seq_no: i32,
    pub direction: SecretMessageDirection,
    /// The raw, still-encrypted `decryptedMessageLayer` blob (or, for an
    /// incoming message pending a hole-fill, its already-decrypted bytes),
    /// so it can be replayed or re-submitted without the original caller's
    /// involvement.
    pub blob: Vec<u8>,
}

/// Backs the bookkeeping in [`crate::chat::SecretChat`] for messages that
/// are not yet fully confirmed in both directions.
///
/// Implementations are expected to be cheap to clone or otherwise shareable,
/// since a single store commonly backs every secret chat a client has open.
pub trait SecretMessageStorage: Send + Sync {
    fn store_message(&self, message: UnconfirmedMessage);

    fn update_message(&self, message: UnconfirmedMessage);

    /// Messages for `chat_id` in the given direction whose `out_seq_no` (or,
    /// for incoming ones, `in_seq_no`) falls in `seq_no_start..=seq_no_end`.
    /// Pass `seq_no_end = -1` for an open-ended upper bound.
    fn load_messages_by_seq_no(
        &self,
        chat_id: i32,
        seq_no_start: i32,
        seq_no_end: i32,
        direction: SecretMessageDirection,
    ) -> Vec<UnconfirmedMessage>;

    fn remove_messages_by_seq_no(
        &self,
        chat_id: i32,
        seq_no_start: i32,
        seq_no_end: i32,
        direction: SecretMessageDirection,
    );
}
