// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Implementation of the [Mobile Transport Protocol]. This layer is
//! responsible for converting zero or more input requests into outgoing
//! messages, and to process the server's response.
//!
//! A distinction between plain and encrypted is made for simplicity (the
//! plain variant hardly requires any state) and to help prevent invalid
//! states (encrypted communication cannot be made without an authorization
//! key).
//!
//! [Mobile Transport Protocol]: https://core.telegram.org/mtproto/description

mod encrypted;
mod plain;

pub use encrypted::Encrypted;
pub use plain::Plain;

pub use crate::errors::{DeserializeError, RequestError};
use crate::MsgId;

/// The result of deserializing a server response via [`Mtp::deserialize`].
pub struct Deserialization {
    /// The responses to previously-sent requests, identified by the
    /// [`MsgId`] returned from [`Mtp::push`].
    pub rpc_results: Vec<(MsgId, Result<Vec<u8>, RequestError>)>,

    /// Updates unrelated to any request that the server pushed on its own.
    pub updates: Vec<Vec<u8>>,
}

/// The trait implemented by the plaintext and encrypted halves of the
/// Mobile Transport Protocol.
pub trait Mtp {
    /// Enqueues a serialized request to be sent the next time
    /// [`Mtp::finalize`] is called.
    ///
    /// Returns the identifier that the eventual response to this request
    /// will carry in [`Deserialization::rpc_results`], unless the request
    /// could not be enqueued (for instance, because it alone would not fit
    /// within a single message container).
    fn push(&mut self, request: &[u8]) -> Option<MsgId>;

    /// Packs every request enqueued via [`Mtp::push`] since the last call
    /// into a single payload ready to be handed to the transport.
    fn finalize(&mut self) -> Vec<u8>;

    /// Processes a transport payload received from the server, updating
    /// the internal state and returning the responses and updates it
    /// contained.
    fn deserialize(&mut self, payload: &[u8]) -> Result<Deserialization, DeserializeError>;
}
