// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use tlgram_secret::IncomingMessage;
use tlgram_tl_types as tl;

/// A single event delivered by [`crate::Client::next_update`].
///
/// Kept deliberately thin: everything that would otherwise require a rendering layer
/// (entities, reply markup, media) is left as the raw wire type for the caller to
/// interpret, rather than re-built here.
#[derive(Debug)]
pub enum Update {
    /// A decrypted message arrived on one of the secret chats tracked by the client.
    NewEncryptedMessage {
        chat_id: i32,
        message: IncomingMessage,
    },

    /// The state of a secret chat changed (requested, accepted, rekeyed, discarded).
    Encryption(tl::enums::EncryptedChat),

    /// Anything else, verbatim.
    Raw(tl::enums::Update),
}
