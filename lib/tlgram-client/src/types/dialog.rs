// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::Arc;

use super::{Chat, ChatMap};
use tlgram_tl_types as tl;

/// An open conversation, as returned by [`crate::Client::iter_dialogs`].
#[derive(Debug, Clone)]
pub struct Dialog {
    pub raw: tl::enums::Dialog,
    pub chat: Chat,
    /// The most recent message in this dialog, in its raw wire form.
    ///
    /// Kept unrendered on purpose: building the same rich `Message` the update stream
    /// produces would require this crate to carry the rendering stack this facade does
    /// not; callers that need more than the raw fields should re-fetch via
    /// `messages.getHistory` instead.
    pub last_message: Option<tl::enums::Message>,
}

fn message_peer(message: &tl::enums::Message) -> Option<&tl::enums::Peer> {
    match message {
        tl::enums::Message::Empty(m) => m.peer_id.as_ref(),
        tl::enums::Message::Message(m) => Some(&m.peer_id),
        tl::enums::Message::Service(m) => Some(&m.peer_id),
    }
}

/// `(id, date)` of a message, used to page through `messages.getDialogs`.
pub(crate) fn message_id_date(message: &tl::enums::Message) -> (i32, i32) {
    match message {
        tl::enums::Message::Empty(m) => (m.id, 0),
        tl::enums::Message::Message(m) => (m.id, m.date),
        tl::enums::Message::Service(m) => (m.id, m.date),
    }
}

impl Dialog {
    pub(crate) fn new(
        dialog: tl::enums::Dialog,
        messages: &mut Vec<tl::enums::Message>,
        chats: &Arc<ChatMap>,
    ) -> Self {
        let peer = match &dialog {
            tl::enums::Dialog::Dialog(dialog) => &dialog.peer,
            tl::enums::Dialog::Folder(dialog) => &dialog.peer,
        };

        let chat = chats.get(peer).expect("dialogs use an unknown peer").clone();

        let last_message = messages
            .iter()
            .position(|m| message_peer(m).is_some_and(|p| p == peer))
            .map(|i| messages.swap_remove(i));

        Self {
            chat,
            last_message,
            raw: dialog,
        }
    }

    pub fn chat(&self) -> &Chat {
        &self.chat
    }
}
