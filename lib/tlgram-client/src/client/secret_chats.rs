// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! End-to-end encrypted "secret chats".
//!
//! The handshake and per-message sequencing live in `tlgram-secret`; this module is
//! only responsible for turning that crate's outputs into the RPCs Telegram expects
//! and for routing the four encrypted-chat updates back into a [`SecretChat`].

use tlgram_mtsender::InvocationError;
use tlgram_secret::{DecryptedMessage, DecryptedMessageAction, IncomingMessage, SecretChat};
use tlgram_tl_types as tl;

use super::Client;
use crate::types::Update;
use crate::utils::generate_random_id;

/// Outgoing secret chat traffic queued by [`Client::convert_update`] for [`Client::next_update`]
/// to actually send, since converting an update cannot itself await an RPC.
pub(crate) struct PendingSecretAction {
    chat_id: i32,
    random_id: i64,
    data: Vec<u8>,
    /// Whether this was built via `encrypt_action` (and so belongs on `sendEncryptedService`)
    /// rather than being a verbatim resend of an original `sendEncrypted` payload.
    service: bool,
}

/// A tracked secret chat together with the `access_hash` Telegram assigned it.
///
/// Every `InputEncryptedChat` the API expects needs both fields, so they travel together
/// instead of making every method on [`Client`] take the hash as a separate argument.
pub(crate) struct SecretChatEntry {
    pub chat: SecretChat,
    pub access_hash: i64,
}

impl SecretChatEntry {
    fn input(&self) -> tl::enums::InputEncryptedChat {
        tl::types::InputEncryptedChat {
            chat_id: self.chat.id(),
            access_hash: self.access_hash,
        }
        .into()
    }
}

/// An incoming secret chat request that has not been accepted yet.
///
/// Kept separate from [`SecretChatEntry`] because building the actual `SecretChat` needs the
/// current DH parameters, which requires a network round-trip `convert_update` cannot make.
pub(crate) struct PendingSecretChat {
    pub admin_id: i64,
    pub access_hash: i64,
    pub g_a: Vec<u8>,
}

/// Cached `(g, p)` pair handed out by `messages.getDhConfig`, refreshed whenever the
/// server reports a newer `version`.
pub(crate) struct DhConfig {
    pub version: i32,
    pub g: i32,
    pub p: Vec<u8>,
}

/// Error returned by secret chat operations that is not simply an [`InvocationError`].
#[derive(Debug)]
pub enum SecretChatError {
    /// No secret chat with the given identifier is currently tracked by this client.
    UnknownChat(i32),
    /// The key exchange failed (bad prime, corrupted `g_a`/`g_b`, and the like).
    Handshake(tlgram_secret::HandshakeError),
    /// The server claimed the DH config was unchanged before we had ever fetched one.
    NoDhConfig,
    /// A PFS re-key could not be started or could not be applied to an incoming action.
    KeyExchange(tlgram_secret::KeyExchangeError),
    Invocation(InvocationError),
}

impl std::fmt::Display for SecretChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownChat(id) => write!(f, "unknown secret chat {}", id),
            Self::Handshake(e) => write!(f, "secret chat handshake error: {}", e),
            Self::NoDhConfig => write!(f, "server reported dhConfigNotModified on first request"),
            Self::KeyExchange(e) => write!(f, "secret chat key exchange error: {}", e),
            Self::Invocation(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SecretChatError {}

impl From<InvocationError> for SecretChatError {
    fn from(e: InvocationError) -> Self {
        Self::Invocation(e)
    }
}

impl From<tlgram_secret::HandshakeError> for SecretChatError {
    fn from(e: tlgram_secret::HandshakeError) -> Self {
        Self::Handshake(e)
    }
}

impl From<tlgram_secret::KeyExchangeError> for SecretChatError {
    fn from(e: tlgram_secret::KeyExchangeError) -> Self {
        Self::KeyExchange(e)
    }
}

impl Client {
    /// Fetch (and cache) the Diffie-Hellman parameters used to create new secret chats.
    async fn dh_config(&mut self) -> Result<(i32, Vec<u8>), SecretChatError> {
        let request = tl::functions::messages::GetDhConfig {
            version: self.dh_config.as_ref().map(|c| c.version).unwrap_or(0),
            random_length: 0,
        };

        match self.invoke(&request).await? {
            tl::enums::DhConfig::Config(config) => {
                self.dh_config = Some(DhConfig {
                    version: config.version,
                    g: config.g,
                    p: config.p,
                });
            }
            tl::enums::DhConfig::NotModified(_) if self.dh_config.is_some() => {}
            tl::enums::DhConfig::NotModified(_) => return Err(SecretChatError::NoDhConfig),
        }

        let config = self.dh_config.as_ref().expect("just populated above");
        Ok((config.g, config.p.clone()))
    }

    /// Send a `messages.requestEncryption` to start a new secret chat with `user`.
    ///
    /// Returns the locally-chosen identifier for the chat; the handshake is not complete
    /// until the participant accepts and an `updateEncryption` with the resulting
    /// `g_b`/`key_fingerprint` has been processed by [`Client::next_update`].
    pub async fn request_secret_chat(
        &mut self,
        user_id: tl::enums::InputUser,
    ) -> Result<i32, SecretChatError> {
        let (g, p) = self.dh_config().await?;
        let id = generate_random_id() as i32;
        let (chat, g_a) = SecretChat::create_outgoing(id, 0, 0, g, p)?;

        let result = self
            .invoke(&tl::functions::messages::RequestEncryption {
                user_id,
                random_id: id,
                g_a,
            })
            .await?;

        let access_hash = match result {
            tl::enums::EncryptedChat::Waiting(waiting) => waiting.access_hash,
            _ => 0,
        };

        self.secret_chats
            .insert(id, SecretChatEntry { chat, access_hash });
        Ok(id)
    }

    /// Accept an incoming secret chat request previously surfaced as an
    /// `encryptedChatRequested` via [`Update::Encryption`].
    pub async fn accept_secret_chat(&mut self, chat_id: i32) -> Result<(), SecretChatError> {
        let pending = self
            .pending_secret_chats
            .remove(&chat_id)
            .ok_or(SecretChatError::UnknownChat(chat_id))?;

        let (g, p) = self.dh_config().await?;
        let mut chat = SecretChat::incoming_request(chat_id, pending.admin_id, 0, g, p, pending.g_a);
        let (g_b, key_fingerprint) = chat.accept()?;

        // We are the last side to learn the key, so we are also the first able to say
        // anything: send `notifyLayer` as this chat's very first message (S3).
        let notify_random_id = generate_random_id();
        let notify_layer = chat.notify_layer_action(notify_random_id);

        let entry = SecretChatEntry {
            chat,
            access_hash: pending.access_hash,
        };
        let peer = entry.input();

        self.invoke(&tl::functions::messages::AcceptEncryption {
            peer,
            g_b,
            key_fingerprint,
        })
        .await?;

        self.secret_chats.insert(chat_id, entry);
        self.pending_secret_actions.push_back(PendingSecretAction {
            chat_id,
            random_id: notify_random_id,
            data: notify_layer,
            service: true,
        });
        Ok(())
    }

    /// Discard (delete) a secret chat, optionally wiping its message history too.
    pub async fn discard_secret_chat(
        &mut self,
        chat_id: i32,
        delete_history: bool,
    ) -> Result<bool, InvocationError> {
        let result = self
            .invoke(&tl::functions::messages::DiscardEncryption {
                delete_history,
                chat_id,
            })
            .await?;
        if let Some(entry) = self.secret_chats.get_mut(&chat_id) {
            entry.chat.discard();
        }
        Ok(result)
    }

    /// Encrypt and send a text message over an established secret chat.
    pub async fn send_secret_message(
        &mut self,
        chat_id: i32,
        text: impl Into<String>,
    ) -> Result<(), SecretChatError> {
        // The same identifier is used both as the message's own `random_id` and as the RPC's,
        // so a stored `UnconfirmedMessage` can later be resent under its original message-id.
        let random_id = generate_random_id();
        let (peer, data) = {
            let entry = self
                .secret_chats
                .get_mut(&chat_id)
                .ok_or(SecretChatError::UnknownChat(chat_id))?;
            let data = entry.chat.encrypt_text(random_id, text.into());
            (entry.input(), data)
        };

        self.invoke(&tl::functions::messages::SendEncrypted {
            silent: false,
            peer,
            random_id,
            data,
        })
        .await?;
        Ok(())
    }

    /// Start a PFS re-key on an established secret chat. The resulting `RequestKey` action is
    /// queued and sent by the next call to [`Client::next_update`].
    pub fn request_secret_chat_rekey(&mut self, chat_id: i32) -> Result<(), SecretChatError> {
        let entry = self
            .secret_chats
            .get_mut(&chat_id)
            .ok_or(SecretChatError::UnknownChat(chat_id))?;
        let action = entry.chat.request_key_exchange()?;
        let random_id = generate_random_id();
        let data = entry.chat.encrypt_action(random_id, action);
        self.pending_secret_actions.push_back(PendingSecretAction {
            chat_id,
            random_id,
            data,
            service: true,
        });
        Ok(())
    }

    /// Send whatever secret chat traffic [`Client::convert_update`] queued while reacting to an
    /// incoming update (a re-key reply, a resend, a `notifyLayer`).
    pub(crate) async fn send_pending_secret_action(
        &mut self,
        action: PendingSecretAction,
    ) -> Result<(), InvocationError> {
        let peer = match self.secret_chats.get(&action.chat_id) {
            Some(entry) => entry.input(),
            None => return Ok(()),
        };

        if action.service {
            self.invoke(&tl::functions::messages::SendEncryptedService {
                peer,
                random_id: action.random_id,
                data: action.data,
            })
            .await?;
        } else {
            self.invoke(&tl::functions::messages::SendEncrypted {
                silent: false,
                peer,
                random_id: action.random_id,
                data: action.data,
            })
            .await?;
        }
        Ok(())
    }

    /// Let the peer know whether we are currently typing in a secret chat.
    pub async fn set_secret_chat_typing(&self, chat_id: i32) -> Result<bool, SecretChatError> {
        let entry = self
            .secret_chats
            .get(&chat_id)
            .ok_or(SecretChatError::UnknownChat(chat_id))?;

        Ok(self
            .invoke(&tl::functions::messages::SetEncryptedTyping {
                peer: entry.input(),
                typing: true,
            })
            .await?)
    }

    /// Mark the history of a secret chat as read up to `max_date`.
    pub async fn read_secret_history(
        &self,
        chat_id: i32,
        max_date: i32,
    ) -> Result<bool, SecretChatError> {
        let entry = self
            .secret_chats
            .get(&chat_id)
            .ok_or(SecretChatError::UnknownChat(chat_id))?;

        Ok(self
            .invoke(&tl::functions::messages::ReadEncryptedHistory {
                peer: entry.input(),
                max_date,
            })
            .await?)
    }

    /// Fold a raw update into the richer [`Update`] the facade exposes, intercepting the four
    /// updates that belong to secret chats and routing them through the matching
    /// [`SecretChat`]. Anything else passes through untouched.
    pub(crate) fn convert_update(&mut self, update: tl::enums::Update) -> Option<Update> {
        use tl::enums::Update as U;

        match update {
            U::NewEncryptedMessage(u) => {
                let (chat_id, data) = match u.message {
                    tl::enums::EncryptedMessage::Message(m) => (m.chat_id, m.bytes),
                    tl::enums::EncryptedMessage::Service(m) => (m.chat_id, m.bytes),
                };
                let entry = self.secret_chats.get_mut(&chat_id)?;
                let message: IncomingMessage = entry.chat.decrypt_message(&data).ok()?;

                if let Some((start, end)) = message.gap {
                    // Out-of-order: `tlgram-secret` already persisted it, ask the peer to fill
                    // the hole before delivering it or advancing our sequence tracker.
                    let random_id = generate_random_id();
                    let request = entry.chat.request_resend(random_id, start, end);
                    self.pending_secret_actions.push_back(PendingSecretAction {
                        chat_id,
                        random_id,
                        data: request,
                        service: true,
                    });
                    return None;
                }

                entry.chat.accept_incoming(message.out_seq_no);

                if self.handle_incoming_service_action(chat_id, &message.message) {
                    return None;
                }

                Some(Update::NewEncryptedMessage { chat_id, message })
            }
            U::Encryption(u) => {
                match &u.chat {
                    tl::enums::EncryptedChat::Chat(chat) => {
                        if let Some(entry) = self.secret_chats.get_mut(&chat.id) {
                            if entry.chat.finalize(&chat.g_a_or_b, chat.key_fingerprint).is_ok() {
                                let random_id = generate_random_id();
                                let notify_layer = entry.chat.notify_layer_action(random_id);
                                self.pending_secret_actions.push_back(PendingSecretAction {
                                    chat_id: chat.id,
                                    random_id,
                                    data: notify_layer,
                                    service: true,
                                });
                            }
                            entry.access_hash = chat.access_hash;
                        }
                    }
                    tl::enums::EncryptedChat::Requested(requested) => {
                        self.pending_secret_chats.insert(
                            requested.id,
                            PendingSecretChat {
                                admin_id: requested.admin_id,
                                access_hash: requested.access_hash,
                                g_a: requested.g_a.clone(),
                            },
                        );
                    }
                    tl::enums::EncryptedChat::Discarded(discarded) => {
                        if let Some(entry) = self.secret_chats.get_mut(&discarded.id) {
                            entry.chat.discard();
                        }
                    }
                    _ => {}
                }
                Some(Update::Encryption(u.chat))
            }
            other => Some(Update::Raw(other)),
        }
    }

    /// Reacts to the service actions this client fully owns the meaning of (re-keying, resend,
    /// layer negotiation), queuing any reply they call for via [`Client::send_pending_secret_action`].
    ///
    /// Returns `true` if the action was handled here and should not also be surfaced as an
    /// [`Update::NewEncryptedMessage`] - plain text and actions with application-visible meaning
    /// (read receipts, deletions, typing, TTL) still pass through.
    fn handle_incoming_service_action(&mut self, chat_id: i32, message: &DecryptedMessage) -> bool {
        let action = match message {
            DecryptedMessage::Service(service) => &service.action,
            DecryptedMessage::Message(_) => return false,
        };

        match action {
            DecryptedMessageAction::Resend(r) => {
                let entry = match self.secret_chats.get_mut(&chat_id) {
                    Some(entry) => entry,
                    None => return true,
                };
                for stored in entry.chat.messages_to_resend(r.start_seq_no, r.end_seq_no) {
                    self.pending_secret_actions.push_back(PendingSecretAction {
                        chat_id,
                        random_id: stored.message_id,
                        data: stored.blob,
                        service: false,
                    });
                }
                true
            }
            DecryptedMessageAction::RequestKey(r) => {
                let entry = match self.secret_chats.get_mut(&chat_id) {
                    Some(entry) => entry,
                    None => return true,
                };
                if let Ok(reply) = entry.chat.accept_key_exchange(r.exchange_id, &r.g_a) {
                    let random_id = generate_random_id();
                    let data = entry.chat.encrypt_action(random_id, reply);
                    self.pending_secret_actions.push_back(PendingSecretAction {
                        chat_id,
                        random_id,
                        data,
                        service: true,
                    });
                }
                true
            }
            DecryptedMessageAction::AcceptKey(r) => {
                let entry = match self.secret_chats.get_mut(&chat_id) {
                    Some(entry) => entry,
                    None => return true,
                };
                if let Ok(reply) =
                    entry
                        .chat
                        .commit_key_exchange(r.exchange_id, &r.g_b, r.key_fingerprint)
                {
                    let random_id = generate_random_id();
                    let data = entry.chat.encrypt_action(random_id, reply);
                    self.pending_secret_actions.push_back(PendingSecretAction {
                        chat_id,
                        random_id,
                        data,
                        service: true,
                    });
                }
                true
            }
            DecryptedMessageAction::CommitKey(r) => {
                if let Some(entry) = self.secret_chats.get_mut(&chat_id) {
                    let _ = entry.chat.confirm_key_exchange(r.exchange_id);
                }
                true
            }
            DecryptedMessageAction::AbortKey(r) => {
                if let Some(entry) = self.secret_chats.get_mut(&chat_id) {
                    let _ = entry.chat.abort_key_exchange(r.exchange_id);
                }
                true
            }
            DecryptedMessageAction::NotifyLayer(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_prime() -> Vec<u8> {
        let mut p = vec![0xffu8; 256];
        p[0] = 0xc7;
        p
    }

    #[test]
    fn entry_input_carries_chat_id_and_access_hash() {
        let (chat, _g_a) = SecretChat::create_outgoing(7, 100, 200, 3, test_prime()).unwrap();
        let entry = SecretChatEntry {
            chat,
            access_hash: 0xdead_beef,
        };

        match entry.input() {
            tl::enums::InputEncryptedChat::Chat(input) => {
                assert_eq!(input.chat_id, 7);
                assert_eq!(input.access_hash, 0xdead_beef);
            }
        }
    }

    #[test]
    fn discarding_an_entry_marks_the_chat_deleted() {
        let (chat, _g_a) = SecretChat::create_outgoing(1, 100, 200, 3, test_prime()).unwrap();
        let mut entry = SecretChatEntry {
            chat,
            access_hash: 0,
        };

        entry.chat.discard();
        assert_eq!(entry.chat.state(), tlgram_secret::SecretChatState::Deleted);
    }
}
