// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A single end-to-end encrypted chat: its handshake state, its active and
//! (while re-keying) pending keys, and the sequence-number bookkeeping that
//! guards every message going in or out.

use crate::crypto::{self, KEY_SIZE};
use crate::errors::{key_exchange_error, HandshakeError, KeyExchangeError};
use crate::generated::{enums, types};
use crate::handshake::{CreatorHandshake, ParticipantHandshake};
use crate::seq::{self, SeqTracker};
use crate::storage::{SecretMessageDirection, SecretMessageStorage, UnconfirmedMessage};
use getrandom::getrandom;
use snafu::ResultExt;
use std::sync::Arc;
use tlgram_tl_types::{Deserializable, Serializable};

/// Mirrors the reference client's `tgl_secret_chat_state`: where a chat sits
/// in the out-of-band creation handshake, before any messages flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretChatState {
    /// Placeholder before the first `messages.requestEncryption`/incoming
    /// `encryptedChatRequested` update has been processed at all.
    None,
    /// We created this chat and are waiting for the participant's `g_b`.
    Waiting,
    /// The participant received a request and has not yet decided whether
    /// to accept it.
    Request,
    /// The handshake completed; `key`/`key_fingerprint` are usable.
    Ok,
    /// Either side discarded the chat.
    Deleted,
}

/// Where an in-progress PFS re-key stands. Unlike [`SecretChatState`], this
/// is not exposed over the wire directly - it only ever governs which key
/// [`SecretChat::decrypt_message`] tries first and whether an incoming
/// `decryptedMessageAction*Key` action is currently expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// No re-key under way.
    None,
    /// We sent (or yielded to the peer's, on a tie-break) a `RequestKey` and
    /// are waiting for their `AcceptKey`.
    Requested,
    /// We answered a `RequestKey` with `AcceptKey` and are waiting for the
    /// requester's `CommitKey`.
    Accepted,
    /// We sent `CommitKey`; `exchange_key` is the new key, but outgoing
    /// messages still use the old one until the peer's traffic proves they
    /// have switched over too.
    Committed,
}

/// A gap in the peer's sequence: messages with logical `out_seq_no` in
/// `first..=last` that have not yet been seen and must be asked for again
/// (via `decryptedMessageActionResend`) before the message that reported it
/// can be delivered to the application.
pub type SequenceGap = (i32, i32);

/// A successfully decrypted and sequence-checked incoming message.
#[derive(Debug)]
pub struct IncomingMessage {
    pub message: enums::DecryptedMessage,
    /// This message's own logical `out_seq_no`, to be passed to
    /// [`SecretChat::accept_incoming`] once it (and anything filling `gap`)
    /// has been applied.
    pub out_seq_no: i32,
    /// `Some(gap)` if this message arrived ahead of a hole in the peer's
    /// sequence; the caller should queue it (via [`crate::storage`]) rather
    /// than deliver it until the gap is filled.
    pub gap: Option<SequenceGap>,
}

/// One end-to-end encrypted chat.
///
/// `tlgram-secret` never performs network I/O: building and sending the
/// `messages.requestEncryption`/`acceptEncryption`/`sendEncrypted*` calls
/// that carry this type's output is left to the caller, which already owns
/// a connection and the plaintext `EncryptedChat`/`DhConfig` types needed to
/// drive them.
pub struct SecretChat {
    id: i32,
    admin_id: i64,
    our_id: i64,
    participant_id: i64,
    ttl: i32,
    layer: i32,
    state: SecretChatState,

    key: [u8; KEY_SIZE],
    key_fingerprint: i64,
    seq: SeqTracker,

    dh_g: i32,
    dh_p: Vec<u8>,
    pending_creator: Option<CreatorHandshake>,
    pending_peer_g_a: Option<Vec<u8>>,

    exchange_state: ExchangeState,
    exchange_id: i64,
    exchange_key: Option<[u8; KEY_SIZE]>,
    exchange_creator: Option<CreatorHandshake>,

    storage: Option<Arc<dyn SecretMessageStorage>>,
}

/// Layer number this crate's `decryptedMessageLayer` implements.
const LAYER: i32 = 46;

impl SecretChat {
    /// Starts a chat we are creating: stores our half of the handshake and
    /// returns the `g_a` to send as `messages.requestEncryption`'s `g_a`.
    pub fn create_outgoing(
        id: i32,
        our_id: i64,
        participant_id: i64,
        g: i32,
        p: Vec<u8>,
    ) -> Result<(Self, Vec<u8>), HandshakeError> {
        let creator = CreatorHandshake::new(g, &p)?;
        let g_a = creator.g_a();
        let chat = Self {
            id,
            admin_id: our_id,
            our_id,
            participant_id,
            ttl: 0,
            layer: LAYER,
            state: SecretChatState::Waiting,
            key: [0u8; KEY_SIZE],
            key_fingerprint: 0,
            seq: SeqTracker::default(),
            dh_g: g,
            dh_p: p,
            pending_creator: Some(creator),
            pending_peer_g_a: None,
            exchange_state: ExchangeState::None,
            exchange_id: 0,
            exchange_key: None,
            exchange_creator: None,
            storage: None,
        };
        Ok((chat, g_a))
    }

    /// Starts a chat from an incoming `encryptedChatRequested` update. The
    /// handshake is not completed yet; the application must call
    /// [`Self::accept`] once the user agrees to the request.
    pub fn incoming_request(
        id: i32,
        admin_id: i64,
        our_id: i64,
        g: i32,
        p: Vec<u8>,
        g_a: Vec<u8>,
    ) -> Self {
        Self {
            id,
            admin_id,
            our_id,
            participant_id: admin_id,
            ttl: 0,
            layer: LAYER,
            state: SecretChatState::Request,
            key: [0u8; KEY_SIZE],
            key_fingerprint: 0,
            seq: SeqTracker::default(),
            dh_g: g,
            dh_p: p,
            pending_creator: None,
            pending_peer_g_a: Some(g_a),
            exchange_state: ExchangeState::None,
            exchange_id: 0,
            exchange_key: None,
            exchange_creator: None,
            storage: None,
        }
    }

    /// Attaches the storage backend used to persist unconfirmed messages.
    /// Call this right after construction if restart reconstruction and
    /// resend support (see [`Self::restore_from_storage`] and
    /// [`Self::messages_to_resend`]) are needed; messages sent or received
    /// before this is called are not persisted.
    pub fn attach_storage(&mut self, storage: Arc<dyn SecretMessageStorage>) {
        self.storage = Some(storage);
    }

    /// Reconstructs in-memory outgoing sequence state from persisted
    /// unconfirmed messages after a restart, so outgoing numbering never
    /// reuses a sequence number the peer may already have seen. Returns the
    /// incoming messages that were still waiting on a gap to be filled when
    /// the chat was last running, so the caller can request them again.
    pub fn restore_from_storage(&mut self) -> Vec<UnconfirmedMessage> {
        let storage = match &self.storage {
            Some(storage) => storage,
            None => return Vec::new(),
        };
        let outgoing =
            storage.load_messages_by_seq_no(self.id, 0, -1, SecretMessageDirection::Outgoing);
        if let Some(max_out_seq_no) = outgoing.iter().map(|m| m.out_seq_no).max() {
            self.seq.out_seq_no = self.seq.out_seq_no.max(max_out_seq_no + 1);
        }
        storage.load_messages_by_seq_no(self.id, 0, -1, SecretMessageDirection::Incoming)
    }

    /// The participant's side of the handshake: completes the DH exchange
    /// against the `g_a` this chat was created with, moving to `Ok`, and
    /// returns `(g_b, key_fingerprint)` to answer with.
    pub fn accept(&mut self) -> Result<(Vec<u8>, i64), HandshakeError> {
        let g_a = self
            .pending_peer_g_a
            .take()
            .expect("incoming_request always stashes the peer's g_a");
        let (g_b, key, fingerprint) = ParticipantHandshake::accept(self.dh_g, &self.dh_p, &g_a)?;
        self.key = key;
        self.key_fingerprint = fingerprint;
        self.state = SecretChatState::Ok;
        Ok((g_b, fingerprint))
    }

    /// The creator's side: completes the handshake once the participant's
    /// `g_b`/`key_fingerprint` arrive in an `updateEncryption`.
    pub fn finalize(&mut self, g_b: &[u8], key_fingerprint: i64) -> Result<(), HandshakeError> {
        let creator = self
            .pending_creator
            .take()
            .expect("create_outgoing always stashes the creator handshake");
        let key = creator.complete(g_b, key_fingerprint)?;
        self.key = key;
        self.key_fingerprint = key_fingerprint;
        self.state = SecretChatState::Ok;
        Ok(())
    }

    /// Marks the chat as discarded, e.g. on `encryptedChatDiscarded`.
    pub fn discard(&mut self) {
        self.state = SecretChatState::Deleted;
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn state(&self) -> SecretChatState {
        self.state
    }

    pub fn exchange_state(&self) -> ExchangeState {
        self.exchange_state
    }

    pub fn key_fingerprint(&self) -> i64 {
        self.key_fingerprint
    }

    pub fn ttl(&self) -> i32 {
        self.ttl
    }

    pub fn set_ttl(&mut self, ttl: i32) {
        self.ttl = ttl;
    }

    fn we_are_admin(&self) -> bool {
        self.admin_id == self.our_id
    }

    // -- sending --------------------------------------------------------

    /// Wraps `message` in a `decryptedMessageLayer`, stamps it with the next
    /// outgoing sequence number, and encrypts it under the currently active
    /// key. Outgoing traffic always uses the active key, even mid-rekey: a
    /// `Committed` exchange only takes over once we have seen the peer
    /// decrypt-confirm it (see [`Self::decrypt_message`]).
    fn wrap_and_encrypt(&mut self, message: enums::DecryptedMessage) -> Vec<u8> {
        let random_id = message_random_id(&message);
        let out_seq_no = self.seq.next_out();
        let layer = types::DecryptedMessageLayer {
            random_bytes: random_bytes(15 + (out_seq_no as usize % 13)),
            layer: self.layer,
            in_seq_no: seq::to_raw(self.seq.in_seq_no, self.we_are_admin()),
            out_seq_no: seq::to_raw(out_seq_no, self.we_are_admin()),
            message,
        };
        let payload = enums::DecryptedMessageLayer::Layer(layer).to_bytes();
        let body = crypto::encrypt_layer_v1(&self.key, &payload);

        let mut out = Vec::with_capacity(8 + body.len());
        out.extend_from_slice(&self.key_fingerprint.to_le_bytes());
        out.extend_from_slice(&body);

        if let Some(storage) = &self.storage {
            storage.store_message(UnconfirmedMessage {
                message_id: random_id,
                date: 0,
                chat_id: self.id,
                in_seq_no: self.seq.in_seq_no,
                out_seq_no,
                direction: SecretMessageDirection::Outgoing,
                blob: out.clone(),
            });
        }

        out
    }

    /// Encrypts a plain text message, ready for `messages.sendEncrypted`.
    pub fn encrypt_text(&mut self, random_id: i64, text: String) -> Vec<u8> {
        let message = enums::DecryptedMessage::Message(types::DecryptedMessage {
            random_id,
            ttl: self.ttl,
            message: text,
        });
        self.wrap_and_encrypt(message)
    }

    /// Encrypts a service action, ready for `messages.sendEncryptedService`.
    pub fn encrypt_action(
        &mut self,
        random_id: i64,
        action: enums::DecryptedMessageAction,
    ) -> Vec<u8> {
        let message = enums::DecryptedMessage::Service(types::DecryptedMessageService {
            random_id,
            action,
        });
        self.wrap_and_encrypt(message)
    }

    // -- receiving --------------------------------------------------------

    /// Decrypts, parses and sequence-checks an incoming
    /// `encryptedMessage`/`EncryptedMessage.bytes` payload.
    ///
    /// If a re-key is `Committed`, decryption is tried first under the new
    /// `exchange_key`; success there is the *only* confirmation this crate
    /// ever gets that the peer has switched to it, so it is immediately
    /// promoted to the active key.
    pub fn decrypt_message(
        &mut self,
        data: &[u8],
    ) -> Result<IncomingMessage, crate::errors::DecryptError> {
        use crate::errors::decrypt_error;

        if data.len() < 8 {
            return decrypt_error::TruncatedSnafu.fail();
        }
        let mut fingerprint_bytes = [0u8; 8];
        fingerprint_bytes.copy_from_slice(&data[..8]);
        let fingerprint = i64::from_le_bytes(fingerprint_bytes);
        let body = &data[8..];

        let (key, promotes) = if fingerprint == self.key_fingerprint {
            (self.key, false)
        } else if self.exchange_state == ExchangeState::Committed
            && self.exchange_key.map(|k| crypto::key_fingerprint(&k)) == Some(fingerprint)
        {
            (self.exchange_key.expect("checked above"), true)
        } else {
            return decrypt_error::FingerprintMismatchSnafu.fail();
        };

        let payload = crypto::decrypt_layer_v1(&key, body)
            .ok_or_else(|| decrypt_error::MessageKeyMismatchSnafu.build())?;

        if promotes {
            self.promote_exchange_key();
        }

        let layer = enums::DecryptedMessageLayer::from_bytes(&payload)
            .map_err(|_| decrypt_error::MalformedSnafu.build())?;
        let enums::DecryptedMessageLayer::Layer(layer) = layer;

        seq::check_parity(layer.out_seq_no, !self.we_are_admin())
            .map_err(|_| decrypt_error::MalformedSnafu.build())?;
        seq::check_parity(layer.in_seq_no, self.we_are_admin())
            .map_err(|_| decrypt_error::MalformedSnafu.build())?;

        let peer_in_seq_no = seq::from_raw(layer.in_seq_no);
        let peer_out_seq_no = seq::from_raw(layer.out_seq_no);
        let gap = self
            .seq
            .check_incoming(peer_in_seq_no, peer_out_seq_no)
            .map_err(|_| decrypt_error::MalformedSnafu.build())?;

        if let Some(storage) = &self.storage {
            // The peer's `in_seq_no` is how many of our outgoing messages it has now
            // seen in order; anything below that is confirmed and no longer needs
            // to be kept around for a resend.
            if peer_in_seq_no > 0 {
                storage.remove_messages_by_seq_no(
                    self.id,
                    0,
                    peer_in_seq_no - 1,
                    SecretMessageDirection::Outgoing,
                );
            }
            if gap.is_some() {
                storage.store_message(UnconfirmedMessage {
                    message_id: message_random_id(&layer.message),
                    date: 0,
                    chat_id: self.id,
                    in_seq_no: peer_in_seq_no,
                    out_seq_no: peer_out_seq_no,
                    direction: SecretMessageDirection::Incoming,
                    blob: payload.clone(),
                });
            }
        }

        Ok(IncomingMessage {
            message: layer.message,
            out_seq_no: peer_out_seq_no,
            gap,
        })
    }

    /// Call once an incoming message's `out_seq_no` (and anything filling
    /// the gap it may have reported) has actually been delivered, advancing
    /// `in_seq_no` past it.
    pub fn accept_incoming(&mut self, out_seq_no: i32) {
        self.seq.accept(out_seq_no);
        if let Some(storage) = &self.storage {
            storage.remove_messages_by_seq_no(
                self.id,
                out_seq_no,
                out_seq_no,
                SecretMessageDirection::Incoming,
            );
        }
    }

    /// Builds a `decryptedMessageActionResend`, asking the peer to
    /// retransmit whatever they sent with `out_seq_no` in `start..=end`.
    pub fn request_resend(&mut self, random_id: i64, start_seq_no: i32, end_seq_no: i32) -> Vec<u8> {
        self.encrypt_action(
            random_id,
            enums::DecryptedMessageAction::Resend(types::DecryptedMessageActionResend {
                start_seq_no,
                end_seq_no,
            }),
        )
    }

    /// Looks up our own previously-sent messages with `out_seq_no` in
    /// `start..=end`, to answer an incoming `decryptedMessageActionResend`.
    /// Each entry's `blob` is the exact wire payload originally sent and
    /// `message_id` the `random_id` it must be resent under.
    pub fn messages_to_resend(&self, start_seq_no: i32, end_seq_no: i32) -> Vec<UnconfirmedMessage> {
        match &self.storage {
            Some(storage) => storage.load_messages_by_seq_no(
                self.id,
                start_seq_no,
                end_seq_no,
                SecretMessageDirection::Outgoing,
            ),
            None => Vec::new(),
        }
    }

    /// Builds the `decryptedMessageActionNotifyLayer` action a chat should
    /// send as its first message once established, advertising [`LAYER`].
    pub fn notify_layer_action(&mut self, random_id: i64) -> Vec<u8> {
        self.encrypt_action(
            random_id,
            enums::DecryptedMessageAction::NotifyLayer(types::DecryptedMessageActionNotifyLayer {
                layer: self.layer,
            }),
        )
    }

    // -- PFS re-keying ----------------------------------------------------

    /// Starts a re-key: generates a fresh exponent against this chat's
    /// `dh_config`, and returns the `RequestKey` action to send.
    pub fn request_key_exchange(&mut self) -> Result<enums::DecryptedMessageAction, KeyExchangeError> {
        if self.exchange_state != ExchangeState::None {
            return key_exchange_error::AlreadyInProgressSnafu.fail();
        }

        let creator = CreatorHandshake::new(self.dh_g, &self.dh_p)
            .context(key_exchange_error::HandshakeSnafu)?;
        let g_a = creator.g_a();
        let exchange_id = random_i64();

        self.exchange_id = exchange_id;
        self.exchange_creator = Some(creator);
        self.exchange_state = ExchangeState::Requested;

        Ok(enums::DecryptedMessageAction::RequestKey(
            types::DecryptedMessageActionRequestKey { exchange_id, g_a },
        ))
    }

    /// Handles an incoming `RequestKey`. Accepts it outright if no exchange
    /// is in progress; if we *also* have one in flight (both sides raced),
    /// the side with the lower `exchange_id` yields to the other's,
    /// discarding its own pending request.
    pub fn accept_key_exchange(
        &mut self,
        peer_exchange_id: i64,
        peer_g_a: &[u8],
    ) -> Result<enums::DecryptedMessageAction, KeyExchangeError> {
        match self.exchange_state {
            ExchangeState::None => {}
            ExchangeState::Requested if peer_exchange_id > self.exchange_id => {
                self.exchange_creator = None;
            }
            state => {
                return key_exchange_error::UnexpectedActionSnafu {
                    action: "RequestKey",
                    state,
                }
                .fail();
            }
        }

        let (g_b, key, fingerprint) = ParticipantHandshake::accept(self.dh_g, &self.dh_p, peer_g_a)
            .context(key_exchange_error::HandshakeSnafu)?;

        self.exchange_id = peer_exchange_id;
        self.exchange_key = Some(key);
        self.exchange_state = ExchangeState::Accepted;

        Ok(enums::DecryptedMessageAction::AcceptKey(
            types::DecryptedMessageActionAcceptKey {
                exchange_id: peer_exchange_id,
                g_b,
                key_fingerprint: fingerprint,
            },
        ))
    }

    /// Handles an incoming `AcceptKey` as the exchange's requester: completes
    /// the DH exchange, moves to `Committed`, and returns the `CommitKey` to
    /// send. The new key is not used for outgoing traffic yet.
    pub fn commit_key_exchange(
        &mut self,
        peer_exchange_id: i64,
        peer_g_b: &[u8],
        peer_key_fingerprint: i64,
    ) -> Result<enums::DecryptedMessageAction, KeyExchangeError> {
        if self.exchange_state != ExchangeState::Requested {
            return key_exchange_error::UnexpectedActionSnafu {
                action: "AcceptKey",
                state: self.exchange_state,
            }
            .fail();
        }
        if peer_exchange_id != self.exchange_id {
            return key_exchange_error::ExchangeIdMismatchSnafu {
                incoming: peer_exchange_id,
                ours: self.exchange_id,
            }
            .fail();
        }

        let creator = self
            .exchange_creator
            .take()
            .expect("Requested always carries a pending creator handshake");
        let key = creator
            .complete(peer_g_b, peer_key_fingerprint)
            .context(key_exchange_error::HandshakeSnafu)?;

        self.exchange_key = Some(key);
        self.exchange_state = ExchangeState::Committed;

        Ok(enums::DecryptedMessageAction::CommitKey(
            types::DecryptedMessageActionCommitKey {
                exchange_id: peer_exchange_id,
                key_fingerprint: peer_key_fingerprint,
            },
        ))
    }

    /// Handles an incoming `CommitKey` as the exchange's acceptor: the
    /// requester has switched over, so we can promote our own pending key
    /// right away.
    pub fn confirm_key_exchange(&mut self, peer_exchange_id: i64) -> Result<(), KeyExchangeError> {
        if self.exchange_state != ExchangeState::Accepted {
            return key_exchange_error::UnexpectedActionSnafu {
                action: "CommitKey",
                state: self.exchange_state,
            }
            .fail();
        }
        if peer_exchange_id != self.exchange_id {
            return key_exchange_error::ExchangeIdMismatchSnafu {
                incoming: peer_exchange_id,
                ours: self.exchange_id,
            }
            .fail();
        }

        self.promote_exchange_key();
        Ok(())
    }

    /// Handles an incoming `AbortKey`, or a local decision to give up on the
    /// current re-key, discarding any pending exchange key.
    pub fn abort_key_exchange(&mut self, peer_exchange_id: i64) -> Result<(), KeyExchangeError> {
        if self.exchange_state == ExchangeState::None {
            return key_exchange_error::NotInProgressSnafu.fail();
        }
        if peer_exchange_id != self.exchange_id {
            return key_exchange_error::ExchangeIdMismatchSnafu {
                incoming: peer_exchange_id,
                ours: self.exchange_id,
            }
            .fail();
        }

        self.exchange_state = ExchangeState::None;
        self.exchange_id = 0;
        self.exchange_key = None;
        self.exchange_creator = None;
        Ok(())
    }

    fn promote_exchange_key(&mut self) {
        if let Some(key) = self.exchange_key.take() {
            self.key_fingerprint = crypto::key_fingerprint(&key);
            self.key = key;
        }
        self.exchange_state = ExchangeState::None;
        self.exchange_id = 0;
        self.exchange_creator = None;
    }
}

fn message_random_id(message: &enums::DecryptedMessage) -> i64 {
    match message {
        enums::DecryptedMessage::Message(m) => m.random_id,
        enums::DecryptedMessage::Service(m) => m.random_id,
    }
}

fn random_i64() -> i64 {
    let mut bytes = [0u8; 8];
    getrandom(&mut bytes).expect("failed to generate an exchange id");
    i64::from_le_bytes(bytes)
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    getrandom(&mut bytes).expect("failed to generate decryptedMessageLayer padding");
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_prime() -> Vec<u8> {
        let mut p = vec![0xffu8; 256];
        p[0] = 0xc7;
        p
    }

    fn established_pair() -> (SecretChat, SecretChat) {
        let (mut creator, g_a) = SecretChat::create_outgoing(1, 100, 200, 3, test_prime()).unwrap();
        let mut participant = SecretChat::incoming_request(1, 100, 200, 3, test_prime(), g_a);
        let (g_b, fingerprint) = participant.accept().unwrap();
        creator.finalize(&g_b, fingerprint).unwrap();
        (creator, participant)
    }

    #[test]
    fn creator_and_participant_establish_the_same_key() {
        let (creator, participant) = established_pair();
        assert_eq!(creator.state(), SecretChatState::Ok);
        assert_eq!(participant.state(), SecretChatState::Ok);
        assert_eq!(creator.key_fingerprint(), participant.key_fingerprint());
    }

    #[test]
    fn encrypted_text_round_trips_and_advances_sequence() {
        let (mut creator, mut participant) = established_pair();

        let wire = creator.encrypt_text(1234, "hello".to_string());
        let incoming = participant.decrypt_message(&wire).unwrap();
        assert_eq!(incoming.gap, None);
        participant.accept_incoming(incoming.out_seq_no);

        match incoming.message {
            enums::DecryptedMessage::Message(m) => {
                assert_eq!(m.random_id, 1234);
                assert_eq!(m.message, "hello");
            }
            _ => panic!("expected a plain message"),
        }
    }

    #[test]
    fn out_of_order_message_reports_a_gap() {
        let (mut creator, mut participant) = established_pair();

        let _first = creator.encrypt_text(1, "one".to_string());
        let second = creator.encrypt_text(2, "two".to_string());

        let incoming = participant.decrypt_message(&second).unwrap();
        assert_eq!(incoming.gap, Some((0, 0)));
    }

    #[test]
    fn decrypt_rejects_an_unknown_fingerprint() {
        let (_creator, mut participant) = established_pair();
        let garbage = vec![0u8; 64];
        assert!(participant.decrypt_message(&garbage).is_err());
    }

    #[test]
    fn key_exchange_establishes_a_new_key_and_both_sides_switch_over() {
        let (mut a, mut b) = established_pair();
        let old_fingerprint = a.key_fingerprint();

        let request = a.request_key_exchange().unwrap();
        let (exchange_id, g_a) = match request {
            enums::DecryptedMessageAction::RequestKey(r) => (r.exchange_id, r.g_a),
            _ => panic!("expected RequestKey"),
        };

        let accept = b.accept_key_exchange(exchange_id, &g_a).unwrap();
        let (g_b, peer_fingerprint) = match accept {
            enums::DecryptedMessageAction::AcceptKey(a) => (a.g_b, a.key_fingerprint),
            _ => panic!("expected AcceptKey"),
        };

        let commit = a.commit_key_exchange(exchange_id, &g_b, peer_fingerprint).unwrap();
        assert_eq!(a.exchange_state(), ExchangeState::Committed);
        match commit {
            enums::DecryptedMessageAction::CommitKey(_) => {}
            _ => panic!("expected CommitKey"),
        }

        // b promotes immediately on the commit action.
        b.confirm_key_exchange(exchange_id).unwrap();
        assert_eq!(b.exchange_state(), ExchangeState::None);
        assert_ne!(b.key_fingerprint(), old_fingerprint);

        // a only promotes once it sees traffic decrypt under the new key.
        assert_eq!(a.key_fingerprint(), old_fingerprint);
        let wire = b.encrypt_text(1, "under the new key".to_string());
        let incoming = a.decrypt_message(&wire).unwrap();
        a.accept_incoming(incoming.out_seq_no);
        assert_eq!(a.exchange_state(), ExchangeState::None);
        assert_eq!(a.key_fingerprint(), b.key_fingerprint());
        assert_ne!(a.key_fingerprint(), old_fingerprint);
    }

    #[test]
    fn simultaneous_requests_are_resolved_by_exchange_id() {
        let (mut a, mut b) = established_pair();

        let request_a = a.request_key_exchange().unwrap();
        let request_b = b.request_key_exchange().unwrap();

        let (id_a, g_a) = match request_a {
            enums::DecryptedMessageAction::RequestKey(r) => (r.exchange_id, r.g_a),
            _ => unreachable!(),
        };
        let (id_b, g_b_value) = match request_b {
            enums::DecryptedMessageAction::RequestKey(r) => (r.exchange_id, r.g_a),
            _ => unreachable!(),
        };

        // Whichever side holds the lower exchange_id yields to the other's
        // request instead of keeping its own.
        if id_a > id_b {
            let accepted = b.accept_key_exchange(id_a, &g_a).unwrap();
            assert!(matches!(accepted, enums::DecryptedMessageAction::AcceptKey(_)));
            assert_eq!(b.exchange_state(), ExchangeState::Accepted);
        } else {
            let accepted = a.accept_key_exchange(id_b, &g_b_value).unwrap();
            assert!(matches!(accepted, enums::DecryptedMessageAction::AcceptKey(_)));
            assert_eq!(a.exchange_state(), ExchangeState::Accepted);
        }
    }

    #[test]
    fn abort_key_exchange_discards_the_pending_key() {
        let (mut a, mut b) = established_pair();
        let old_fingerprint = a.key_fingerprint();

        let request = a.request_key_exchange().unwrap();
        let exchange_id = match request {
            enums::DecryptedMessageAction::RequestKey(r) => r.exchange_id,
            _ => unreachable!(),
        };

        b.abort_key_exchange(exchange_id).unwrap_err(); // b never started one
        a.abort_key_exchange(exchange_id).unwrap();
        assert_eq!(a.exchange_state(), ExchangeState::None);
        assert_eq!(a.key_fingerprint(), old_fingerprint);
    }

    #[derive(Default)]
    struct MemoryStorage {
        messages: std::sync::Mutex<Vec<UnconfirmedMessage>>,
    }

    impl SecretMessageStorage for MemoryStorage {
        fn store_message(&self, message: UnconfirmedMessage) {
            self.messages.lock().unwrap().push(message);
        }

        fn update_message(&self, message: UnconfirmedMessage) {
            let mut messages = self.messages.lock().unwrap();
            if let Some(existing) = messages.iter_mut().find(|m| m.message_id == message.message_id) {
                *existing = message;
            }
        }

        fn load_messages_by_seq_no(
            &self,
            chat_id: i32,
            seq_no_start: i32,
            seq_no_end: i32,
            direction: SecretMessageDirection,
        ) -> Vec<UnconfirmedMessage> {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| {
                    m.chat_id == chat_id
                        && m.direction == direction
                        && m.out_seq_no >= seq_no_start
                        && (seq_no_end < 0 || m.out_seq_no <= seq_no_end)
                })
                .cloned()
                .collect()
        }

        fn remove_messages_by_seq_no(
            &self,
            chat_id: i32,
            seq_no_start: i32,
            seq_no_end: i32,
            direction: SecretMessageDirection,
        ) {
            self.messages.lock().unwrap().retain(|m| {
                !(m.chat_id == chat_id
                    && m.direction == direction
                    && m.out_seq_no >= seq_no_start
                    && (seq_no_end < 0 || m.out_seq_no <= seq_no_end))
            });
        }
    }

    #[test]
    fn sending_a_message_persists_it_until_the_peer_acknowledges_it() {
        let (mut creator, mut participant) = established_pair();
        let storage = Arc::new(MemoryStorage::default());
        creator.attach_storage(storage.clone());

        let wire = creator.encrypt_text(1, "one".to_string());
        assert_eq!(
            storage
                .load_messages_by_seq_no(1, 0, -1, SecretMessageDirection::Outgoing)
                .len(),
            1
        );

        let incoming = participant.decrypt_message(&wire).unwrap();
        participant.accept_incoming(incoming.out_seq_no);

        // The peer's reply acknowledges our first message, pruning it.
        let reply = participant.encrypt_text(2, "ack".to_string());
        creator.decrypt_message(&reply).unwrap();
        assert!(storage
            .load_messages_by_seq_no(1, 0, -1, SecretMessageDirection::Outgoing)
            .is_empty());
    }

    #[test]
    fn out_of_order_message_is_persisted_until_the_gap_is_filled() {
        let (mut creator, mut participant) = established_pair();
        let storage = Arc::new(MemoryStorage::default());
        participant.attach_storage(storage.clone());

        let _first = creator.encrypt_text(1, "one".to_string());
        let second = creator.encrypt_text(2, "two".to_string());

        let incoming = participant.decrypt_message(&second).unwrap();
        assert!(incoming.gap.is_some());
        assert_eq!(
            storage
                .load_messages_by_seq_no(1, 0, -1, SecretMessageDirection::Incoming)
                .len(),
            1
        );

        participant.accept_incoming(incoming.out_seq_no);
        assert!(storage
            .load_messages_by_seq_no(1, 0, -1, SecretMessageDirection::Incoming)
            .is_empty());
    }

    #[test]
    fn resend_request_returns_the_original_blob_under_its_original_message_id() {
        let (mut creator, _participant) = established_pair();
        let storage = Arc::new(MemoryStorage::default());
        creator.attach_storage(storage);

        let wire = creator.encrypt_text(42, "hello again".to_string());
        let stored = creator.messages_to_resend(0, 0);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].message_id, 42);
        assert_eq!(stored[0].blob, wire);
    }

    #[test]
    fn restart_reconstruction_continues_outgoing_sequence_numbers() {
        let (mut creator, _participant) = established_pair();
        let storage = Arc::new(MemoryStorage::default());
        creator.attach_storage(storage.clone());
        let _ = creator.encrypt_text(1, "one".to_string());
        let _ = creator.encrypt_text(2, "two".to_string());

        let (mut reloaded, _) = SecretChat::create_outgoing(1, 100, 200, 3, test_prime()).unwrap();
        reloaded.attach_storage(storage);
        reloaded.restore_from_storage();

        let wire = reloaded.encrypt_text(3, "three".to_string());
        let layer = enums::DecryptedMessageLayer::from_bytes(
            &crypto::decrypt_layer_v1(&reloaded.key, &wire[8..]).unwrap(),
        )
        .unwrap();
        let enums::DecryptedMessageLayer::Layer(layer) = layer;
        assert_eq!(seq::from_raw(layer.out_seq_no), 2);
    }
}
