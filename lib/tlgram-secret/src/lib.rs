#![deny(unsafe_code)]

//! End-to-end encrypted secret chats.
//!
//! This crate implements the cryptography and state machines a secret chat
//! needs - the layer-v1 message key schedule, the chat-level Diffie-Hellman
//! handshake (both for creation and for in-chat re-keying), and the strict
//! `in_seq_no`/`out_seq_no` bookkeeping that guards ordering - without
//! performing any network I/O itself. The caller drives the actual
//! `messages.requestEncryption`/`acceptEncryption`/`sendEncrypted*` RPCs
//! using the real API types from `tlgram-tl-types`, and feeds their results
//! into [`SecretChat`].

mod chat;
mod crypto;
mod errors;
mod generated;
mod handshake;
mod seq;
mod storage;

pub use chat::{ExchangeState, IncomingMessage, SecretChat, SecretChatState, SequenceGap};
pub use crypto::KEY_SIZE;
pub use errors::{DecryptError, HandshakeError, KeyExchangeError, SeqError};
pub use generated::enums::{DecryptedMessage, DecryptedMessageAction, DecryptedMessageLayer};
pub use handshake::{CreatorHandshake, ParticipantHandshake};
pub use storage::{SecretMessageDirection, SecretMessageStorage, UnconfirmedMessage};

// Needed for auto-generated definitions.
use generated::{enums, types};
use tlgram_tl_types::{Deserializable, Identifiable, Serializable, deserialize};
