// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use snafu::Snafu;

/// Failure while decrypting an incoming [`crate::SecretChat`] message.
#[derive(Snafu, Debug, Clone, PartialEq)]
#[snafu(visibility(pub(crate)))]
#[snafu(module(decrypt_error))]
pub enum DecryptError {
    #[snafu(display("message is too short to contain a fingerprint and message key"))]
    Truncated,

    #[snafu(display("message fingerprint does not match the current key or, during a key \
        exchange, the pending one"))]
    FingerprintMismatch,

    #[snafu(display("recomputed message key does not match the one in the message"))]
    MessageKeyMismatch,

    #[snafu(display("decrypted payload is not a well-formed decrypted message layer"))]
    Malformed,

    #[snafu(display("decrypted message carries a different random_id than the envelope"))]
    RandomIdMismatch,
}

/// Failure while validating `in_seq_no`/`out_seq_no` on an incoming message.
#[derive(Snafu, Debug, Clone, Copy, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
#[snafu(module(seq_error))]
pub enum SeqError {
    #[snafu(display("peer's raw sequence numbers have the wrong parity for their admin role"))]
    BadParity,

    #[snafu(display("peer claims we have seen out_seq_no {claimed}, but we only sent up to {ours}"))]
    AckTooHigh { claimed: i32, ours: i32 },

    #[snafu(display(
        "message out_seq_no {out_seq_no} is at or before our in_seq_no {in_seq_no}, duplicate or replay"
    ))]
    AlreadySeen { out_seq_no: i32, in_seq_no: i32 },
}

/// Failure in the initial (creator/participant) Diffie-Hellman handshake.
#[derive(Snafu, Debug, Clone, PartialEq)]
#[snafu(visibility(pub(crate)))]
#[snafu(module(handshake_error))]
pub enum HandshakeError {
    #[snafu(display("g, g_a or g_b is outside of the safe [1+eps, p-1-eps] range"))]
    UnsafeGParam,

    #[snafu(display("the dh_config's prime is not usable"))]
    BadPrime,

    #[snafu(display("server returned key_fingerprint {server}, but we computed {ours}"))]
    FingerprintMismatch { server: i64, ours: i64 },
}

/// Failure while driving the PFS re-keying state machine.
#[derive(Snafu, Debug, Clone, PartialEq)]
#[snafu(visibility(pub(crate)))]
#[snafu(module(key_exchange_error))]
pub enum KeyExchangeError {
    #[snafu(display("a key exchange is already in progress"))]
    AlreadyInProgress,

    #[snafu(display("no key exchange is in progress"))]
    NotInProgress,

    #[snafu(display("exchange_id {incoming} does not match the in-progress exchange {ours}"))]
    ExchangeIdMismatch { incoming: i64, ours: i64 },

    #[snafu(display("received {action} in exchange state {state:?}"))]
    UnexpectedAction {
        action: &'static str,
        state: crate::chat::ExchangeState,
    },

    #[snafu(display("{source}"))]
    Handshake { source: HandshakeError },
}
