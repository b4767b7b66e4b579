// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The layer-v1 message key schedule used by secret chats.
//!
//! Secret chats never adopted MTProto 2.0's `calc_key`: every client still
//! derives `aes_key`/`aes_iv` from four interleaved SHA1 digests of the
//! 256-byte chat key, the same algorithm the plain MTProto 1.0 transport
//! used before it was replaced. There is deliberately no `x` client/server
//! offset here, unlike [`tlgram_crypto`]'s `calc_key`: the chat key itself,
//! not the side performing the operation, picks which half is used.

use getrandom::getrandom;
use tlgram_crypto::{decrypt_ige, encrypt_ige, sha1};

/// Number of bytes of the shared secret used to key a secret chat, matching
/// the authorization key size it is generated to resemble.
pub const KEY_SIZE: usize = 256;

/// `key` and `iv` derived from a 256-byte chat key and a 16-byte message key.
fn calc_key_iv_v1(key: &[u8; KEY_SIZE], msg_key: &[u8; 16]) -> ([u8; 32], [u8; 32]) {
    let sha1a = sha1!(msg_key, &key[0..32]);
    let sha1b = sha1!(&key[32..48], msg_key, &key[48..64]);
    let sha1c = sha1!(&key[64..96], msg_key);
    let sha1d = sha1!(msg_key, &key[96..128]);

    let mut aes_key = [0u8; 32];
    aes_key[0..8].copy_from_slice(&sha1a[0..8]);
    aes_key[8..20].copy_from_slice(&sha1b[8..20]);
    aes_key[20..32].copy_from_slice(&sha1c[4..16]);

    let mut aes_iv = [0u8; 32];
    aes_iv[0..12].copy_from_slice(&sha1a[8..20]);
    aes_iv[12..20].copy_from_slice(&sha1b[0..8]);
    aes_iv[20..24].copy_from_slice(&sha1c[16..20]);
    aes_iv[24..32].copy_from_slice(&sha1d[0..8]);

    (aes_key, aes_iv)
}

/// The message key is the middle 16 bytes (offset 4..20) of the SHA1 of the
/// 4-byte little-endian content length followed by the content itself. The
/// random padding appended purely for block alignment is deliberately left
/// out of this hash, mirroring the reference client: the receiver recomputes
/// it only over the `x` bytes its decrypted length field claims.
fn msg_key_v1(len_prefixed_content: &[u8]) -> [u8; 16] {
    let digest = sha1!(len_prefixed_content);
    let mut key = [0u8; 16];
    key.copy_from_slice(&digest[4..20]);
    key
}

/// The lower 64 bits of SHA1(key), used by both sides to agree on which
/// 256-byte secret a message was encrypted with.
pub fn key_fingerprint(key: &[u8; KEY_SIZE]) -> i64 {
    let digest = sha1!(key);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[12..20]);
    i64::from_le_bytes(bytes)
}

/// Encrypts `payload` (an already-serialized `decryptedMessageLayer`) under
/// `key`, returning `message_key (16 bytes) || ciphertext`. The caller is
/// responsible for prefixing the resulting bytes with the key's fingerprint.
pub fn encrypt_layer_v1(key: &[u8; KEY_SIZE], payload: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(4 + payload.len());
    content.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    content.extend_from_slice(payload);

    let msg_key = msg_key_v1(&content);

    // The reference padding range is 15-27 random bytes of obfuscation on
    // top of whatever block alignment demands; round up to the next 16-byte
    // boundary after that so the IGE cipher never has to pad on our behalf.
    let mut pad_len = 15 + (random_byte() % 13) as usize;
    while (content.len() + pad_len) % 16 != 0 {
        pad_len += 1;
    }
    let mut padding = vec![0u8; pad_len];
    getrandom(&mut padding).expect("failed to generate secret chat padding");
    content.extend_from_slice(&padding);

    let (aes_key, aes_iv) = calc_key_iv_v1(key, &msg_key);
    let ciphertext = encrypt_ige(&content, &aes_key, &aes_iv);

    let mut out = Vec::with_capacity(16 + ciphertext.len());
    out.extend_from_slice(&msg_key);
    out.extend_from_slice(&ciphertext);
    out
}

/// Decrypts `message_key || ciphertext` (as produced by [`encrypt_layer_v1`])
/// under `key`, returning the serialized `decryptedMessageLayer` payload with
/// its padding stripped. Returns `None` if the recomputed message key does
/// not match, which signals either data corruption or the wrong key.
pub fn decrypt_layer_v1(key: &[u8; KEY_SIZE], msg_key_and_ciphertext: &[u8]) -> Option<Vec<u8>> {
    if msg_key_and_ciphertext.len() < 16 {
        return None;
    }
    let mut msg_key = [0u8; 16];
    msg_key.copy_from_slice(&msg_key_and_ciphertext[..16]);
    let ciphertext = &msg_key_and_ciphertext[16..];
    if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
        return None;
    }

    let (aes_key, aes_iv) = calc_key_iv_v1(key, &msg_key);
    let content = decrypt_ige(ciphertext, &aes_key, &aes_iv);
    if content.len() < 4 {
        return None;
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&content[..4]);
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len % 4 != 0 || 4 + len > content.len() {
        return None;
    }

    if msg_key_v1(&content[..4 + len]) != msg_key {
        return None;
    }

    Some(content[4..4 + len].to_vec())
}

fn random_byte() -> u8 {
    let mut b = [0u8; 1];
    getrandom(&mut b).expect("failed to generate a random byte");
    b[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        key.iter_mut().enumerate().for_each(|(i, b)| *b = i as u8);
        key
    }

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let key = test_key();
        let payload = b"a serialized decryptedMessageLayer would go here".to_vec();
        let wire = encrypt_layer_v1(&key, &payload);
        let decrypted = decrypt_layer_v1(&key, &wire).expect("decryption should succeed");
        assert_eq!(decrypted, payload);
    }

    #[test]
    fn decrypt_rejects_wrong_key() {
        let key = test_key();
        let mut other_key = test_key();
        other_key[0] ^= 0xff;

        let wire = encrypt_layer_v1(&key, b"hello");
        assert_eq!(decrypt_layer_v1(&other_key, &wire), None);
    }

    #[test]
    fn decrypt_rejects_truncated_input() {
        let key = test_key();
        assert_eq!(decrypt_layer_v1(&key, &[0u8; 4]), None);
    }

    #[test]
    fn key_fingerprint_is_stable_for_same_key() {
        let key = test_key();
        assert_eq!(key_fingerprint(&key), key_fingerprint(&key));

        let mut other = test_key();
        other[0] ^= 1;
        assert_ne!(key_fingerprint(&key), key_fingerprint(&other));
    }
}
