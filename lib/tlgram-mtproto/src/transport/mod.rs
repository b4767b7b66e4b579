// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Implementation of the several [MTProto transports]. This layer is
//! responsible for taking serialized messages from the MTP and packing them
//! in a format that can be sent over a protocol, such as TCP.
//!
//! [MTProto transports]: https://core.telegram.org/mtproto#mtproto-transport
mod abridged;
mod full;
mod intermediate;
mod obfuscated;

pub use abridged::Abridged;
pub use full::Full;
pub use intermediate::Intermediate;
pub use obfuscated::Obfuscated;
use std::fmt;

use tlgram_crypto::RingBuffer;

/// The error type reported by the different transports when something is wrong.
///
/// Certain transports will only produce certain variants of this error.
///
/// Unless the variant is `MissingBytes`, the connection should not continue.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Not enough bytes are provided.
    MissingBytes,

    /// The length is either too short or too long to represent a valid packet.
    BadLen { got: i32 },

    /// The sequence number received does not match the expected value.
    BadSeq { expected: i32, got: i32 },

    /// The checksum of the packet does not match its expected value.
    BadCrc { expected: u32, got: u32 },

    /// The server sent a negative length, which indicates a transport-level
    /// error status instead of a packet.
    BadStatus { status: u32 },
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error: ")?;
        match self {
            Error::MissingBytes => write!(f, "need more bytes"),
            Error::BadLen { got } => write!(f, "bad len (got {})", got),
            Error::BadSeq { expected, got } => {
                write!(f, "bad seq (expected {}, got {})", expected, got)
            }
            Error::BadCrc { expected, got } => {
                write!(f, "bad crc (expected {}, got {})", expected, got)
            }
            Error::BadStatus { status } => write!(f, "bad status ({})", status),
        }
    }
}

/// The region of a buffer that [`Transport::unpack`] determined held the
/// actual payload, once its framing was validated and (conceptually) stripped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnpackedOffset {
    /// Offset where the payload starts.
    pub data_start: usize,

    /// Offset where the payload ends.
    pub data_end: usize,

    /// Offset of the first byte not belonging to this packet, i.e. where a
    /// following packet (if any) would start.
    pub next_offset: usize,
}

/// The trait used by the transports to pack and unpack the bytes exchanged
/// with the [`crate::mtp::Mtp`] layer.
pub trait Transport {
    /// Packs `buffer` in place, framing it for this transport.
    ///
    /// Panics if `buffer.len()` is not divisible by 4.
    fn pack(&mut self, buffer: &mut RingBuffer<u8>);

    /// Validates and locates the framing of a single packet at the start of
    /// `buffer`, returning the offsets of its payload.
    fn unpack(&mut self, buffer: &mut [u8]) -> Result<UnpackedOffset, Error>;

    /// Resets the transport's state, for instance after a reconnection.
    fn reset(&mut self);
}

/// Transports implementing this trait are susceptible to being wrapped by
/// [`Obfuscated`], which needs the transport's protocol identifier to embed
/// it (encrypted) in the connection's obfuscated header.
pub trait Tagged {
    /// Returns the protocol tag for this transport, and performs any state
    /// change the transport needs before packing under obfuscation (such as
    /// suppressing its own plaintext tag, since obfuscation carries it instead).
    fn init_tag(&mut self) -> [u8; 4];
}
