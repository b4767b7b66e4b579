// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! This library is an implementation of the [Mobile Transport Protocol].
//!
//! It is capable of efficiently packing enqueued requests into message
//! containers to later be encrypted and transmitted, and processing the
//! server responses to maintain a correct state. Use [`authentication`] to
//! generate an authorization key, and [`mtp`] to exchange requests and
//! responses once one is available. [`transport`] packs the resulting bytes
//! for transmission over TCP.
//!
//! [Mobile Transport Protocol]: https://core.telegram.org/mtproto

pub mod authentication;
pub mod errors;
mod manual_tl;
pub mod mtp;
pub mod transport;
mod utils;

/// The default compression threshold to be used.
///
/// Outgoing messages larger than this many bytes will be compressed with
/// gzip before being sent, provided doing so would not make them larger.
pub const DEFAULT_COMPRESSION_THRESHOLD: Option<usize> = Some(512);

/// A Message Identifier.
///
/// When requests are enqueued, a new associated message identifier is
/// returned. As server responses get processed, some of them will be a
/// response to a previous request: match the identifier returned by
/// [`mtp::Mtp::push`] against the ones in [`mtp::Deserialization::rpc_results`]
/// to find out which.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct MsgId(i64);
