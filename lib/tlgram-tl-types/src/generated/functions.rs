// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![allow(
    clippy::cognitive_complexity,
    clippy::identity_op,
    clippy::unreadable_literal
)]

//! This module contains all of the functions, each
//! represented by a `struct`. All of them implement
//! [`Identifiable`] and [`Serializable`].
//!
//! To find out the type that Telegram will return upon
//! invoking one of these requests, check out the associated
//! type in the corresponding [`RemoteCall`] trait impl.
//!
//! [`Identifiable`]: ../trait.Identifiable.html
//! [`Serializable`]: ../trait.Serializable.html
//! [`RemoteCall`]: trait.RemoteCall.html

include!(concat!(env!("OUT_DIR"), "/generated_functions.rs"));

use crate::{Identifiable, RemoteCall, Serializable};

/// Wraps a query, asking the server to process it using the schema of the
/// given layer. The generator turns the schema's bare generic reference
/// (`{X:Type} ... query:!X = X`) into an opaque [`crate::Blob`], which would
/// throw away the static [`RemoteCall::Return`] this wrapper only exists to carry
/// through, so it's hand-written here as a real Rust generic instead.
pub struct InvokeWithLayer<Q> {
    pub layer: i32,
    pub query: Q,
}

impl<Q> Identifiable for InvokeWithLayer<Q> {
    const CONSTRUCTOR_ID: u32 = 0xda9b_0d0d;
}

impl<Q: Serializable> Serializable for InvokeWithLayer<Q> {
    fn serialize<B: std::io::Write>(&self, buf: &mut B) -> std::io::Result<()> {
        Self::CONSTRUCTOR_ID.serialize(buf)?;
        self.layer.serialize(buf)?;
        self.query.serialize(buf)
    }
}

impl<Q: RemoteCall> RemoteCall for InvokeWithLayer<Q> {
    type Return = Q::Return;
}

/// Wraps a query with the connection parameters Telegram wants on the first
/// request made after establishing a transport connection. Same generic
/// wrapper situation as [`InvokeWithLayer`]. `proxy` and `params` are never
/// populated by this client, so their bits in `flags` are always unset and
/// the fields themselves carry no real payload type.
pub struct InitConnection<Q> {
    pub api_id: i32,
    pub device_model: String,
    pub system_version: String,
    pub app_version: String,
    pub system_lang_code: String,
    pub lang_pack: String,
    pub lang_code: String,
    pub proxy: Option<()>,
    pub params: Option<()>,
    pub query: Q,
}

impl<Q> Identifiable for InitConnection<Q> {
    const CONSTRUCTOR_ID: u32 = 0xc1cd_5ea9;
}

impl<Q: Serializable> Serializable for InitConnection<Q> {
    fn serialize<B: std::io::Write>(&self, buf: &mut B) -> std::io::Result<()> {
        debug_assert!(self.proxy.is_none() && self.params.is_none());
        Self::CONSTRUCTOR_ID.serialize(buf)?;
        0u32.serialize(buf)?; // flags: proxy and params bits are never set
        self.api_id.serialize(buf)?;
        self.device_model.serialize(buf)?;
        self.system_version.serialize(buf)?;
        self.app_version.serialize(buf)?;
        self.system_lang_code.serialize(buf)?;
        self.lang_pack.serialize(buf)?;
        self.lang_code.serialize(buf)?;
        self.query.serialize(buf)
    }
}

impl<Q: RemoteCall> RemoteCall for InitConnection<Q> {
    type Return = Q::Return;
}
