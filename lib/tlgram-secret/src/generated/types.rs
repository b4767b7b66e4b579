// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![allow(clippy::derive_partial_eq_without_eq)]

//! This module contains all of the bare types used by a decrypted secret
//! chat message, each represented by a `struct`. All of them implement
//! [`Identifiable`], [`Serializable`] and [`Deserializable`].
//!
//! [`Identifiable`]: tlgram_tl_types::Identifiable
//! [`Serializable`]: tlgram_tl_types::Serializable
//! [`Deserializable`]: tlgram_tl_types::Deserializable

include!(concat!(env!("OUT_DIR"), "/generated_types.rs"));
