// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use std::io;
use std::net::{SocketAddrV4, SocketAddrV6};

use crate::generated::types::{UpdateState, User};

/// A datacenter option.
///
/// This is very similar to Telegram's own `dcOption` type, except it also
/// contains the permanent authentication key and serves as a stable interface
/// regardless of the underlying storage.
#[derive(Clone, Debug, PartialEq)]
pub struct DcOption {
    /// Datacenter identifier.
    ///
    /// The primary datacenters have IDs from 1 to 5 inclusive, and are known
    /// statically (see [`crate::KNOWN_DC_OPTIONS`]).
    pub id: i32,
    /// IPv4 address corresponding to this datacenter.
    pub ipv4: SocketAddrV4,
    /// IPv6 address corresponding to this datacenter. May embed [`Self::ipv4`].
    pub ipv6: SocketAddrV6,
    /// Permanent authorization key generated for encrypted communication
    /// with this datacenter, if one has been generated already.
    pub auth_key: Option<[u8; 256]>,
}

/// The trait used by session implementations.
///
/// All methods are synchronous and take `&self` so that a single session
/// can be shared (typically behind an [`std::sync::Arc`]) across the
/// several concurrent connections a client may hold open to different
/// datacenters at once.
pub trait Session: Send + Sync {
    /// Datacenter that is "home" to the user authorized by this session.
    ///
    /// If not known yet, the ID of the closest datacenter should be used instead.
    fn home_dc_id(&self) -> i32;

    /// Changes [`Session::home_dc_id`] after finding out the actual datacenter
    /// the main queries should be executed against.
    fn set_home_dc_id(&self, dc_id: i32);

    /// Query a single datacenter option.
    ///
    /// If no up-to-date option has been stored via [`Session::set_dc_option`]
    /// yet, a statically-known option must be returned instead.
    fn dc_option(&self, dc_id: i32) -> Option<DcOption>;

    /// Update the previously-known [`Session::dc_option`] with new values.
    ///
    /// Also used after generating a permanent authorization key for a datacenter.
    fn set_dc_option(&self, dc_option: &DcOption);

    /// Query the signed-in user, if any.
    fn signed_in_user(&self) -> Option<User>;

    /// Remember the user that is now signed in with this session.
    fn set_signed_in_user(&self, user: User);

    /// Loads the entire updates state, if the session has processed any updates before.
    fn get_state(&self) -> Option<UpdateState>;

    /// Overwrites the entire updates state.
    fn set_state(&self, state: UpdateState);

    /// Persist the data to its backing storage, if any.
    fn save(&self) -> io::Result<()>;
}
