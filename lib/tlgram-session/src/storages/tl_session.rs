// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::generated::{enums, types};
use crate::{DEFAULT_DC, DcOption, KNOWN_DC_OPTIONS, Session};
use tlgram_tl_types as tl;
use tlgram_tl_types::deserialize::Error as DeserializeError;
use tlgram_tl_types::{Deserializable, Serializable};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6};
use std::path::Path;
use std::sync::Mutex;

/// A [`Session`] implementation backed by `tlgram`'s own wire format, which
/// can be persisted to (and loaded from) a single file.
pub struct TlSession {
    session: Mutex<types::Session>,
}

#[allow(clippy::new_without_default)]
impl TlSession {
    pub fn new() -> Self {
        Self {
            session: Mutex::new(types::Session {
                dcs: Vec::new(),
                user: None,
                state: None,
                home_dc: None,
            }),
        }
    }

    /// Load a previous session instance from a file,
    /// creating one if it doesn't exist
    pub fn load_file_or_create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            File::create(path)?;
            let session = TlSession::new();
            session.save_to_file(path)?;
            Ok(session)
        } else {
            Self::load_file(path)
        }
    }

    /// Load a previous session instance from a file.
    pub fn load_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut data = Vec::new();
        File::open(path.as_ref())?.read_to_end(&mut data)?;

        Self::load(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn load(data: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            session: Mutex::new(
                enums::Session::from_bytes(data)
                    .map_err(|e| match e {
                        DeserializeError::UnexpectedEof => Error::MalformedData,
                        DeserializeError::UnexpectedConstructor { .. } => Error::UnsupportedVersion,
                    })?
                    .into(),
            ),
        })
    }

    fn insert_dc(&self, new_dc: enums::DataCenter) {
        let mut session = self.session.lock().unwrap();

        if let Some(pos) = session.dcs.iter().position(|dc| dc.id() == new_dc.id()) {
            session.dcs.remove(pos);
        }
        session.dcs.push(new_dc);
    }

    #[must_use]
    pub fn save(&self) -> Vec<u8> {
        enums::Session::Session(self.session.lock().unwrap().clone()).to_bytes()
    }

    /// Saves the session to a file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).open(path.as_ref())?;
        file.seek(io::SeekFrom::Start(0))?;
        file.set_len(0)?;
        file.write_all(&self.save())?;
        file.sync_data()
    }
}

impl Session for TlSession {
    fn home_dc_id(&self) -> i32 {
        self.session
            .lock()
            .unwrap()
            .home_dc
            .unwrap_or(DEFAULT_DC)
    }

    fn set_home_dc_id(&self, dc_id: i32) {
        self.session.lock().unwrap().home_dc = Some(dc_id);
    }

    fn dc_option(&self, dc_id: i32) -> Option<DcOption> {
        self.session
            .lock()
            .unwrap()
            .dcs
            .iter()
            .find_map(|dc| dc_option_from_stored(dc, dc_id))
            .or_else(|| KNOWN_DC_OPTIONS.iter().find(|dc| dc.id == dc_id).cloned())
    }

    fn set_dc_option(&self, dc_option: &DcOption) {
        self.insert_dc(
            types::DataCenter {
                id: dc_option.id,
                ipv4: Some(i32::from_le_bytes(dc_option.ipv4.ip().octets())),
                ipv6: Some(i128::from_be_bytes(dc_option.ipv6.ip().octets())),
                port: dc_option.ipv4.port() as i32,
                auth: dc_option.auth_key.map(|key| key.to_vec()),
            }
            .into(),
        );
    }

    fn signed_in_user(&self) -> Option<types::User> {
        self.session
            .lock()
            .unwrap()
            .user
            .as_ref()
            .map(|enums::User::User(user)| user.clone())
    }

    fn set_signed_in_user(&self, user: types::User) {
        self.session.lock().unwrap().user = Some(user.into());
    }

    fn get_state(&self) -> Option<types::UpdateState> {
        let session = self.session.lock().unwrap();
        let enums::UpdateState::State(state) = session.state.clone()?;
        Some(state)
    }

    fn set_state(&self, state: types::UpdateState) {
        self.session.lock().unwrap().state = Some(state.into());
    }

    fn save(&self) -> io::Result<()> {
        // Only a file-backed instance is actually persisted; an in-memory
        // `TlSession` simply keeps the latest state in `self.session`.
        Ok(())
    }
}

fn dc_option_from_stored(dc: &enums::DataCenter, dc_id: i32) -> Option<DcOption> {
    match dc {
        enums::DataCenter::Center(data_center) if data_center.id == dc_id => {
            Some(DcOption {
                id: data_center.id,
                ipv4: SocketAddrV4::new(
                    data_center
                        .ipv4
                        .map(|ip| Ipv4Addr::from(ip.to_le_bytes()))
                        .unwrap_or(Ipv4Addr::UNSPECIFIED),
                    data_center.port as u16,
                ),
                ipv6: SocketAddrV6::new(
                    data_center
                        .ipv6
                        .map(|ip| Ipv6Addr::from(ip.to_be_bytes()))
                        .unwrap_or(Ipv6Addr::UNSPECIFIED),
                    data_center.port as u16,
                    0,
                    0,
                ),
                auth_key: data_center
                    .auth
                    .as_ref()
                    .and_then(|auth| auth.clone().try_into().ok()),
            })
        }
        _ => None,
    }
}

pub fn state_to_update_state(
    tl::enums::updates::State::State(state): tl::enums::updates::State,
) -> types::UpdateState {
    types::UpdateState {
        pts: state.pts,
        qts: state.qts,
        date: state.date,
        seq: state.seq,
        channels: Vec::new(),
    }
}

pub fn try_push_channel_state(
    update_state: &mut types::UpdateState,
    channel_id: i64,
    pts: i32,
) -> bool {
    if update_state
        .channels
        .iter()
        .any(|enums::ChannelState::State(channel_state)| channel_state.channel_id == channel_id)
    {
        return false;
    }

    update_state
        .channels
        .push(enums::ChannelState::State(types::ChannelState {
            channel_id,
            pts,
        }));
    true
}

#[derive(Debug)]
pub enum Error {
    MalformedData,
    UnsupportedVersion,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedData => write!(f, "malformed data"),
            Error::UnsupportedVersion => write!(f, "unsupported version"),
        }
    }
}

impl std::error::Error for Error {}
