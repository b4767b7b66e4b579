// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

mod auth;
mod builder;
mod chat_hashes;
mod dialogs;
mod secret_chats;
mod updates;

pub use auth::SignInError;
pub use builder::{ClientBuilder, ClientBuilderError};
pub use secret_chats::SecretChatError;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tlgram_mtsender::{ConnectionParams, SenderPool, SenderPoolHandle};
use tlgram_session::{ChatHashCache, MessageBox, Session, UpdatesLike};
use tlgram_tl_types::{Deserializable, Serializable};

use crate::types::Update;
use secret_chats::{PendingSecretAction, PendingSecretChat, SecretChatEntry};

/// When no locale is found, use this one instead.
const DEFAULT_LOCALE: &str = "en";

/// A client capable of connecting to Telegram and invoking requests.
///
/// The entire client lives on a single event loop: it owns its connections, its
/// update-reconciliation state and its secret chats, none of which are shared via `Arc`/`Mutex`.
/// The caller drives it by repeatedly invoking requests and polling [`Client::next_update`].
pub struct Client {
    pub(crate) config: Config,
    pool: SenderPoolHandle,
    pool_updates: tokio::sync::mpsc::UnboundedReceiver<UpdatesLike>,
    pub(crate) chat_hashes: ChatHashCache,
    pub(crate) message_box: MessageBox,
    pub(crate) update_queue: VecDeque<Update>,
    pub(crate) last_update_limit_warn: Option<Instant>,

    /// Secret chats currently tracked, keyed by their (locally-chosen) chat identifier.
    pub(crate) secret_chats: HashMap<i32, SecretChatEntry>,

    /// Incoming secret chat requests awaiting a call to [`Client::accept_secret_chat`].
    pub(crate) pending_secret_chats: HashMap<i32, PendingSecretChat>,

    /// Cached `(g, p)` pair returned by `messages.getDhConfig`, refreshed whenever the server
    /// reports its `dhConfig` `version` changed.
    pub(crate) dh_config: Option<secret_chats::DhConfig>,

    /// Outgoing secret chat traffic produced while reacting to an incoming update (a re-key
    /// reply, a resend, a `notifyLayer`), queued here since [`Client::convert_update`] cannot
    /// itself await the RPC that sends it. Flushed by [`Client::next_update`].
    pub(crate) pending_secret_actions: VecDeque<PendingSecretAction>,
}

/// Configuration required to create a [`Client`] instance.
pub struct Config {
    /// Session storage where data should persist, such as the authorization key, server
    /// addresses, and other information required by the client between runs.
    pub session: Arc<dyn Session>,

    /// Developer's API ID, required to interact with Telegram's API.
    ///
    /// You may obtain your own at <https://my.telegram.org/auth>.
    pub api_id: i32,

    /// Developer's API hash, required to interact with Telegram's API.
    ///
    /// You may obtain your own at <https://my.telegram.org/auth>.
    pub api_hash: String,

    /// Additional initialization parameters that can have sane defaults.
    pub params: InitParams,
}

/// Optional initialization parameters, required when initializing a connection to Telegram's
/// API.
pub struct InitParams {
    pub device_model: String,
    pub system_version: String,
    pub app_version: String,
    pub system_lang_code: String,
    pub lang_code: String,

    /// Upper bound on how many updates are buffered before older ones get dropped.
    ///
    /// `None` means there is no limit, which risks unbounded memory growth if the caller
    /// never drains [`Client::next_update`].
    pub update_queue_limit: Option<usize>,
}

impl Default for InitParams {
    fn default() -> Self {
        let info = os_info::get();

        let mut system_lang_code = locate_locale::system();
        if system_lang_code.is_empty() {
            system_lang_code.push_str(DEFAULT_LOCALE);
        }

        let mut lang_code = locate_locale::user();
        if lang_code.is_empty() {
            lang_code.push_str(DEFAULT_LOCALE);
        }

        Self {
            device_model: format!("{} {}", info.os_type(), info.bitness()),
            system_version: info.version().to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            system_lang_code,
            lang_code,
            update_queue_limit: None,
        }
    }
}

impl From<&InitParams> for ConnectionParams {
    fn from(params: &InitParams) -> Self {
        Self {
            device_model: params.device_model.clone(),
            system_version: params.system_version.clone(),
            app_version: params.app_version.clone(),
            system_lang_code: params.system_lang_code.clone(),
            lang_code: params.lang_code.clone(),
        }
    }
}

impl Client {
    /// Connect to Telegram using the provided [`Config`].
    ///
    /// This does not perform any network I/O by itself: DC connections are opened lazily, the
    /// first time a request is routed to them. The connection pool runs on a spawned task of
    /// the caller's Tokio runtime; this is the one piece of internal concurrency the client
    /// relies on, since a `SenderPool` can serve more than one DC at a time.
    pub fn connect(config: Config) -> Self {
        let connection_params = ConnectionParams::from(&config.params);
        let pool = SenderPool::with_configuration(
            Arc::clone(&config.session),
            config.api_id,
            connection_params,
        );

        tokio::spawn(pool.runner.run());

        let message_box = match config.session.get_state() {
            Some(state) => MessageBox::load(state),
            None => MessageBox::new(),
        };
        let chat_hashes = ChatHashCache::new(
            config
                .session
                .signed_in_user()
                .map(|user| (user.id, user.bot)),
        );

        Self {
            config,
            pool: pool.handle,
            pool_updates: pool.updates,
            chat_hashes,
            message_box,
            update_queue: VecDeque::new(),
            last_update_limit_warn: None,
            secret_chats: HashMap::new(),
            pending_secret_chats: HashMap::new(),
            dh_config: None,
            pending_secret_actions: VecDeque::new(),
        }
    }

    /// Invoke a raw request, routed to the client's currently selected DC.
    pub async fn invoke<R: tlgram_tl_types::RemoteCall>(
        &self,
        request: &R,
    ) -> Result<R::Return, tlgram_mtsender::InvocationError> {
        self.invoke_in_dc(self.config.session.home_dc_id(), request)
            .await
    }

    /// Invoke a raw request against a specific datacenter, regardless of which one is
    /// currently selected as the "home" DC.
    ///
    /// Useful for operations that Telegram requires to be issued against a particular DC, such
    /// as downloading a file stored elsewhere or retrying a request after a `*_MIGRATE` error.
    pub async fn invoke_in_dc<R: tlgram_tl_types::RemoteCall>(
        &self,
        dc_id: i32,
        request: &R,
    ) -> Result<R::Return, tlgram_mtsender::InvocationError> {
        let body = self.pool.invoke_in_dc(dc_id, request.to_bytes()).await?;
        R::Return::from_bytes(&body).map_err(tlgram_mtsender::InvocationError::from)
    }

    /// Terminate the connection pool and stop serving any further requests.
    ///
    /// Already in-flight calls are allowed to complete; [`Client::next_update`] will return
    /// `Ok(None)` once the pool has drained.
    pub fn disconnect(&self) {
        self.pool.quit();
    }
}
