// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Methods to deal with and offer access to updates.

use super::Client;
use crate::types::{ChatMap, Update};
pub use tlgram_mtsender::InvocationError;
use log::{trace, warn};
use std::time::{Duration, Instant};
use tlgram_session::UpdatesLike;
use tlgram_tl_types as tl;
use tokio::time::sleep_until;

/// How long to wait after warning that the update queue limit was exceeded before warning again.
const UPDATE_LIMIT_EXCEEDED_LOG_COOLDOWN: Duration = Duration::from_secs(300);

impl Client {
    /// Returns the next update from the buffer where they are queued until used.
    ///
    /// Like using an iterator manually, this method will return `Some` until no more updates
    /// are available (e.g. the connection pool was shut down).
    ///
    /// # Examples
    ///
    /// ```
    /// # async fn f(mut client: tlgram_client::Client) -> Result<(), Box<dyn std::error::Error>> {
    /// use tlgram_client::Update;
    ///
    /// while let Some(update) = client.next_update().await? {
    ///     match update {
    ///         Update::NewEncryptedMessage { chat_id, message } => {
    ///             println!("secret chat {} got a message: {:?}", chat_id, message);
    ///         }
    ///         _ => {}
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn next_update(&mut self) -> Result<Option<Update>, InvocationError> {
        loop {
            if let Some(update) = self.update_queue.pop_front() {
                return Ok(Some(update));
            }

            if let Some(action) = self.pending_secret_actions.pop_front() {
                self.send_pending_secret_action(action).await?;
                continue;
            }

            if let Some(request) = self.message_box.get_difference() {
                let response = self.invoke(&request).await?;
                let (updates, users, chats) = self
                    .message_box
                    .apply_difference(response, &mut self.chat_hashes);
                self.extend_update_queue(updates, ChatMap::new(users, chats));
                continue;
            }

            if let Some(request) = self.message_box.get_channel_difference(&self.chat_hashes) {
                let response = self.invoke(&request).await?;
                let (updates, users, chats) = self.message_box.apply_channel_difference(
                    request,
                    response,
                    &mut self.chat_hashes,
                );
                self.extend_update_queue(updates, ChatMap::new(users, chats));
                continue;
            }

            let deadline = self.message_box.check_deadlines();
            tokio::select! {
                update = self.pool_updates.recv() => {
                    match update {
                        Some(update) => self.process_pool_update(update),
                        None => return Ok(None),
                    }
                }
                _ = sleep_until(deadline.into()) => {
                    trace!("woke up on a reconciliation deadline");
                }
            }
        }
    }

    /// Fold a single item received from the connection pool into the update queue and the
    /// updates state, recovering from gaps by requesting an account-wide difference next.
    fn process_pool_update(&mut self, update: UpdatesLike) {
        match update {
            UpdatesLike::Updates(updates) => {
                if self
                    .message_box
                    .ensure_known_peer_hashes(&updates, &mut self.chat_hashes)
                    .is_err()
                {
                    return;
                }

                if let Ok((updates, users, chats)) =
                    self.message_box.process_updates(updates, &self.chat_hashes)
                {
                    self.extend_update_queue(updates, ChatMap::new(users, chats));
                }
            }
            UpdatesLike::Reconnection => {
                trace!("connection pool reconnected; requesting account-wide difference");
                self.message_box.begin_get_diff();
            }
            UpdatesLike::ShortSentMessage { .. }
            | UpdatesLike::AffectedMessages(_)
            | UpdatesLike::InvitedUsers(_) => {
                // These only carry the pts bump of an RPC call already awaited by its caller;
                // there is no independent `Update`/peer payload to surface here.
            }
        }
    }

    fn extend_update_queue(
        &mut self,
        updates: Vec<tl::enums::Update>,
        chat_map: std::sync::Arc<ChatMap>,
    ) {
        let _ = chat_map;

        let mut updates: Vec<Update> = updates
            .into_iter()
            .filter_map(|u| self.convert_update(u))
            .collect();

        if let Some(limit) = self.config.params.update_queue_limit {
            if let Some(exceeds) = (self.update_queue.len() + updates.len()).checked_sub(limit + 1)
            {
                let exceeds = exceeds + 1;
                let now = Instant::now();
                let notify = match self.last_update_limit_warn {
                    None => true,
                    Some(instant) => now - instant > UPDATE_LIMIT_EXCEEDED_LOG_COOLDOWN,
                };

                updates.truncate(updates.len() - exceeds);
                if notify {
                    warn!(
                        "{} updates were dropped because the update_queue_limit was exceeded",
                        exceeds
                    );
                }

                self.last_update_limit_warn = Some(now);
            }
        }

        self.update_queue.extend(updates);
    }

    /// Synchronize the updates state to the session.
    pub fn sync_update_state(&self) {
        self.config
            .session
            .set_state(self.message_box.session_state());
    }
}
