// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::{Config, InitParams, SignInError};

use super::Client;
use log;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tlgram_mtsender::{AuthorizationError, InvocationError};
use tlgram_session::{storages::TlSession, MemorySession, Session};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

impl Client {
    /// Create new `ClientBuilder` for more user friendly client setup.
    ///
    /// # Universal example:
    /// ```ignore
    /// let (client, authorized) = Client::builder(API_ID, &API_HASH)
    ///     .interactive(true)
    ///     .session_file("session.session")?
    ///     .connect()
    ///     .await?;
    /// ```
    ///
    /// # Login with bot token:
    /// ```ignore
    /// let (client, authorized) = Client::builder(API_ID, &API_HASH)
    ///     .bot_token("some:bot:token")
    ///     .session_file("session.session")?
    ///     .connect()
    ///     .await?;
    /// ```
    ///
    /// # Login to user account:
    /// NOTE: For user accounts `interactive(true)` is required, because of the code prompt.
    /// Otherwise an unauthorized client is returned.
    /// ```ignore
    /// let (client, authorized) = Client::builder(API_ID, &API_HASH)
    ///     .interactive(true)
    ///     .session_file("session.session")?
    ///     .phone("123456789")
    ///     .connect()
    ///     .await?;
    /// ```
    pub fn builder(api_id: i32, api_hash: &str) -> ClientBuilder {
        ClientBuilder::new(api_id, api_hash)
    }
}

pub struct ClientBuilder {
    api_id: i32,
    api_hash: String,
    bot_token: Option<String>,
    session: Option<Arc<dyn Session>>,
    phone: Option<String>,
    params: InitParams,
    interactive: bool,
}

impl ClientBuilder {
    /// Create new instance of `ClientBuilder` for more user friendly client setup.
    pub fn new(api_id: i32, api_hash: &str) -> ClientBuilder {
        ClientBuilder {
            api_id,
            api_hash: api_hash.to_string(),
            bot_token: None,
            session: None,
            phone: None,
            params: InitParams::default(),
            interactive: false,
        }
    }

    /// Set the session parameter for the client.
    ///
    /// # Example
    /// ```ignore
    /// use std::sync::Arc;
    /// use tlgram_session::MemorySession;
    /// ClientBuilder::new(API_ID, API_HASH)
    ///     .session(Arc::new(MemorySession::new()))
    /// ```
    pub fn session(mut self, session: Arc<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    /// Shorthand for setting the session client parameter from a file path.
    ///
    /// Equivalent to: `.session(Arc::new(TlSession::load_file_or_create(path)?))`
    pub fn session_file(mut self, path: impl AsRef<Path>) -> Result<Self, ClientBuilderError> {
        self.session = Some(Arc::new(TlSession::load_file_or_create(path)?));
        Ok(self)
    }

    /// Login using bot token
    pub fn bot_token(mut self, token: &str) -> Self {
        self.bot_token = Some(token.to_string());
        self
    }

    /// Login using phone number
    pub fn phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.to_string());
        self
    }

    /// Set new client `InitParams`
    pub fn params(mut self, params: InitParams) -> Self {
        self.params = params;
        self
    }

    /// Enable interactive mode (prompt in terminal for missing fields)
    pub fn interactive(mut self, enabled: bool) -> Self {
        self.interactive = enabled;
        self
    }

    /// Prompt for a question in cli
    async fn prompt(question: &str) -> Result<String, ClientBuilderError> {
        let mut stdout = io::stdout();
        stdout.write_all(question.as_bytes()).await?;
        stdout.flush().await?;

        let stdin = io::stdin();
        let mut reader = BufReader::new(stdin);
        let mut output = String::new();
        reader.read_line(&mut output).await?;
        Ok(output.trim().to_string())
    }

    /// Create client and try to log in.
    ///
    /// Returns the client instance and whether the client is authorized. Only returns
    /// unauthorized if `interactive` is disabled and logging in to a user account is required.
    pub async fn connect(mut self) -> Result<(Client, bool), ClientBuilderError> {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                log::warn!("no session specified, using an in-memory session");
                Arc::new(MemorySession::new())
            }
        };

        let client = Client::connect(Config {
            session,
            api_id: self.api_id,
            api_hash: self.api_hash.clone(),
            params: self.params,
        });

        if client.is_authorized().await? {
            return Ok((client, true));
        }

        // Missing bot token and phone number
        if self.bot_token.is_none() && self.phone.is_none() {
            if !self.interactive {
                return Err(ClientBuilderError::MissingParameters(
                    "bot_token or phone number",
                ));
            }
            let answer = Self::prompt("Enter phone number or bot token: ").await?;
            if answer.contains(':') {
                self.bot_token = Some(answer);
            } else {
                self.phone = Some(answer);
            }
        }

        // Login using bot token
        if let Some(token) = self.bot_token {
            client
                .bot_sign_in(&token, self.api_id, &self.api_hash)
                .await?;
            return Ok((client, true));
        }

        // Unauthorized (can't prompt for code)
        if !self.interactive {
            return Ok((client, false));
        }

        // Interactive user login. A 2FA password flow is intentionally not handled here;
        // callers relying on it should drive `sign_in`/`request_login_code` themselves.
        let token = client
            .request_login_code(self.phone.as_ref().unwrap(), self.api_id, &self.api_hash)
            .await?;
        let code = Self::prompt("Enter the code you received: ").await?;
        match client.sign_in(&token, &code).await {
            Ok(_) => Ok((client, true)),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug)]
pub enum ClientBuilderError {
    IO(std::io::Error),
    AuthorizationError(AuthorizationError),
    MissingParameters(&'static str),
    SignInError(SignInError),
    InvocationError(InvocationError),
}

impl fmt::Display for ClientBuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientBuilderError::IO(e) => write!(f, "IO error: {}", e),
            ClientBuilderError::AuthorizationError(e) => write!(f, "Authorization error: {}", e),
            ClientBuilderError::MissingParameters(e) => write!(f, "Missing parameters: {}", e),
            ClientBuilderError::SignInError(e) => write!(f, "Sign in error: {}", e),
            ClientBuilderError::InvocationError(e) => write!(f, "Other error: {}", e),
        }
    }
}

impl From<std::io::Error> for ClientBuilderError {
    fn from(e: std::io::Error) -> Self {
        ClientBuilderError::IO(e)
    }
}

impl From<AuthorizationError> for ClientBuilderError {
    fn from(e: AuthorizationError) -> Self {
        ClientBuilderError::AuthorizationError(e)
    }
}

impl From<SignInError> for ClientBuilderError {
    fn from(e: SignInError) -> Self {
        ClientBuilderError::SignInError(e)
    }
}

impl From<InvocationError> for ClientBuilderError {
    fn from(e: InvocationError) -> Self {
        ClientBuilderError::InvocationError(e)
    }
}

impl std::error::Error for ClientBuilderError {}
