//! Server address and player identity.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

use crate::error::ConnectionError;

/// Default duel server.
pub const DEFAULT_SERVER: &str = "ws://localhost:8001";

/// Longest accepted player identifier.
pub const MAX_PLAYER_ID_LEN: usize = 64;

/// Why a player identifier was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPlayerId {
    /// Empty after trimming
    #[error("player id must not be empty")]
    Empty,

    /// Longer than [`MAX_PLAYER_ID_LEN`]
    #[error("player id is {0} characters long; at most {MAX_PLAYER_ID_LEN} are allowed")]
    TooLong(usize),

    /// Contains a character that cannot appear in a URL path segment as-is
    #[error("player id contains '{0}'; only letters, digits, '-', '_' and '.' are allowed")]
    InvalidChar(char),
}

/// Identifier the server knows this participant by.
///
/// It becomes a URL path segment, so only unreserved characters are
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayerId(String);

impl PlayerId {
    /// Validates `raw` as a player identifier.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPlayerId`] describing the first problem found.
    pub fn parse(raw: &str) -> Result<Self, InvalidPlayerId> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(InvalidPlayerId::Empty);
        }
        let len = raw.chars().count();
        if len > MAX_PLAYER_ID_LEN {
            return Err(InvalidPlayerId::TooLong(len));
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(InvalidPlayerId::InvalidChar(c));
        }
        Ok(Self(raw.to_owned()))
    }

    /// Generates a fresh random identifier.
    #[must_use]
    pub fn random() -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("player-{}", &id[..12]))
    }

    /// The identifier as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PlayerId {
    type Err = InvalidPlayerId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checks that `server` is a `ws://` or `wss://` base URL.
///
/// # Errors
///
/// Returns a human-readable reason when it is not.
pub fn check_server_url(server: &str) -> Result<(), String> {
    let Some((scheme, rest)) = server.split_once("://") else {
        return Err("missing scheme; expected ws:// or wss://".to_owned());
    };
    if !matches!(scheme, "ws" | "wss") {
        return Err(format!("scheme '{scheme}' is not supported; use ws or wss"));
    }
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return Err("missing host".to_owned());
    }
    if rest.contains(['?', '#']) {
        return Err("query strings and fragments are not allowed".to_owned());
    }
    Ok(())
}

/// Full address of a player's duel socket: `<server>/ws/<player_id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    server: String,
    player_id: PlayerId,
}

impl Endpoint {
    /// Builds the endpoint for `player_id` on `server`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::InvalidEndpoint`] if the resulting URL
    /// is not a valid WebSocket request target.
    pub fn new(server: &str, player_id: PlayerId) -> Result<Self, ConnectionError> {
        let server = server.trim().trim_end_matches('/').to_owned();
        let endpoint = Self { server, player_id };
        let url = endpoint.url();
        check_server_url(&endpoint.server).map_err(|reason| ConnectionError::InvalidEndpoint {
            url: url.clone(),
            reason,
        })?;
        url.as_str()
            .into_client_request()
            .map_err(|e| ConnectionError::InvalidEndpoint {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        Ok(endpoint)
    }

    /// The WebSocket URL.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}/ws/{}", self.server, self.player_id)
    }

    /// The participant this endpoint belongs to.
    #[must_use]
    pub const fn player_id(&self) -> &PlayerId {
        &self.player_id
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}
