//! Configuration file shape and the resolved settings derived from it.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_SERVER, PlayerId};
use crate::session::DEFAULT_DUEL_DURATION;

/// Client configuration as written in YAML.
///
/// Every field is optional; unset fields fall back to command-line flags
/// and then to defaults. Durations are human-readable (`90s`, `2m`).
///
/// ```yaml
/// server: ws://localhost:8001
/// player_id: ${USER}
/// duel_duration: 2m
/// connect_timeout: 10s
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base WebSocket URL of the duel server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Identifier sent in the socket path. Random when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,

    /// Full length of a duel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duel_duration: Option<String>,

    /// Bound on the WebSocket handshake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<String>,

    /// Where to write the JSONL event log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_file: Option<PathBuf>,

    /// Port for the Prometheus scrape endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

impl ClientConfig {
    /// Returns `self` with every field set in `overrides` replaced.
    #[must_use]
    pub fn overlay(self, overrides: Self) -> Self {
        Self {
            server: overrides.server.or(self.server),
            player_id: overrides.player_id.or(self.player_id),
            duel_duration: overrides.duel_duration.or(self.duel_duration),
            connect_timeout: overrides.connect_timeout.or(self.connect_timeout),
            events_file: overrides.events_file.or(self.events_file),
            metrics_port: overrides.metrics_port.or(self.metrics_port),
        }
    }
}

/// Fully resolved, validated settings for one client run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Base WebSocket URL.
    pub server: String,
    /// Participant identifier.
    pub player_id: PlayerId,
    /// Duel length in whole seconds.
    pub duel_duration: u32,
    /// Handshake bound.
    pub connect_timeout: Duration,
    /// JSONL event log destination.
    pub events_file: Option<PathBuf>,
    /// Prometheus port.
    pub metrics_port: Option<u16>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_owned(),
            player_id: PlayerId::random(),
            duel_duration: DEFAULT_DUEL_DURATION,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            events_file: None,
            metrics_port: None,
        }
    }
}
