// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Configuration for realtime client connections.

use std::{path::Path, str::FromStr, time::Duration};

use serde::Deserialize;
use url::Url;

use super::types::ConnectionTarget;
use crate::{auth::AuthToken, error::RealtimeError};

pub const ENV_WS_URL: &str = "PSICHAT_WS_URL";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "PSICHAT_CONNECT_TIMEOUT_MS";
pub const ENV_RECONNECT_DELAY_MS: &str = "PSICHAT_RECONNECT_DELAY_MS";
pub const ENV_MAX_RECONNECT_ATTEMPTS: &str = "PSICHAT_MAX_RECONNECT_ATTEMPTS";

/// Configuration for realtime client connections.
///
/// The reconnect delay before attempt `k` is `reconnect_delay_ms * k`, for at most
/// `max_reconnect_attempts` attempts after an unexpected close.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RealtimeConfig {
    /// The backend base URL (`ws://` or `wss://`), without a trailing path.
    pub base_url: String,
    /// The timeout (milliseconds) for a socket to reach the open state.
    pub connect_timeout_ms: u64,
    /// The base reconnection delay (milliseconds).
    pub reconnect_delay_ms: u64,
    /// The maximum number of automatic reconnection attempts.
    pub max_reconnect_attempts: u32,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            base_url: "ws://localhost:8000".to_string(),
            connect_timeout_ms: 10_000,
            reconnect_delay_ms: 1_000,
            max_reconnect_attempts: 5,
        }
    }
}

impl RealtimeConfig {
    /// Creates a default configuration for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub const fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Parses a configuration from TOML, missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or has unknown fields.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).map_err(|e| anyhow::anyhow!("Invalid realtime config: {e}"))
    }

    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read '{}': {e}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    /// Overrides fields from `PSICHAT_*` environment variables where set.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable cannot be parsed.
    pub fn with_env_overrides(mut self) -> anyhow::Result<Self> {
        if let Some(url) = get_opt_env_var(ENV_WS_URL) {
            self.base_url = url;
        }
        if let Some(value) = parse_opt_env_var(ENV_CONNECT_TIMEOUT_MS)? {
            self.connect_timeout_ms = value;
        }
        if let Some(value) = parse_opt_env_var(ENV_RECONNECT_DELAY_MS)? {
            self.reconnect_delay_ms = value;
        }
        if let Some(value) = parse_opt_env_var(ENV_MAX_RECONNECT_ATTEMPTS)? {
            self.max_reconnect_attempts = value;
        }
        Ok(self)
    }

    /// Creates a default configuration overridden from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable cannot be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Builds the endpoint URL for `target`, carrying `token` in the query string.
    ///
    /// - User: `{base_url}/ws/{user_id}?token={token}`
    /// - Tutor: `{base_url}/ws/tutor-chat/{session_id}?token={token}`
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::InvalidUrl`] if the base URL is not a `ws`/`wss` URL.
    pub fn endpoint_url(
        &self,
        target: &ConnectionTarget,
        token: &AuthToken,
    ) -> Result<Url, RealtimeError> {
        let base = Url::parse(self.base_url.trim_end_matches('/'))?;

        if !matches!(base.scheme(), "ws" | "wss") {
            return Err(RealtimeError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                base.scheme()
            )));
        }

        let path = match target {
            ConnectionTarget::User { user_id } => format!("ws/{user_id}"),
            ConnectionTarget::Tutor { session_id, .. } => format!("ws/tutor-chat/{session_id}"),
        };

        let mut url = base;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| RealtimeError::InvalidUrl("cannot be a base URL".to_string()))?;
            segments.pop_if_empty();
            segments.extend(path.split('/'));
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("token", token.as_str());

        Ok(url)
    }
}

fn get_opt_env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_opt_env_var<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_opt_env_var(key)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("Invalid value '{v}' for '{key}': {e}"))
        })
        .transpose()
}
