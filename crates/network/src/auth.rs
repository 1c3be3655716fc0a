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

//! Bearer token validation and JWT claim decoding.
//!
//! Tokens are treated as opaque unless they have the three-segment JWT shape, in which
//! case the payload is decoded so that expired tokens are rejected locally instead of
//! costing a round trip to the server.

use std::{
    fmt::Debug,
    time::{SystemTime, UNIX_EPOCH},
};

use base64::prelude::*;
use serde::Deserialize;
use serde_json::{Map, Value};
use zeroize::ZeroizeOnDrop;

use crate::error::RealtimeError;

/// Claims decoded from a JWT payload.
///
/// The signature is never verified here, the backend remains the authority.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TokenClaims {
    /// The subject (usually the user identifier).
    #[serde(default)]
    pub sub: Option<String>,
    /// Expiry as UNIX seconds.
    #[serde(default)]
    pub exp: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A bearer token used to authenticate realtime connections.
///
/// The raw token is zeroized on drop and never printed by `Debug`.
#[derive(Clone, ZeroizeOnDrop)]
pub struct AuthToken {
    raw: String,
    #[zeroize(skip)]
    claims: Option<TokenClaims>,
}

impl Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(AuthToken))
            .field("raw", &"<redacted>")
            .field("claims", &self.claims)
            .finish()
    }
}

impl AuthToken {
    /// Creates a new [`AuthToken`] from the raw bearer string.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::MissingToken`] if the token is empty or blank, and
    /// [`RealtimeError::MalformedToken`] if it contains whitespace or control characters
    /// or is JWT-shaped with an undecodable payload.
    pub fn new(raw: impl Into<String>) -> Result<Self, RealtimeError> {
        let raw = raw.into();

        if raw.trim().is_empty() {
            return Err(RealtimeError::MissingToken);
        }

        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(RealtimeError::MalformedToken(
                "contains whitespace or control characters".to_string(),
            ));
        }

        let claims = if looks_like_jwt(&raw) {
            Some(decode_claims(&raw)?)
        } else {
            None
        };

        Ok(Self { raw, claims })
    }

    /// Returns the raw bearer string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the decoded claims when the token is a JWT.
    #[must_use]
    pub const fn claims(&self) -> Option<&TokenClaims> {
        self.claims.as_ref()
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.claims.as_ref().and_then(|c| c.sub.as_deref())
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<u64> {
        self.claims.as_ref().and_then(|c| c.exp)
    }

    /// Returns true if the token carries an `exp` claim at or before `now_secs`.
    #[must_use]
    pub fn is_expired_at(&self, now_secs: u64) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now_secs)
    }

    /// Checks the token is usable for a connection attempt right now.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::TokenExpired`] if the token has expired.
    pub fn ensure_not_expired(&self) -> Result<(), RealtimeError> {
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        match self.expires_at() {
            Some(expired_at) if self.is_expired_at(now_secs) => {
                Err(RealtimeError::TokenExpired { expired_at })
            }
            _ => Ok(()),
        }
    }
}

impl TryFrom<&str> for AuthToken {
    type Error = RealtimeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for AuthToken {
    type Error = RealtimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

fn looks_like_jwt(raw: &str) -> bool {
    raw.split('.').count() == 3
}

fn decode_claims(raw: &str) -> Result<TokenClaims, RealtimeError> {
    let payload = raw
        .split('.')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| RealtimeError::MalformedToken("empty JWT payload".to_string()))?;

    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| RealtimeError::MalformedToken(format!("JWT payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| RealtimeError::MalformedToken(format!("JWT payload is not JSON: {e}")))
}
