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

//! Error types produced by the realtime client.

use std::time::Duration;

use thiserror::Error;

/// A typed error enumeration for the realtime client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealtimeError {
    /// No auth token was supplied (empty or blank).
    #[error("Auth token is missing")]
    MissingToken,
    #[error("Auth token is malformed: {0}")]
    MalformedToken(String),
    /// The token is a JWT whose `exp` claim is already in the past.
    #[error("Auth token expired at {expired_at} (unix seconds)")]
    TokenExpired { expired_at: u64 },
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),
    /// The transport failed before the connection opened.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The socket closed before the connection opened, for a reason other than auth.
    #[error("Connection closed before open (code {code}): {reason}")]
    ClosedBeforeOpen { code: u16, reason: String },
    #[error("Connection did not open within {0:?}")]
    Timeout(Duration),
    /// The server closed the connection with the policy-violation code.
    #[error("Authentication rejected: {reason}")]
    AuthenticationRejected { reason: String },
    /// The request was abandoned because the client was disconnected.
    #[error("Client disconnected")]
    Disconnected,
    /// The controller task is no longer running.
    #[error("Client closed")]
    ClientClosed,
}

impl RealtimeError {
    /// Returns true for errors raised before any network attempt was made.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingToken
                | Self::MalformedToken(_)
                | Self::TokenExpired { .. }
                | Self::InvalidUrl(_)
        )
    }
}

impl From<url::ParseError> for RealtimeError {
    fn from(error: url::ParseError) -> Self {
        Self::InvalidUrl(error.to_string())
    }
}
