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

//! Type definitions for realtime connections.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

/// Event type under which inbound text that is not a valid envelope is dispatched.
///
/// Listeners receive the raw payload as a JSON string value.
pub const UNPARSED_TEXT_EVENT: &str = "unparsed_text";

/// Function type for handling dispatched envelopes.
///
/// Handlers run synchronously on the controller task, in registration order. A panic
/// is caught and logged and does not prevent later handlers from running.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

macro_rules! identifier {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            #[must_use]
            pub const fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

identifier!(UserId, "Identifies a PsiChat user (student or tutor).");
identifier!(SessionId, "Identifies a tutoring or chat session.");

/// Whether a connection is scoped to a user or to a tutoring session.
#[derive(Clone, Copy, Debug, Display, Hash, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionKind {
    User,
    Tutor,
}

/// The identity a connection is opened for.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// General chat and bot connection for a user.
    User { user_id: UserId },
    /// Connection to a specific tutoring session.
    Tutor {
        session_id: SessionId,
        user_id: UserId,
    },
}

impl ConnectionTarget {
    #[must_use]
    pub const fn kind(&self) -> ConnectionKind {
        match self {
            Self::User { .. } => ConnectionKind::User,
            Self::Tutor { .. } => ConnectionKind::Tutor,
        }
    }

    #[must_use]
    pub const fn user_id(&self) -> UserId {
        match self {
            Self::User { user_id } | Self::Tutor { user_id, .. } => *user_id,
        }
    }

    /// Returns the session identifier for tutor connections.
    #[must_use]
    pub const fn session_id(&self) -> Option<SessionId> {
        match self {
            Self::User { .. } => None,
            Self::Tutor { session_id, .. } => Some(*session_id),
        }
    }

    /// Returns true if an open connection for `self` already satisfies a request for `other`.
    ///
    /// User connections match on kind alone, tutor connections on kind and session.
    #[must_use]
    pub fn same_scope(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::User { .. }, Self::User { .. }) => true,
            (Self::Tutor { session_id: a, .. }, Self::Tutor { session_id: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User { user_id } => write!(f, "user {user_id}"),
            Self::Tutor {
                session_id,
                user_id,
            } => write!(f, "tutor session {session_id} (user {user_id})"),
        }
    }
}

/// Returns the `type` discriminator of an inbound envelope, if it has one.
#[must_use]
pub fn envelope_type(envelope: &Value) -> Option<&str> {
    envelope.get("type").and_then(Value::as_str)
}
