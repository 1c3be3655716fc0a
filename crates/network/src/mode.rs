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

//! Connection state machine states for the realtime client.

use std::sync::atomic::{AtomicU8, Ordering};

use strum::{AsRefStr, Display, EnumString};

/// Connection state of a realtime client.
///
/// The state is owned by the controller task and mirrored into an atomic flag so
/// that synchronous queries from application code never wait on the controller.
#[derive(Clone, Copy, Debug, Default, Display, Hash, PartialEq, Eq, AsRefStr, EnumString)]
#[repr(u8)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ConnectionState {
    /// No connection has been requested, or the last one was closed normally.
    #[default]
    Idle = 0,
    /// A socket exists and the handshake has not completed yet.
    Connecting = 1,
    /// The socket is open and frames are flowing.
    Open = 2,
    /// The connection dropped unexpectedly and a reconnect is scheduled.
    /// No socket exists while waiting for the backoff delay.
    Reconnecting = 3,
    /// The connection is terminally down (reconnects exhausted or credentials rejected).
    /// Only an explicit connect request leaves this state.
    Failed = 4,
}

/// Coarse connection status for status indicators.
#[derive(Clone, Copy, Debug, Display, Hash, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Connecting,
    Disconnected,
}

impl ConnectionState {
    /// Convert a u8 to [`ConnectionState`], useful when loading from an `AtomicU8`.
    ///
    /// # Panics
    ///
    /// Panics if `value` does not correspond to a state.
    #[inline]
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Connecting,
            2 => Self::Open,
            3 => Self::Reconnecting,
            4 => Self::Failed,
            _ => panic!("Invalid `ConnectionState` value: {value}"),
        }
    }

    #[inline]
    pub fn from_atomic(value: &AtomicU8) -> Self {
        Self::from_u8(value.load(Ordering::SeqCst))
    }

    /// Convert a [`ConnectionState`] to a u8, useful when storing to an `AtomicU8`.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns the coarse status for this state.
    #[must_use]
    pub const fn status(self) -> ConnectionStatus {
        match self {
            Self::Open => ConnectionStatus::Connected,
            Self::Connecting => ConnectionStatus::Connecting,
            Self::Idle | Self::Reconnecting | Self::Failed => ConnectionStatus::Disconnected,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    #[inline]
    #[must_use]
    pub const fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    #[inline]
    #[must_use]
    pub const fn is_reconnecting(&self) -> bool {
        matches!(self, Self::Reconnecting)
    }

    /// Returns true if the client will not connect again without an explicit request.
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Idle | Self::Failed)
    }
}
