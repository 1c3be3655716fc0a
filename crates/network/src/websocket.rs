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

//! Realtime WebSocket client for the PsiChat backend.
//!
//! **Key features**:
//! - One logical connection per client, scoped to a user or a tutoring session
//! - Idempotent connects and a bounded connect timeout
//! - Automatic reconnection with linear backoff after unexpected closes
//! - Listener dispatch keyed on the envelope `type` field
//!
//! **Design**:
//! - A controller task owns the socket, the backoff and pending connect requests
//! - Client handles send commands to the controller over a channel
//! - Connection state is mirrored into an atomic for synchronous queries

pub mod client;
pub mod config;
pub mod listeners;
pub mod messages;
pub mod types;

pub use client::{RealtimeClient, WeakRealtimeClient};
pub use config::RealtimeConfig;
pub use listeners::{ListenerRegistry, Subscription};
pub use messages::{AlertSeverity, OutboundMessage, Priority, SessionState};
pub use types::{
    ConnectionKind, ConnectionTarget, EventHandler, SessionId, UNPARSED_TEXT_EVENT, UserId,
};
