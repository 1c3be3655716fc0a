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

//! Realtime networking for [PsiChat](https://github.com/nautechsystems/psichat).
//!
//! The `psichat-network` crate provides the client side of the PsiChat realtime channel: a
//! WebSocket connection scoped to a student or to a tutoring session, carrying JSON
//! envelopes between the application and the chat, bot and emotional-analysis backend.
//!
//! - [`websocket::RealtimeClient`]: connection lifecycle, reconnection and listener dispatch.
//! - [`transport`]: the socket seam, with a `tokio-tungstenite` implementation.
//! - [`auth`]: bearer token validation.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod auth;
pub mod backoff;
pub mod error;
pub mod logging;
pub mod mode;
pub mod tls;
pub mod transport;
pub mod websocket;

pub use crate::{
    auth::AuthToken,
    error::RealtimeError,
    mode::{ConnectionState, ConnectionStatus},
    websocket::{RealtimeClient, RealtimeConfig, WeakRealtimeClient},
};
