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

//! Tracing subscriber setup for applications embedding the realtime client.

use std::env;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the tracing filter directives.
pub const RUST_LOG: &str = "RUST_LOG";

/// Initialize tracing.
///
/// Tracing is meant to be used to trace/debug async Rust code. It can be
/// configured to filter modules and write up to a specific level by passing
/// a configuration using the `RUST_LOG` environment variable.
///
/// Should be called once, at the start of the application.
///
/// # Errors
///
/// Returns an error if tracing subscriber fails to initialize.
pub fn init_tracing() -> anyhow::Result<()> {
    // Skip tracing initialization if `RUST_LOG` is not set
    if let Ok(v) = env::var(RUST_LOG) {
        init_tracing_with_filter(&v)?;
    }
    Ok(())
}

/// Initialize tracing with explicit filter directives, e.g. `psichat_network=debug`.
///
/// Logs are written to stderr, leaving stdout to the application.
///
/// # Errors
///
/// Returns an error if the directives are invalid or a global subscriber is already set.
pub fn init_tracing_with_filter(directives: &str) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_new(directives)
        .map_err(|e| anyhow::anyhow!("Invalid tracing filter '{directives}': {e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {e}"))?;

    tracing::debug!("Initialized tracing logs with filter '{directives}'");
    Ok(())
}
