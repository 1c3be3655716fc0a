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

//! TLS provider setup for `wss://` endpoints.

use std::sync::OnceLock;

use rustls::crypto::{CryptoProvider, aws_lc_rs};

static PROVIDER_READY: OnceLock<bool> = OnceLock::new();

/// Makes sure a process-wide rustls crypto provider exists before the first TLS handshake.
///
/// Installs `aws-lc-rs` unless the application already chose a provider. Returns whether a
/// provider is available; the check runs once per process.
pub fn ensure_crypto_provider() -> bool {
    *PROVIDER_READY.get_or_init(|| {
        if CryptoProvider::get_default().is_some() {
            tracing::debug!("Using application-installed crypto provider");
            return true;
        }

        match aws_lc_rs::default_provider().install_default() {
            Ok(()) => {
                tracing::debug!("Installed aws-lc-rs crypto provider for wss connections");
                true
            }
            // Another installer won the race
            Err(_) => CryptoProvider::get_default().is_some(),
        }
    })
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_provider_available_after_first_call() {
        assert!(ensure_crypto_provider());
        assert!(ensure_crypto_provider());
        assert!(CryptoProvider::get_default().is_some());
    }
}
