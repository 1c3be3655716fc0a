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

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]

pub mod opt;

use std::path::Path;

use anyhow::Context;
use psichat_network::{
    RealtimeClient, RealtimeConfig,
    logging::{RUST_LOG, init_tracing_with_filter},
    websocket::{ConnectionTarget, OutboundMessage, SessionId, UNPARSED_TEXT_EVENT, UserId},
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::opt::{AuthOpt, Commands, PsiChatCli};

/// Inbound event types printed by default.
pub const DEFAULT_EVENTS: &[&str] = &[
    "chat_message",
    "bot_response",
    "analysis_result",
    "tutor_chat_message",
    "tutor_typing",
    "tutor_typing_indicator",
    "tutor_read_receipt",
    "tutor_message_with_analysis",
    "tutor_quick_action",
    "session_state_change",
    "priority_change",
    "emergency_alert",
    "error",
];

/// Initializes logging from `RUST_LOG`, falling back to `default_filter`.
///
/// # Errors
///
/// Returns an error if the filter is invalid or logging was already initialized.
pub fn init_logging(default_filter: &str) -> anyhow::Result<()> {
    let filter = std::env::var(RUST_LOG).unwrap_or_else(|_| default_filter.to_string());
    init_tracing_with_filter(&filter)
}

/// Builds the realtime configuration from the config file, environment and flags.
///
/// Later sources take precedence: file, then `PSICHAT_*` variables, then `--url`.
///
/// # Errors
///
/// Returns an error if the config file or an environment variable is invalid.
pub fn load_config(config_path: Option<&Path>, url: Option<&str>) -> anyhow::Result<RealtimeConfig> {
    let config = match config_path {
        Some(path) => RealtimeConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config from '{}'", path.display()))?,
        None => RealtimeConfig::default(),
    };
    let mut config = config
        .with_env_overrides()
        .context("Invalid PSICHAT_* environment variable")?;

    if let Some(url) = url {
        config.base_url = url.to_string();
    }
    Ok(config)
}

/// Returns the connection target and the session stdin lines are sent to.
#[must_use]
pub fn resolve_target(command: &Commands) -> (ConnectionTarget, Option<SessionId>, &AuthOpt) {
    match command {
        Commands::User(opt) => (
            ConnectionTarget::User {
                user_id: UserId::new(opt.user_id),
            },
            opt.session_id.map(SessionId::new),
            &opt.auth,
        ),
        Commands::Tutor(opt) => (
            ConnectionTarget::Tutor {
                session_id: SessionId::new(opt.session_id),
                user_id: UserId::new(opt.user_id),
            },
            Some(SessionId::new(opt.session_id)),
            &opt.auth,
        ),
    }
}

fn print_envelope(payload: &Value) {
    match payload {
        Value::String(raw) => println!("{raw}"),
        envelope => println!("{envelope}"),
    }
}

pub async fn run(opt: PsiChatCli) -> anyhow::Result<()> {
    let config = load_config(opt.config.as_deref(), opt.url.as_deref())?;
    let (target, chat_session, auth) = resolve_target(&opt.command);

    let client = RealtimeClient::with_default_connector(config);
    for event_type in DEFAULT_EVENTS
        .iter()
        .copied()
        .chain(auth.events.iter().map(String::as_str))
        .chain([UNPARSED_TEXT_EVENT])
    {
        client.subscribe(event_type, print_envelope);
    }

    client
        .connect(target, &auth.token)
        .await
        .with_context(|| format!("Failed to connect {target}"))?;
    tracing::info!("Connected {target}, type messages and press enter to send");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("Failed to read stdin")? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => send_line(&client, &target, chat_session, line.trim()),
                None => {
                    tracing::info!("End of input");
                    break;
                }
            },
            _ = &mut ctrl_c => {
                tracing::info!("Received Ctrl-C");
                break;
            }
        }
    }

    client.shutdown().await;
    Ok(())
}

/// Returns the message an input line is sent as, if the target accepts chat input.
///
/// Tutor connections send `tutor_chat_message` to their session. User connections send
/// `chat_message` only when a chat session was given.
#[must_use]
pub fn route_line(
    target: &ConnectionTarget,
    chat_session: Option<SessionId>,
    line: &str,
) -> Option<OutboundMessage> {
    match (target, chat_session) {
        (ConnectionTarget::Tutor { session_id, .. }, _) => Some(OutboundMessage::TutorChatMessage {
            session_id: *session_id,
            content: line.to_string(),
        }),
        (ConnectionTarget::User { .. }, Some(session_id)) => Some(OutboundMessage::ChatMessage {
            session_id,
            message: line.to_string(),
        }),
        (ConnectionTarget::User { .. }, None) => None,
    }
}

fn send_line(
    client: &RealtimeClient,
    target: &ConnectionTarget,
    chat_session: Option<SessionId>,
    line: &str,
) {
    if !client.is_connected() {
        tracing::warn!("Not connected ({}), message dropped", client.connection_status());
        return;
    }

    match route_line(target, chat_session, line) {
        Some(message) => client.send_message(&message),
        None => tracing::warn!("No --session-id given, input ignored"),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use clap::Parser;
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_resolve_tutor_target() {
        let cli = PsiChatCli::try_parse_from([
            "psichat",
            "tutor",
            "--session-id",
            "7",
            "--user-id",
            "42",
            "--token",
            "tok",
        ])
        .unwrap();

        let (target, chat_session, auth) = resolve_target(&cli.command);

        assert_eq!(
            target,
            ConnectionTarget::Tutor {
                session_id: SessionId::new(7),
                user_id: UserId::new(42),
            }
        );
        assert_eq!(chat_session, Some(SessionId::new(7)));
        assert_eq!(auth.token, "tok");
    }

    #[rstest]
    fn test_load_config_file_then_url_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("psichat.toml");
        std::fs::write(
            &path,
            "base_url = \"ws://from-file:8000\"\nreconnect_delay_ms = 500\n",
        )
        .unwrap();

        let from_file = load_config(Some(path.as_path()), None).unwrap();
        let overridden = load_config(Some(path.as_path()), Some("wss://from-flag")).unwrap();

        assert_eq!(from_file.reconnect_delay_ms, 500);
        assert_eq!(overridden.base_url, "wss://from-flag");
        assert_eq!(overridden.reconnect_delay_ms, 500);
    }

    #[rstest]
    fn test_load_config_missing_file() {
        let error = load_config(Some(Path::new("/nonexistent/psichat.toml")), None).unwrap_err();

        assert!(error.to_string().contains("Failed to load config"));
    }

    #[rstest]
    #[case::tutor_ignores_chat_session(None)]
    #[case::tutor_with_chat_session(Some(SessionId::new(3)))]
    fn test_tutor_line_routes_to_tutor_chat(#[case] chat_session: Option<SessionId>) {
        let target = ConnectionTarget::Tutor {
            session_id: SessionId::new(7),
            user_id: UserId::new(42),
        };

        assert_eq!(
            route_line(&target, chat_session, "hello"),
            Some(OutboundMessage::TutorChatMessage {
                session_id: SessionId::new(7),
                content: "hello".to_string(),
            })
        );
    }

    #[rstest]
    fn test_user_line_routes_to_chat_session() {
        let target = ConnectionTarget::User {
            user_id: UserId::new(1),
        };

        let message = route_line(&target, Some(SessionId::new(5)), "hi there").unwrap();

        assert_eq!(message.message_type(), "chat_message");
        assert_eq!(
            message,
            OutboundMessage::ChatMessage {
                session_id: SessionId::new(5),
                message: "hi there".to_string(),
            }
        );
    }

    #[rstest]
    fn test_user_line_without_session_is_ignored() {
        let target = ConnectionTarget::User {
            user_id: UserId::new(1),
        };

        assert_eq!(route_line(&target, None, "hello"), None);
    }
}
