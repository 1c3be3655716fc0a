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

use std::path::PathBuf;

use clap::{Args, Parser};

/// Main CLI structure for parsing command-line arguments and options.
///
/// Connects to the PsiChat realtime channel, prints inbound envelopes to stdout and
/// sends each line read from stdin as a chat message.
#[derive(Debug, Parser)]
#[clap(version, about, author)]
pub struct PsiChatCli {
    /// Backend base URL, e.g. `wss://psichat.example.com` (overrides config and `PSICHAT_WS_URL`).
    #[arg(long, global = true)]
    pub url: Option<String>,
    /// Path to a TOML realtime configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Tracing filter directives, used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    #[clap(subcommand)]
    pub command: Commands,
}

/// Available connection scopes.
#[derive(Parser, Debug, Clone)]
pub enum Commands {
    /// Connects as a user to the general chat and bot channel.
    User(UserOpt),
    /// Connects as a tutor to a specific tutoring session.
    Tutor(TutorOpt),
}

#[derive(Parser, Debug, Clone)]
pub struct UserOpt {
    #[arg(long)]
    pub user_id: u64,
    /// Chat session that stdin lines are sent to. Input is ignored without it.
    #[arg(long)]
    pub session_id: Option<u64>,
    #[clap(flatten)]
    pub auth: AuthOpt,
}

#[derive(Parser, Debug, Clone)]
pub struct TutorOpt {
    #[arg(long)]
    pub session_id: u64,
    #[arg(long)]
    pub user_id: u64,
    #[clap(flatten)]
    pub auth: AuthOpt,
}

#[derive(Args, Debug, Clone)]
pub struct AuthOpt {
    /// Bearer token for the backend.
    #[arg(long, env = "PSICHAT_TOKEN", hide_env_values = true)]
    pub token: String,
    /// Additional inbound event types to print.
    #[arg(long = "event", value_name = "TYPE")]
    pub events: Vec<String>,
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_parse_tutor_command() {
        let cli = PsiChatCli::try_parse_from([
            "psichat",
            "tutor",
            "--session-id",
            "7",
            "--user-id",
            "42",
            "--token",
            "tok",
            "--url",
            "ws://localhost:9000",
        ])
        .unwrap();

        assert_eq!(cli.url.as_deref(), Some("ws://localhost:9000"));
        assert_eq!(cli.log_level, "info");
        let Commands::Tutor(opt) = cli.command else {
            panic!("expected tutor command");
        };
        assert_eq!(opt.session_id, 7);
        assert_eq!(opt.user_id, 42);
        assert_eq!(opt.auth.token, "tok");
    }

    #[rstest]
    fn test_parse_user_command_with_events() {
        let cli = PsiChatCli::try_parse_from([
            "psichat",
            "--log-level",
            "debug",
            "user",
            "--user-id",
            "1",
            "--token",
            "tok",
            "--event",
            "mood_update",
            "--event",
            "dashboard_refresh",
        ])
        .unwrap();

        assert_eq!(cli.log_level, "debug");
        let Commands::User(opt) = cli.command else {
            panic!("expected user command");
        };
        assert_eq!(opt.session_id, None);
        assert_eq!(opt.auth.events, vec!["mood_update", "dashboard_refresh"]);
    }

    #[rstest]
    fn test_tutor_requires_session_id() {
        let result = PsiChatCli::try_parse_from([
            "psichat",
            "tutor",
            "--user-id",
            "42",
            "--token",
            "tok",
        ]);

        assert!(result.is_err());
    }
}
