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

//! Outbound message envelopes understood by the PsiChat backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

use super::types::{SessionId, UserId};

/// Lifecycle state of a tutoring session.
#[derive(
    Clone, Copy, Debug, Display, Hash, PartialEq, Eq, AsRefStr, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    Active,
    Paused,
    Escalated,
    Closed,
}

/// Triage priority of a tutoring session.
#[derive(
    Clone, Copy, Debug, Display, Hash, PartialEq, Eq, AsRefStr, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

#[derive(
    Clone, Copy, Debug, Display, Hash, PartialEq, Eq, AsRefStr, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// An outbound envelope, serialized with its `type` discriminator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Student message to the bot in a chat session.
    ChatMessage {
        session_id: SessionId,
        message: String,
    },
    /// Request for emotional analysis of a message.
    AnalysisRequest {
        session_id: SessionId,
        message: String,
    },
    TutorChatMessage {
        session_id: SessionId,
        content: String,
    },
    /// Typing state of the local participant in a tutoring session.
    TutorTyping {
        session_id: SessionId,
        is_typing: bool,
    },
    TutorReadReceipt {
        session_id: SessionId,
        message_id: String,
    },
    /// Typing state attributed to a specific user.
    TutorTypingIndicator {
        session_id: SessionId,
        user_id: UserId,
        is_typing: bool,
    },
    /// Tutor message carrying the analysis it was written against.
    TutorMessageWithAnalysis {
        session_id: SessionId,
        content: String,
        analysis: Value,
    },
    TutorQuickAction {
        session_id: SessionId,
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    SessionStateChange {
        session_id: SessionId,
        state: SessionState,
    },
    PriorityChange {
        session_id: SessionId,
        priority: Priority,
    },
    EmergencyAlert {
        session_id: SessionId,
        reason: String,
        severity: AlertSeverity,
    },
}

impl OutboundMessage {
    /// Returns the `type` discriminator this message serializes with.
    #[must_use]
    pub const fn message_type(&self) -> &'static str {
        match self {
            Self::ChatMessage { .. } => "chat_message",
            Self::AnalysisRequest { .. } => "analysis_request",
            Self::TutorChatMessage { .. } => "tutor_chat_message",
            Self::TutorTyping { .. } => "tutor_typing",
            Self::TutorReadReceipt { .. } => "tutor_read_receipt",
            Self::TutorTypingIndicator { .. } => "tutor_typing_indicator",
            Self::TutorMessageWithAnalysis { .. } => "tutor_message_with_analysis",
            Self::TutorQuickAction { .. } => "tutor_quick_action",
            Self::SessionStateChange { .. } => "session_state_change",
            Self::PriorityChange { .. } => "priority_change",
            Self::EmergencyAlert { .. } => "emergency_alert",
        }
    }

    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        match self {
            Self::ChatMessage { session_id, .. }
            | Self::AnalysisRequest { session_id, .. }
            | Self::TutorChatMessage { session_id, .. }
            | Self::TutorTyping { session_id, .. }
            | Self::TutorReadReceipt { session_id, .. }
            | Self::TutorTypingIndicator { session_id, .. }
            | Self::TutorMessageWithAnalysis { session_id, .. }
            | Self::TutorQuickAction { session_id, .. }
            | Self::SessionStateChange { session_id, .. }
            | Self::PriorityChange { session_id, .. }
            | Self::EmergencyAlert { session_id, .. } => *session_id,
        }
    }

    /// Converts the message into its JSON envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_envelope(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
