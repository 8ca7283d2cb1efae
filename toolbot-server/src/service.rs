// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Chat turn orchestration
//!
//! One turn: store the user message, build the prompt, pass the admission gate,
//! call the model, format the reply and store it as the bot message.

use std::sync::Arc;
use thiserror::Error;
use toolbot_core::{
    build_prompt, format_reply, parse_entries, AdmissionController, AdmissionRejected,
    ChatMessage, Sender,
};
use tracing::{debug, info, warn};

use crate::llm::TextGenerator;
use crate::store::{ConversationStore, StoreError};

/// Pseudo-identity used for every chat turn
pub const ANONYMOUS_USER: &str = "anonymous";

pub const ERROR_PREFIX: &str = "ERROR: An error occurred during API call: ";

/// What the caller sees for a turn that got past input validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Formatted markup, stored as the bot message
    Reply(String),
    /// Admission rejected; nothing was sent to the model
    RateLimited(AdmissionRejected),
    /// Model call failed; carries the error notice
    Failed(String),
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Please enter a message.")]
    EmptyMessage,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct ChatService {
    admission: Arc<AdmissionController>,
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn ConversationStore>,
}

impl ChatService {
    pub fn new(
        admission: Arc<AdmissionController>,
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            admission,
            generator,
            store,
        }
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Run one chat turn for `user_id`.
    ///
    /// Empty or whitespace-only input is rejected before anything is stored or sent.
    /// Rate-limit and error notices are returned but not stored.
    pub async fn handle_turn(
        &self,
        user_id: &str,
        text: &str,
        conversation_id: Option<&str>,
    ) -> Result<TurnOutcome, TurnError> {
        if text.trim().is_empty() {
            return Err(TurnError::EmptyMessage);
        }

        let tag = |message: ChatMessage| match conversation_id {
            Some(id) => message.with_conversation(id),
            None => message,
        };

        self.store
            .append(&tag(ChatMessage::new(user_id, text, Sender::User)))?;

        let prompt = build_prompt(text);

        match self.admission.admit().await {
            Ok(admitted) if !admitted.waited.is_zero() => {
                debug!(waited_ms = admitted.waited.as_millis() as u64, "Admitted after throttling");
            }
            Ok(_) => {}
            Err(rejected) => {
                info!(
                    retry_after_ms = rejected.retry_after.as_millis() as u64,
                    "Rate limit reached, model call skipped"
                );
                return Ok(TurnOutcome::RateLimited(rejected));
            }
        }

        let raw = match self.generator.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(model = %self.generator.model(), "Model call failed: {}", e);
                return Ok(TurnOutcome::Failed(format!("{}{}", ERROR_PREFIX, e)));
            }
        };

        let entries = parse_entries(&raw).len();
        if entries == 0 {
            warn!("Model reply had no platform entries, rendering as plain text");
        } else {
            debug!(entries, "Parsed model reply");
        }

        let markup = format_reply(&raw);
        self.store
            .append(&tag(ChatMessage::new(user_id, markup.as_str(), Sender::Bot)))?;

        Ok(TurnOutcome::Reply(markup))
    }
}
