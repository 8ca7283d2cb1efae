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

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, AppState};
use crate::service::{TurnError, TurnOutcome, ANONYMOUS_USER};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
}

impl ChatReply {
    fn new(response: String) -> Self {
        Self {
            response,
            status: None,
        }
    }

    fn with_status(response: String, status: &'static str) -> Self {
        Self {
            response,
            status: Some(status),
        }
    }
}

/// POST /chat
#[tracing::instrument(skip(state, payload))]
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let text = request.message.unwrap_or_default();

    let outcome = match state
        .chat
        .handle_turn(ANONYMOUS_USER, &text, request.conversation_id.as_deref())
        .await
    {
        Ok(outcome) => outcome,
        Err(TurnError::EmptyMessage) => {
            let reply = ChatReply::new(TurnError::EmptyMessage.to_string());
            return Ok((StatusCode::BAD_REQUEST, Json(reply)).into_response());
        }
        Err(TurnError::Store(e)) => return Err(e.into()),
    };

    let response = match outcome {
        TurnOutcome::Reply(markup) => (StatusCode::OK, Json(ChatReply::new(markup))).into_response(),
        TurnOutcome::RateLimited(rejected) => {
            let retry_after_secs = rejected.retry_after.as_millis() / 1000 + 1;
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(
                    header::RETRY_AFTER,
                    HeaderValue::from(retry_after_secs as u64),
                )],
                Json(ChatReply::with_status(rejected.to_string(), "rate_limit")),
            )
                .into_response()
        }
        TurnOutcome::Failed(notice) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ChatReply::with_status(notice, "error")),
        )
            .into_response(),
    };

    Ok(response)
}
