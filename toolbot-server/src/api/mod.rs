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
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{auth_middleware, ApiKeyAuth};
use crate::service::ChatService;
use crate::store::StoreError;

pub mod chat;
pub mod health;
pub mod history;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Unauthorized")]
    Unauthorized,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!("Storage error: {}", err);
        ApiError::Internal(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Clone)]
pub struct AppState {
    pub chat: ChatService,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(chat: ChatService) -> Self {
        Self {
            chat,
            started_at: Instant::now(),
        }
    }
}

/// Build the application routes.
///
/// `/health` stays open; the chat and history routes sit behind the API key gate
/// when one is given.
pub fn router(state: AppState, auth: Option<Arc<ApiKeyAuth>>) -> Router {
    let mut routes = Router::new()
        .route("/chat", post(chat::chat))
        .route("/get_history", get(history::get_history))
        .route("/get_conversation/:user_id", get(history::get_conversation));

    if let Some(auth) = auth {
        routes = routes.route_layer(middleware::from_fn_with_state(auth, auth_middleware));
    }

    Router::new()
        .route("/health", get(health::health_check))
        .merge(routes)
        .with_state(state)
}
