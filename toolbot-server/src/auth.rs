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

//! API key authentication
//!
//! Off unless `auth.enabled` is set. Keys are accepted from
//! `Authorization: Bearer <key>` or `X-API-Key: <key>`.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use std::sync::Arc;

use crate::api::ApiError;

pub struct ApiKeyAuth {
    keys: HashSet<String>,
}

impl ApiKeyAuth {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> bool {
        extract_api_key(headers).map_or(false, |key| self.keys.contains(key))
    }
}

/// Pull the presented key from request headers
pub fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get("Authorization") {
        if let Some(token) = value.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")) {
            return Some(token.trim());
        }
    }

    headers
        .get("X-API-Key")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}

pub async fn auth_middleware(
    State(auth): State<Arc<ApiKeyAuth>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !auth.authenticate(request.headers()) {
        tracing::warn!(path = %request.uri().path(), "Rejected request without a valid API key");
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}
