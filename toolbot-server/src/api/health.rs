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

use axum::{extract::State, Json};
use serde::Serialize;
use toolbot_core::AdmissionSnapshot;
use tracing::debug;

use crate::api::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub admission: AdmissionSnapshot,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    debug!("Health check requested");

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        admission: state.chat.admission().snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::api::test_support::{app, json_body};
    use crate::service::tests::{FakeGenerator, WELL_FORMED};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_reports_admission_stats() {
        let (state, _store) = app(15, Arc::new(FakeGenerator::replying(WELL_FORMED)));
        state
            .chat
            .handle_turn("anonymous", "hello", None)
            .await
            .unwrap();

        let response = router(state, None)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response.into_body()).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(json["admission"]["admitted"], 1);
        assert_eq!(json["admission"]["max_requests"], 15);
        assert_eq!(json["admission"]["in_window"], 1);
    }
}
