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
    extract::{Path, State},
    Json,
};
use toolbot_core::{ChatMessage, Sender};
use tracing::debug;

use crate::api::{ApiError, AppState};
use crate::service::ANONYMOUS_USER;
use crate::store::MessageQuery;

/// Number of entries returned by the history sidebar
pub const HISTORY_LIMIT: usize = 50;

/// GET /get_history
///
/// Latest user-authored messages of the anonymous identity, newest first.
#[tracing::instrument(skip(state))]
pub async fn get_history(State(state): State<AppState>) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let query = MessageQuery::for_user(ANONYMOUS_USER)
        .sender(Sender::User)
        .newest_first()
        .limit(HISTORY_LIMIT);

    let messages = state.chat.store().query(&query)?;
    debug!(count = messages.len(), "Loaded history");
    Ok(Json(messages))
}

/// GET /get_conversation/:user_id
#[tracing::instrument(skip(state))]
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let messages = state.chat.store().query(&MessageQuery::for_user(user_id))?;
    debug!(count = messages.len(), "Loaded conversation");
    Ok(Json(messages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::api::test_support::{app, json_body};
    use crate::auth::ApiKeyAuth;
    use crate::service::tests::{FakeGenerator, WELL_FORMED};
    use crate::store::ConversationStore;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn seed(store: &dyn ConversationStore, user: &str, text: &str, sender: Sender, secs: i64) {
        let mut message = ChatMessage::new(user, text, sender);
        message.timestamp = Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs);
        store.append(&message).unwrap();
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_history_newest_first_and_limited() {
        let (state, store) = app(15, Arc::new(FakeGenerator::replying(WELL_FORMED)));
        for i in 0..60 {
            seed(store.as_ref(), ANONYMOUS_USER, &format!("q{}", i), Sender::User, i);
            seed(store.as_ref(), ANONYMOUS_USER, "<div>a</div>", Sender::Bot, i);
        }
        seed(store.as_ref(), "someone-else", "hidden", Sender::User, 100);

        let response = router(state, None).oneshot(get("/get_history")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response.into_body()).await;
        let items = json.as_array().unwrap();
        assert_eq!(items.len(), HISTORY_LIMIT);
        assert_eq!(items[0]["message"], "q59");
        assert_eq!(items[49]["message"], "q10");
        assert!(items.iter().all(|m| m["sender"] == "user"));
        assert!(items[0]["_id"].is_string());
        assert!(items[0]["timestamp"].as_str().unwrap().starts_with("2023-11-14T"));
    }

    #[tokio::test]
    async fn test_conversation_oldest_first() {
        let (state, store) = app(15, Arc::new(FakeGenerator::replying(WELL_FORMED)));
        seed(store.as_ref(), "u1", "reply", Sender::Bot, 2);
        seed(store.as_ref(), "u1", "question", Sender::User, 1);
        seed(store.as_ref(), "u2", "other", Sender::User, 0);

        let response = router(state, None)
            .oneshot(get("/get_conversation/u1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response.into_body()).await;
        let texts: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["message"].as_str().unwrap())
            .collect();
        assert_eq!(texts, vec!["question", "reply"]);
    }

    #[tokio::test]
    async fn test_api_key_gate() {
        let (state, _store) = app(15, Arc::new(FakeGenerator::replying(WELL_FORMED)));
        let auth = Arc::new(ApiKeyAuth::new(vec!["k".to_string()]));
        let app = router(state, Some(auth));

        let denied = app.clone().oneshot(get("/get_history")).await.unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
        let json = json_body(denied.into_body()).await;
        assert_eq!(json["error"], "Unauthorized");

        let allowed = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/get_history")
                    .header("Authorization", "Bearer k")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);

        let health = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }
}
