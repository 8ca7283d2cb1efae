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

pub mod api;
pub mod auth;
pub mod config;
pub mod llm;
pub mod service;
pub mod store;

use anyhow::Result;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::AppState;
use auth::ApiKeyAuth;
use config::ServerConfig;
use llm::GeminiProvider;
use service::ChatService;
use store::FileStore;
use toolbot_core::AdmissionController;

pub async fn run_server(config: ServerConfig) -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "toolbot_server=info,toolbot_core=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Toolbot Server");
    tracing::info!("Configuration: {:#?}", config);

    // Validate configuration
    config.validate()?;

    let store = Arc::new(FileStore::open(&config.storage.data_dir)?);
    tracing::info!("Conversation log at {:?}", store.path());

    let api_key = config.llm.gemini_api_key.clone().unwrap_or_default();
    let generator = Arc::new(GeminiProvider::new(
        api_key,
        config.llm.model.clone(),
        config.llm.base_url.clone(),
    ));
    tracing::info!("Using model {}", config.llm.model);

    let admission = Arc::new(AdmissionController::new(config.admission_config()));
    tracing::info!(
        "Admission: {} calls per {}s",
        config.admission.max_requests,
        config.admission.window_secs
    );

    let state = AppState::new(ChatService::new(admission, generator, store));

    let auth = if config.auth.enabled {
        tracing::info!(
            "API key authentication enabled ({} keys)",
            config.auth.api_keys.len()
        );
        Some(Arc::new(ApiKeyAuth::new(config.auth.api_keys.clone())))
    } else {
        None
    };

    let app = api::router(state, auth)
        .layer(if config.server.enable_cors {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            CorsLayer::new()
        })
        .layer(TraceLayer::new_for_http());

    let addr = config.socket_addr()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Toolbot Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
