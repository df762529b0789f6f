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
pub mod config;
pub mod validation;

use anyhow::Result;
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::{self as axum_middleware, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use postcraft_evals::evaluators::{EmbeddingDistance, LlmCriteriaJudge, StringDistance};
use postcraft_evals::llm_client::OpenAIClient;
use postcraft_evals::{EvaluationRunner, LlmPostGenerator};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{evaluate, evaluate_batch, generate_post, health_check, ApiError, AppState};
use config::{HttpServerConfig, ServerConfig};

const DEFAULT_LOG_FILTER: &str = "postcraft_server=info,postcraft_evals=info,tower_http=info";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter; `POSTCRAFT_LOG_FORMAT=json`
/// switches to JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("POSTCRAFT_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Build provider-backed capabilities from configuration.
///
/// Without a credential the state carries no capabilities. If the HTTP
/// client cannot be built the credential is still recorded, so evaluation
/// requests report the evaluator as unavailable.
pub fn build_state(config: &ServerConfig) -> AppState {
    let mut state = AppState::unconfigured(config.llm.generation_model.clone());

    let Some(api_key) = config.llm.api_key() else {
        tracing::warn!("OPENAI_API_KEY not set; generation and evaluation requests will fail");
        return state;
    };
    state.credential_configured = true;

    let http = match reqwest::Client::builder()
        .timeout(Duration::from_secs(config.llm.request_timeout_secs))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to initialize LLM HTTP client: {}", e);
            return state;
        }
    };

    let client_for = |model: &str| {
        Arc::new(
            OpenAIClient::new(api_key.to_string(), model.to_string())
                .with_base_url(config.llm.base_url.clone())
                .with_embedding_model(config.llm.embedding_model.clone())
                .with_http_client(http.clone()),
        )
    };

    let generator = LlmPostGenerator::new(client_for(&config.llm.generation_model))
        .with_temperature(config.llm.generation_temperature);

    let judge_client = client_for(&config.llm.evaluation_model);
    let evaluator = EvaluationRunner::new(config.evaluation.clone())
        .with_judge(Arc::new(LlmCriteriaJudge::new(judge_client.clone())))
        .with_semantic(Arc::new(EmbeddingDistance::new(judge_client)))
        .with_lexical(Arc::new(
            StringDistance::new().with_kind(config.evaluation.string_distance),
        ));

    tracing::info!(
        generation_model = %config.llm.generation_model,
        evaluation_model = %config.llm.evaluation_model,
        embedding_model = %config.llm.embedding_model,
        "LLM capabilities initialized"
    );

    state.generator = Some(Arc::new(generator));
    state.evaluator = Some(Arc::new(evaluator));
    state
}

fn cors_layer(config: &HttpServerConfig) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.cors_origins.is_empty() {
        tracing::warn!("CORS: Allowing all origins. Set cors_origins in production!");
        return cors.allow_origin(Any);
    }

    tracing::info!("CORS: Allowing origins: {:?}", config.cors_origins);
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("CORS: Ignoring invalid origin {:?}", origin);
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Abort handlers that outlive the request budget with a JSON 408
async fn request_timeout(
    State(limit): State<Duration>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => Ok(response),
        Err(_) => {
            tracing::warn!("Request exceeded {:?}", limit);
            Err(ApiError::RequestTimeout(format!(
                "Request timed out after {}s",
                limit.as_secs()
            )))
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState, config: &HttpServerConfig) -> Router {
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/generate-post", post(generate_post))
        .route("/api/evaluate", post(evaluate))
        .route("/api/evaluate/batch", post(evaluate_batch))
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            Duration::from_secs(config.request_timeout_secs),
            request_timeout,
        ));

    let app = if config.enable_cors {
        app.layer(cors_layer(config))
    } else {
        app
    };

    app.layer(TraceLayer::new_for_http())
}

pub async fn run_server(config: ServerConfig) -> Result<()> {
    init_tracing();

    tracing::info!("Starting Postcraft Server");
    tracing::info!("Configuration: {:#?}", config);

    config.validate()?;
    let addr = config.socket_addr()?;

    let state = build_state(&config);
    let app = build_router(state, &config.server);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Postcraft Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_state_without_credential() {
        let state = build_state(&ServerConfig::default());
        assert!(!state.credential_configured);
        assert!(state.generator.is_none());
        assert!(state.evaluator.is_none());
        assert_eq!(state.model, "gpt-4o");
    }

    #[test]
    fn test_state_with_credential() {
        let mut config = ServerConfig::default();
        config.llm.openai_api_key = Some("sk-test".to_string());
        let state = build_state(&config);
        assert!(state.credential_configured);
        assert!(state.generator.is_some());
        assert_eq!(
            state.evaluator.unwrap().config().default_threshold,
            config.evaluation.default_threshold
        );
    }
}
