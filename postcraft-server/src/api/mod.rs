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

pub mod evaluate;
pub mod generate;
pub mod health;

pub use evaluate::{evaluate, evaluate_batch};
pub use generate::generate_post;
pub use health::health_check;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use postcraft_evals::{EvaluationRunner, PostGenerator};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

pub const MISSING_CREDENTIAL: &str = "OPENAI_API_KEY environment variable is not set";

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Evaluation service not available")]
    EvaluatorUnavailable,

    #[error("Request timeout: {0}")]
    RequestTimeout(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Configuration(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::EvaluatorUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Evaluation service not available".to_string(),
            ),
            ApiError::RequestTimeout(msg) => (StatusCode::REQUEST_TIMEOUT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Shared application state
///
/// Capabilities are built once at startup. `None` means initialisation
/// failed, which handlers report per request.
#[derive(Clone)]
pub struct AppState {
    /// Whether a provider credential was configured
    pub credential_configured: bool,
    /// Generation model reported by the health check
    pub model: String,
    pub generator: Option<Arc<dyn PostGenerator>>,
    pub evaluator: Option<Arc<EvaluationRunner>>,
}

impl AppState {
    /// State with no capabilities, as when the credential is missing
    pub fn unconfigured(model: impl Into<String>) -> Self {
        Self {
            credential_configured: false,
            model: model.into(),
            generator: None,
            evaluator: None,
        }
    }

    fn require_credential(&self) -> Result<(), ApiError> {
        if self.credential_configured {
            Ok(())
        } else {
            Err(ApiError::Configuration(MISSING_CREDENTIAL.to_string()))
        }
    }

    /// Credential first, then evaluator presence
    pub fn evaluator(&self) -> Result<Arc<EvaluationRunner>, ApiError> {
        self.require_credential()?;
        self.evaluator.clone().ok_or(ApiError::EvaluatorUnavailable)
    }

    pub fn generator(&self) -> Result<Arc<dyn PostGenerator>, ApiError> {
        self.require_credential()?;
        self.generator
            .clone()
            .ok_or_else(|| ApiError::Internal("Post generator not available".to_string()))
    }
}
