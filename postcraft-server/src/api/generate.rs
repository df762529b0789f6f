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

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use postcraft_evals::{PostRequest, SocialMediaPost};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::api::{ApiError, AppState};
use crate::validation::validate_image_description;

#[derive(Debug, Deserialize)]
pub struct GeneratePostRequest {
    pub image_description: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GeneratePostResponse {
    pub success: bool,
    pub post: SocialMediaPost,
    pub platform: String,
    pub tone: String,
}

/// POST /api/generate-post - Generate a social media post for an image
pub async fn generate_post(
    State(state): State<AppState>,
    payload: Result<Json<GeneratePostRequest>, JsonRejection>,
) -> Result<Json<GeneratePostResponse>, ApiError> {
    let Json(req) = payload?;
    validate_image_description(&req.image_description)?;

    let generator = state.generator()?;
    let request = PostRequest::new(
        req.image_description,
        req.platform.as_deref(),
        req.tone.as_deref(),
    );

    info!(platform = %request.platform, tone = %request.tone, "Generating post");

    let post = generator.generate(&request).await.map_err(|e| {
        error!("Post generation failed: {}", e);
        ApiError::Internal(format!("Failed to generate post: {}", e))
    })?;

    Ok(Json(GeneratePostResponse {
        success: true,
        post,
        platform: request.platform,
        tone: request.tone,
    }))
}
