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

//! Evaluation API endpoints
//!
//! Single-prediction evaluation and batch evaluation with optional
//! generation. Per-metric failures are reported inside the results; only
//! missing credentials, an unavailable evaluator and invalid input fail the
//! request.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use postcraft_evals::{
    BatchRunner, CaseResult, Criteria, EvaluationRequest, EvaluationSummary, MetricResult,
    TestCase,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{ApiError, AppState};
use crate::validation::{validate_prediction, validate_test_cases, validate_threshold};

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub prediction: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub input_text: Option<String>,
    #[serde(default)]
    pub criteria: Option<Criteria>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub success: bool,
    pub passed: bool,
    pub threshold: f64,
    pub average_score: f64,
    pub results: Vec<MetricResult>,
}

#[derive(Debug, Deserialize)]
pub struct BatchEvaluateRequest {
    pub test_cases: Vec<TestCase>,
    #[serde(default = "default_generate_predictions")]
    pub generate_predictions: bool,
    #[serde(default)]
    pub threshold: Option<f64>,
}

fn default_generate_predictions() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct BatchEvaluateResponse {
    pub success: bool,
    pub summary: EvaluationSummary,
    pub detailed_results: Vec<CaseResult>,
}

/// POST /api/evaluate - Evaluate one prediction
pub async fn evaluate(
    State(state): State<AppState>,
    payload: Result<Json<EvaluateRequest>, JsonRejection>,
) -> Result<Json<EvaluateResponse>, ApiError> {
    let Json(req) = payload?;
    validate_prediction(&req.prediction)?;
    validate_threshold(req.threshold)?;

    let evaluator = state.evaluator()?;

    let mut request = EvaluationRequest::new(req.prediction);
    request.reference = req.reference;
    request.input = req.input_text;
    request.criteria = req.criteria;
    request.threshold = req.threshold;

    let outcome = evaluator.evaluate(&request).await;

    info!(
        metrics = outcome.results.len(),
        average_score = outcome.average_score,
        passed = outcome.passed,
        "Evaluation complete"
    );

    Ok(Json(EvaluateResponse {
        success: true,
        passed: outcome.passed,
        threshold: outcome.threshold,
        average_score: outcome.average_score,
        results: outcome.results,
    }))
}

/// POST /api/evaluate/batch - Evaluate a list of test cases
pub async fn evaluate_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchEvaluateRequest>, JsonRejection>,
) -> Result<Json<BatchEvaluateResponse>, ApiError> {
    let Json(req) = payload?;
    validate_test_cases(&req.test_cases)?;
    validate_threshold(req.threshold)?;

    let evaluator = state.evaluator()?;

    let mut runner = BatchRunner::new(evaluator);
    if let Some(generator) = state.generator.clone() {
        runner = runner.with_generator(generator);
    }

    info!(
        cases = req.test_cases.len(),
        generate_predictions = req.generate_predictions,
        "Running batch evaluation"
    );

    let summary = runner
        .run(&req.test_cases, req.generate_predictions, req.threshold)
        .await;

    Ok(Json(BatchEvaluateResponse {
        success: true,
        detailed_results: summary.results.clone(),
        summary,
    }))
}
