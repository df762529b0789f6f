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

//! # Postcraft Evaluation Framework
//!
//! Generates social media posts from image descriptions and scores text
//! against quality criteria.
//!
//! ## Features
//!
//! - **Capability traits**: judge, similarity and generation backends are
//!   plain trait objects, so tests can swap in fakes
//! - **Built-in metrics**: LLM criteria judge, embedding distance, string distance
//! - **Uniform results**: every metric folds into a [`MetricResult`], failures
//!   included (score `-1.0` plus an error message)
//! - **Batch evaluation**: ordered, bounded-concurrency test case runs with
//!   per-metric summaries
//!
//! ## Example
//!
//! ```rust,ignore
//! use postcraft_evals::{EvalConfig, EvaluationRequest, EvaluationRunner};
//! use postcraft_evals::evaluators::{EmbeddingDistance, LlmCriteriaJudge, StringDistance};
//! use postcraft_evals::llm_client::OpenAIClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Arc::new(OpenAIClient::new(
//!         std::env::var("OPENAI_API_KEY").unwrap(),
//!         "gpt-4o".to_string(),
//!     ));
//!
//!     let runner = EvaluationRunner::new(EvalConfig::default())
//!         .with_judge(Arc::new(LlmCriteriaJudge::new(client.clone())))
//!         .with_semantic(Arc::new(EmbeddingDistance::new(client)))
//!         .with_lexical(Arc::new(StringDistance::new()));
//!
//!     let request = EvaluationRequest::new("Great sunset shot!")
//!         .with_reference("A sunset post about mountains");
//!     let outcome = runner.evaluate(&request).await;
//!     println!("passed: {}", outcome.passed);
//! }
//! ```

use async_trait::async_trait;
use evaluators::StringDistanceKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

pub mod batch;
pub mod evaluators;
pub mod generation;
pub mod llm_client;
pub mod runner;
pub mod score;
pub mod summary;

pub use batch::{BatchRunner, CaseResult, TestCase, GENERATION_METRIC};
pub use generation::{
    GenerationError, LlmPostGenerator, PostGenerator, PostRequest, SocialMediaPost,
    DEFAULT_PLATFORM, DEFAULT_TONE,
};
pub use runner::{EvaluationOutcome, EvaluationRequest, EvaluationRunner};
pub use score::{average_valid_scores, MetricResult, RawScore, ERROR_SCORE};
pub use summary::{EvaluationSummary, SummaryBuilder};

/// Named rubric items, e.g. `{"engagement": "Is the output engaging?"}`.
///
/// Ordered so prompts and logs are deterministic.
pub type Criteria = BTreeMap<String, String>;

/// Everything a criteria judge needs to rate one prediction
#[derive(Debug, Clone)]
pub struct JudgeRequest<'a> {
    pub prediction: &'a str,
    pub input: Option<&'a str>,
    pub reference: Option<&'a str>,
    pub criteria: &'a Criteria,
}

/// Raw output of a judge call, before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct Judgment {
    pub score: RawScore,
    pub reasoning: Option<String>,
}

/// LLM-based scorer rating text against named rubric items
#[async_trait]
pub trait CriteriaJudge: Send + Sync {
    async fn judge(&self, request: &JudgeRequest<'_>) -> Result<Judgment, EvalError>;
}

/// Scorer producing a closeness value between a prediction and a reference
#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    /// Metric name reported in results (e.g. "embedding_distance")
    fn metric_name(&self) -> &str;

    async fn score(&self, prediction: &str, reference: &str) -> Result<RawScore, EvalError>;
}

/// Errors that can occur during evaluation
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("{0} evaluator not available")]
    Unavailable(String),

    #[error("LLM client error: {0}")]
    LLMClientError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration for evaluation execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Threshold used when a request does not supply one
    pub default_threshold: f64,

    /// Timeout per external call (judge, similarity, generation) in seconds
    pub metric_timeout_secs: u64,

    /// Maximum number of batch test cases in flight
    pub max_concurrent_cases: usize,

    /// Algorithm behind the `string_distance` metric
    pub string_distance: StringDistanceKind,
}

impl EvalConfig {
    pub fn metric_timeout(&self) -> Duration {
        Duration::from_secs(self.metric_timeout_secs)
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            default_threshold: 0.7,
            metric_timeout_secs: 30,
            max_concurrent_cases: 4,
            string_distance: StringDistanceKind::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_config_default() {
        let config = EvalConfig::default();
        assert_eq!(config.default_threshold, 0.7);
        assert_eq!(config.metric_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_concurrent_cases, 4);
        assert_eq!(config.string_distance, StringDistanceKind::JaroWinkler);
    }

    #[test]
    fn test_unavailable_message() {
        let err = EvalError::Unavailable("Criteria".to_string());
        assert_eq!(err.to_string(), "Criteria evaluator not available");
    }
}
