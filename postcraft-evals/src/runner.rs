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

//! Evaluation aggregator
//!
//! Runs the criteria judge for every prediction and, when a reference is
//! supplied, the semantic and lexical similarity metrics. Each metric has its
//! own failure boundary: an error or timeout in one becomes that metric's
//! error record and never touches the others.
//!
//! The threshold is applied here, at aggregation time, so scorers stay
//! threshold-agnostic.

use crate::evaluators::{
    default_criteria, CRITERIA_METRIC, EMBEDDING_DISTANCE_METRIC, STRING_DISTANCE_METRIC,
};
use crate::score::{aggregate_passes, average_valid_scores, MetricResult};
use crate::{Criteria, CriteriaJudge, EvalConfig, EvalError, JudgeRequest, SimilarityScorer};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// One prediction to evaluate
#[derive(Debug, Clone, Default)]
pub struct EvaluationRequest {
    pub prediction: String,
    pub reference: Option<String>,
    pub input: Option<String>,
    pub criteria: Option<Criteria>,
    pub threshold: Option<f64>,
}

impl EvaluationRequest {
    pub fn new(prediction: impl Into<String>) -> Self {
        Self {
            prediction: prediction.into(),
            ..Default::default()
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_criteria(mut self, criteria: Criteria) -> Self {
        self.criteria = Some(criteria);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// Aggregated outcome of one evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub results: Vec<MetricResult>,
    pub average_score: f64,
    pub passed: bool,
    pub threshold: f64,
}

impl EvaluationOutcome {
    pub fn from_results(results: Vec<MetricResult>, threshold: f64) -> Self {
        let average_score = average_valid_scores(&results);
        Self {
            passed: aggregate_passes(&results, threshold),
            average_score,
            results,
            threshold,
        }
    }
}

/// Runs the configured metrics for a prediction.
///
/// Every capability is optional: one that failed to initialise is reported
/// as "not available" in its metric result.
pub struct EvaluationRunner {
    config: EvalConfig,
    judge: Option<Arc<dyn CriteriaJudge>>,
    semantic: Option<Arc<dyn SimilarityScorer>>,
    lexical: Option<Arc<dyn SimilarityScorer>>,
}

impl EvaluationRunner {
    pub fn new(config: EvalConfig) -> Self {
        Self {
            config,
            judge: None,
            semantic: None,
            lexical: None,
        }
    }

    pub fn with_judge(mut self, judge: Arc<dyn CriteriaJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn with_semantic(mut self, scorer: Arc<dyn SimilarityScorer>) -> Self {
        self.semantic = Some(scorer);
        self
    }

    pub fn with_lexical(mut self, scorer: Arc<dyn SimilarityScorer>) -> Self {
        self.lexical = Some(scorer);
        self
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Request threshold, else the configured default
    pub fn resolve_threshold(&self, threshold: Option<f64>) -> f64 {
        threshold.unwrap_or(self.config.default_threshold)
    }

    /// Evaluate a request and aggregate its metrics
    pub async fn evaluate(&self, request: &EvaluationRequest) -> EvaluationOutcome {
        let threshold = self.resolve_threshold(request.threshold);
        let results = self
            .evaluate_metrics(
                &request.prediction,
                request.reference.as_deref(),
                request.input.as_deref(),
                request.criteria.as_ref(),
                threshold,
            )
            .await;
        EvaluationOutcome::from_results(results, threshold)
    }

    /// Run every applicable metric.
    ///
    /// Always returns the criteria result first; with a non-empty reference
    /// it is followed by embedding distance and string distance.
    pub async fn evaluate_metrics(
        &self,
        prediction: &str,
        reference: Option<&str>,
        input: Option<&str>,
        criteria: Option<&Criteria>,
        threshold: f64,
    ) -> Vec<MetricResult> {
        let reference = reference.filter(|r| !r.trim().is_empty());
        let criteria_result = self.run_criteria(prediction, reference, input, criteria, threshold);

        let results = match reference {
            Some(reference) => {
                let (criteria_result, semantic, lexical) = futures::join!(
                    criteria_result,
                    self.run_similarity(
                        self.semantic.as_ref(),
                        EMBEDDING_DISTANCE_METRIC,
                        "Embedding distance",
                        "Semantic similarity",
                        prediction,
                        reference,
                        threshold,
                    ),
                    self.run_similarity(
                        self.lexical.as_ref(),
                        STRING_DISTANCE_METRIC,
                        "String distance",
                        "String similarity",
                        prediction,
                        reference,
                        threshold,
                    ),
                );
                vec![criteria_result, semantic, lexical]
            }
            None => vec![criteria_result.await],
        };

        debug!(
            metrics = results.len(),
            errors = results.iter().filter(|r| !r.is_valid()).count(),
            "evaluation metrics computed"
        );
        results
    }

    async fn run_criteria(
        &self,
        prediction: &str,
        reference: Option<&str>,
        input: Option<&str>,
        criteria: Option<&Criteria>,
        threshold: f64,
    ) -> MetricResult {
        let defaults;
        let criteria = match criteria.filter(|c| !c.is_empty()) {
            Some(criteria) => criteria,
            None => {
                defaults = default_criteria();
                &defaults
            }
        };

        let outcome = match &self.judge {
            Some(judge) => {
                let request = JudgeRequest {
                    prediction,
                    input,
                    reference,
                    criteria,
                };
                self.bounded(judge.judge(&request)).await
            }
            None => Err(EvalError::Unavailable("Criteria".to_string())),
        };

        match outcome {
            Ok(judgment) => MetricResult::scored(
                CRITERIA_METRIC,
                judgment.score.normalize_judgment(),
                threshold,
                Some(judgment.reasoning.unwrap_or_default()),
            ),
            Err(e) => metric_error(CRITERIA_METRIC, e),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_similarity(
        &self,
        scorer: Option<&Arc<dyn SimilarityScorer>>,
        default_name: &str,
        display_name: &str,
        reasoning_label: &str,
        prediction: &str,
        reference: &str,
        threshold: f64,
    ) -> MetricResult {
        let Some(scorer) = scorer else {
            return metric_error(
                default_name,
                EvalError::Unavailable(display_name.to_string()),
            );
        };

        match self.bounded(scorer.score(prediction, reference)).await {
            Ok(raw) => MetricResult::scored(
                scorer.metric_name(),
                raw.normalize_similarity(),
                threshold,
                Some(format!("{}: {}", reasoning_label, raw)),
            ),
            Err(e) => metric_error(scorer.metric_name(), e),
        }
    }

    /// Apply the per-call timeout
    async fn bounded<T, F>(&self, call: F) -> Result<T, EvalError>
    where
        F: Future<Output = Result<T, EvalError>>,
    {
        let timeout = self.config.metric_timeout();
        tokio::time::timeout(timeout, call)
            .await
            .unwrap_or(Err(EvalError::Timeout(timeout)))
    }
}

fn metric_error(metric_name: &str, error: EvalError) -> MetricResult {
    warn!(metric = metric_name, error = %error, "metric could not be computed");
    let message = match &error {
        EvalError::Unavailable(_) => error.to_string(),
        _ => format!("Evaluation error: {}", error),
    };
    MetricResult::failed(metric_name, message)
}
