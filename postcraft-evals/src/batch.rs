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

//! Batch evaluation over a list of test cases
//!
//! Each case optionally generates its prediction, then goes through the
//! [`EvaluationRunner`]. Cases run through a bounded pool but results always
//! come back in input order. A case whose prediction cannot be produced gets
//! a single `generation` error metric and the batch carries on.

use crate::generation::{GenerationError, PostGenerator, PostRequest};
use crate::runner::EvaluationRunner;
use crate::score::{aggregate_passes, average_valid_scores, MetricResult};
use crate::summary::{EvaluationSummary, SummaryBuilder};
use crate::Criteria;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Metric name recorded when a case has no prediction to evaluate
pub const GENERATION_METRIC: &str = "generation";

/// One batch test case
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestCase {
    /// Image description used as generation input
    pub input_text: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub criteria: Option<Criteria>,
    /// Evaluated as-is when generation is disabled
    #[serde(default)]
    pub prediction: Option<String>,
    /// Overrides the batch threshold for this case
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl TestCase {
    pub fn new(input_text: impl Into<String>) -> Self {
        Self {
            input_text: input_text.into(),
            ..Default::default()
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_prediction(mut self, prediction: impl Into<String>) -> Self {
        self.prediction = Some(prediction.into());
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// Per-case detail record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub input: String,
    pub prediction: String,
    pub reference: Option<String>,
    pub platform: Option<String>,
    pub tone: Option<String>,
    pub evaluation_results: Vec<MetricResult>,
    pub average_score: f64,
    pub passed: bool,
}

impl CaseResult {
    pub fn new(
        input: impl Into<String>,
        prediction: impl Into<String>,
        evaluation_results: Vec<MetricResult>,
        threshold: f64,
    ) -> Self {
        let average_score = average_valid_scores(&evaluation_results);
        Self {
            input: input.into(),
            prediction: prediction.into(),
            reference: None,
            platform: None,
            tone: None,
            passed: aggregate_passes(&evaluation_results, threshold),
            average_score,
            evaluation_results,
        }
    }

    fn for_case(
        case: &TestCase,
        prediction: String,
        evaluation_results: Vec<MetricResult>,
        threshold: f64,
    ) -> Self {
        Self {
            reference: case.reference.clone(),
            platform: case.platform.clone(),
            tone: case.tone.clone(),
            ..Self::new(case.input_text.clone(), prediction, evaluation_results, threshold)
        }
    }
}

/// Runs test cases through optional generation and evaluation
pub struct BatchRunner {
    runner: Arc<EvaluationRunner>,
    generator: Option<Arc<dyn PostGenerator>>,
}

impl BatchRunner {
    pub fn new(runner: Arc<EvaluationRunner>) -> Self {
        Self {
            runner,
            generator: None,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn PostGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Run every case and summarize.
    ///
    /// `threshold` applies to cases without their own override and falls back
    /// to the runner's configured default.
    pub async fn run(
        &self,
        cases: &[TestCase],
        generate_predictions: bool,
        threshold: Option<f64>,
    ) -> EvaluationSummary {
        let start = Instant::now();
        let threshold = self.runner.resolve_threshold(threshold);
        let concurrency = self.runner.config().max_concurrent_cases.max(1);

        let builder: SummaryBuilder = stream::iter(cases.iter().cloned().enumerate())
            .map(|(index, case)| self.run_case(index, case, generate_predictions, threshold))
            .buffered(concurrency)
            .collect()
            .await;

        let summary = builder.build();
        info!(
            total = summary.total_tests,
            passed = summary.passed,
            average_score = summary.average_score,
            duration_ms = start.elapsed().as_millis() as u64,
            "batch evaluation complete"
        );
        summary
    }

    async fn run_case(
        &self,
        index: usize,
        case: TestCase,
        generate_predictions: bool,
        batch_threshold: f64,
    ) -> CaseResult {
        let threshold = case.threshold.unwrap_or(batch_threshold);

        let prediction = match self.prediction_for(&case, generate_predictions).await {
            Ok(prediction) => prediction,
            Err(error) => {
                warn!(case = index, error = %error, "no prediction for test case");
                return CaseResult::for_case(
                    &case,
                    String::new(),
                    vec![MetricResult::failed(GENERATION_METRIC, error)],
                    threshold,
                );
            }
        };

        let results = self
            .runner
            .evaluate_metrics(
                &prediction,
                case.reference.as_deref(),
                Some(case.input_text.as_str()),
                case.criteria.as_ref(),
                threshold,
            )
            .await;

        CaseResult::for_case(&case, prediction, results, threshold)
    }

    async fn prediction_for(&self, case: &TestCase, generate: bool) -> Result<String, String> {
        if !generate {
            return case
                .prediction
                .clone()
                .filter(|p| !p.trim().is_empty())
                .ok_or_else(|| "No prediction provided".to_string());
        }

        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| "Post generator not available".to_string())?;

        let request = PostRequest::new(
            case.input_text.clone(),
            case.platform.as_deref(),
            case.tone.as_deref(),
        );
        let timeout = self.runner.config().metric_timeout();

        match tokio::time::timeout(timeout, generator.generate(&request)).await {
            Ok(Ok(post)) if !post.caption.trim().is_empty() => Ok(post.caption),
            Ok(Ok(_)) => Err(format!("Generation failed: {}", GenerationError::Empty)),
            Ok(Err(e)) => Err(format!("Generation failed: {}", e)),
            Err(_) => Err(format!("Generation failed: timed out after {:?}", timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::SocialMediaPost;
    use crate::{CriteriaJudge, EvalConfig, EvalError, JudgeRequest, Judgment, RawScore, ERROR_SCORE};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Scores a prediction by its length so cases are distinguishable
    struct LengthJudge;

    #[async_trait]
    impl CriteriaJudge for LengthJudge {
        async fn judge(&self, request: &JudgeRequest<'_>) -> Result<Judgment, EvalError> {
            Ok(Judgment {
                score: RawScore::Number(request.prediction.len() as f64 / 10.0),
                reasoning: None,
            })
        }
    }

    /// Fails on inputs containing "broken"; slower on earlier cases
    struct ScriptedGenerator;

    #[async_trait]
    impl PostGenerator for ScriptedGenerator {
        async fn generate(&self, request: &PostRequest) -> Result<SocialMediaPost, GenerationError> {
            if request.image_description.contains("broken") {
                return Err(GenerationError::Parse("expected value".to_string()));
            }
            if request.image_description.contains("slow") {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            if request.image_description.contains("blank") {
                return Ok(SocialMediaPost {
                    caption: "  ".to_string(),
                    call_to_action: None,
                    tags: None,
                });
            }
            Ok(SocialMediaPost {
                caption: format!("{}!", request.platform),
                call_to_action: None,
                tags: None,
            })
        }
    }

    fn batch_runner(config: EvalConfig) -> BatchRunner {
        let runner = EvaluationRunner::new(config).with_judge(Arc::new(LengthJudge));
        BatchRunner::new(Arc::new(runner)).with_generator(Arc::new(ScriptedGenerator))
    }

    #[tokio::test]
    async fn test_generation_failure_is_recorded() {
        let runner = batch_runner(EvalConfig::default());
        let cases = vec![
            TestCase::new("A sunset over mountains").with_platform("instagram"),
            TestCase::new("A broken image description"),
        ];

        let summary = runner.run(&cases, true, Some(0.7)).await;

        assert_eq!(summary.total_tests, 2);
        assert_eq!(summary.results.len(), 2);
        assert!(summary.failed >= 1);

        let first = &summary.results[0];
        assert_eq!(first.prediction, "instagram!");
        assert_eq!(first.evaluation_results[0].metric_name, "criteria");
        assert!((first.average_score - 1.0).abs() < 1e-12);
        assert!(first.passed);

        let second = &summary.results[1];
        assert_eq!(second.evaluation_results.len(), 1);
        assert_eq!(second.evaluation_results[0].metric_name, GENERATION_METRIC);
        assert_eq!(second.evaluation_results[0].score, ERROR_SCORE);
        assert!(!second.passed);
        assert!(!summary.metrics.contains_key(GENERATION_METRIC));
    }

    #[tokio::test]
    async fn test_empty_caption_is_generation_error() {
        let runner = batch_runner(EvalConfig::default());
        let summary = runner.run(&[TestCase::new("blank photo")], true, None).await;
        let error = summary.results[0].evaluation_results[0].error.as_deref().unwrap();
        assert!(error.contains("no caption"));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let runner = batch_runner(EvalConfig::default());
        let summary = runner.run(&[], true, None).await;
        assert_eq!(summary.total_tests, 0);
        assert_eq!(summary.passed, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.average_score, 0.0);
        assert!(summary.metrics.is_empty());
    }

    #[tokio::test]
    async fn test_order_preserved_under_concurrency() {
        let config = EvalConfig {
            max_concurrent_cases: 3,
            ..EvalConfig::default()
        };
        let runner = batch_runner(config);
        let cases = vec![
            TestCase::new("slow first").with_platform("a"),
            TestCase::new("second").with_platform("bb"),
            TestCase::new("third").with_platform("ccc"),
        ];

        let summary = runner.run(&cases, true, None).await;
        let predictions: Vec<_> = summary.results.iter().map(|c| c.prediction.as_str()).collect();
        assert_eq!(predictions, vec!["a!", "bb!", "ccc!"]);
    }

    #[tokio::test]
    async fn test_supplied_predictions_and_threshold_override() {
        let runner = batch_runner(EvalConfig::default());
        let cases = vec![
            TestCase::new("desc").with_prediction("12345"),
            TestCase::new("desc").with_prediction("12345").with_threshold(0.4),
            TestCase::new("desc"),
        ];

        let summary = runner.run(&cases, false, Some(0.6)).await;

        assert!(!summary.results[0].passed);
        assert!(summary.results[1].passed);
        assert_eq!(
            summary.results[2].evaluation_results[0].error.as_deref(),
            Some("No prediction provided")
        );
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.metrics.get("criteria"), Some(&0.5));
    }

    #[tokio::test]
    async fn test_case_without_prediction_fails_at_zero_threshold() {
        let runner = batch_runner(EvalConfig::default());
        let summary = runner.run(&[TestCase::new("desc")], false, Some(0.0)).await;

        let case = &summary.results[0];
        assert_eq!(case.evaluation_results[0].metric_name, GENERATION_METRIC);
        assert_eq!(case.average_score, 0.0);
        assert!(!case.passed);
        assert_eq!(summary.passed, 0);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_missing_generator() {
        let runner = BatchRunner::new(Arc::new(
            EvaluationRunner::new(EvalConfig::default()).with_judge(Arc::new(LengthJudge)),
        ));
        let summary = runner.run(&[TestCase::new("desc")], true, None).await;
        assert_eq!(
            summary.results[0].evaluation_results[0].error.as_deref(),
            Some("Post generator not available")
        );
    }

    #[test]
    fn test_case_deserializes_with_defaults() {
        let case: TestCase =
            serde_json::from_str(r#"{"input_text": "A cozy coffee shop"}"#).unwrap();
        assert_eq!(case.input_text, "A cozy coffee shop");
        assert!(case.reference.is_none());
        assert!(case.criteria.is_none());
        assert!(case.threshold.is_none());
    }
}
