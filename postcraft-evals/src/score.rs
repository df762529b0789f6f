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

//! Score normalization and the uniform per-metric result record
//!
//! Providers hand back scores in whatever shape they like: a float, a
//! `"PASS"`/`"FAIL"` verdict, a numeric string, or a nested object. All of
//! them are captured as a [`RawScore`] and mapped into `[0, 1]` by exactly one
//! normalization function per metric family:
//!
//! - [`RawScore::normalize_judgment`] for criteria verdicts
//! - [`RawScore::normalize_similarity`] for similarity / distance values
//!
//! Anything that cannot be interpreted lands on the `0.5` midpoint rather
//! than failing the evaluation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Sentinel score for a metric that could not be computed
pub const ERROR_SCORE: f64 = -1.0;

/// Score used when a raw value cannot be interpreted
const UNCERTAIN_SCORE: f64 = 0.5;

/// Raw score as returned by an external scorer
#[derive(Debug, Clone, PartialEq)]
pub enum RawScore {
    Number(f64),
    Token(String),
    Unknown,
}

impl RawScore {
    /// Capture a JSON value. Nested objects are unwrapped through their
    /// `score` field.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => n.as_f64().map(RawScore::Number).unwrap_or(RawScore::Unknown),
            Value::String(s) => RawScore::Token(s.clone()),
            Value::Bool(b) => RawScore::Number(if *b { 1.0 } else { 0.0 }),
            Value::Object(map) => map
                .get("score")
                .map(RawScore::from_json)
                .unwrap_or(RawScore::Unknown),
            _ => RawScore::Unknown,
        }
    }

    /// Map a judge verdict into `[0, 1]`.
    ///
    /// `PASS`/`1` → 1.0, `FAIL`/`0` → 0.0, other numerics are clamped,
    /// everything else is 0.5.
    pub fn normalize_judgment(&self) -> f64 {
        match self {
            RawScore::Number(n) if n.is_finite() => n.clamp(0.0, 1.0),
            RawScore::Token(token) => {
                let token = token.trim();
                let upper = token.to_uppercase();
                if token == "1" || upper.contains("PASS") {
                    1.0
                } else if token == "0" || upper.contains("FAIL") {
                    0.0
                } else {
                    match token.parse::<f64>() {
                        Ok(n) if n.is_finite() => n.clamp(0.0, 1.0),
                        _ => UNCERTAIN_SCORE,
                    }
                }
            }
            _ => UNCERTAIN_SCORE,
        }
    }

    /// Map a similarity into `[0, 1]`.
    ///
    /// Values already in range pass through; anything else is read as a
    /// distance: `max(0, min(1, 1 - |raw|))`.
    pub fn normalize_similarity(&self) -> f64 {
        let raw = match self {
            RawScore::Number(n) => *n,
            RawScore::Token(token) => match token.trim().parse::<f64>() {
                Ok(n) => n,
                Err(_) => return UNCERTAIN_SCORE,
            },
            RawScore::Unknown => return UNCERTAIN_SCORE,
        };

        if !raw.is_finite() {
            return UNCERTAIN_SCORE;
        }

        if (0.0..=1.0).contains(&raw) {
            raw
        } else {
            (1.0 - raw.abs()).clamp(0.0, 1.0)
        }
    }
}

impl fmt::Display for RawScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawScore::Number(n) => write!(f, "{}", n),
            RawScore::Token(token) => write!(f, "{}", token),
            RawScore::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of a single evaluation metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Name of the evaluation metric
    pub metric_name: String,

    /// Score in `[0, 1]`, or [`ERROR_SCORE`] when the metric errored
    pub score: f64,

    /// `score >= threshold` for valid scores, always false on error
    pub passed: bool,

    pub reasoning: Option<String>,

    pub error: Option<String>,
}

impl MetricResult {
    /// Build a result for a computed score
    pub fn scored(
        metric_name: impl Into<String>,
        score: f64,
        threshold: f64,
        reasoning: Option<String>,
    ) -> Self {
        Self {
            metric_name: metric_name.into(),
            score,
            passed: passes(score, threshold),
            reasoning,
            error: None,
        }
    }

    /// Build a result for a metric that could not be computed
    pub fn failed(metric_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            score: ERROR_SCORE,
            passed: false,
            reasoning: None,
            error: Some(error.into()),
        }
    }

    /// Whether the score was actually computed
    pub fn is_valid(&self) -> bool {
        self.score >= 0.0
    }

    /// Re-judge the same score under a different threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.passed = passes(self.score, threshold);
        self
    }
}

/// Pass rule shared by every metric and aggregate
pub fn passes(score: f64, threshold: f64) -> bool {
    score >= 0.0 && score >= threshold
}

/// Mean of all valid (non-negative) scores, 0.0 when there are none
pub fn average_valid_scores<'a, I>(results: I) -> f64
where
    I: IntoIterator<Item = &'a MetricResult>,
{
    mean(results.into_iter().filter(|r| r.is_valid()).map(|r| r.score))
}

/// Aggregate verdict for a set of metric results.
///
/// Needs at least one computed score; an all-error set never passes,
/// even at threshold 0.0.
pub fn aggregate_passes(results: &[MetricResult], threshold: f64) -> bool {
    results.iter().any(MetricResult::is_valid)
        && passes(average_valid_scores(results), threshold)
}

pub(crate) fn mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_judgment_tokens() {
        assert_eq!(RawScore::Token("PASS".into()).normalize_judgment(), 1.0);
        assert_eq!(RawScore::Token("fail".into()).normalize_judgment(), 0.0);
        assert_eq!(RawScore::Token("Verdict: pass".into()).normalize_judgment(), 1.0);
        assert_eq!(RawScore::Token("1".into()).normalize_judgment(), 1.0);
        assert_eq!(RawScore::Token("0".into()).normalize_judgment(), 0.0);
        assert_eq!(RawScore::Token("0.8".into()).normalize_judgment(), 0.8);
        assert_eq!(RawScore::Token("maybe".into()).normalize_judgment(), 0.5);
        assert_eq!(RawScore::Unknown.normalize_judgment(), 0.5);
    }

    #[test]
    fn test_judgment_numbers() {
        assert_eq!(RawScore::Number(1.0).normalize_judgment(), 1.0);
        assert_eq!(RawScore::Number(0.0).normalize_judgment(), 0.0);
        assert_eq!(RawScore::Number(0.75).normalize_judgment(), 0.75);
        assert_eq!(RawScore::Number(4.0).normalize_judgment(), 1.0);
        assert_eq!(RawScore::Number(f64::NAN).normalize_judgment(), 0.5);
    }

    #[test]
    fn test_similarity_normalization() {
        assert_eq!(RawScore::Number(0.6).normalize_similarity(), 0.6);
        assert_eq!(RawScore::Number(1.5).normalize_similarity(), 0.0);
        assert!((RawScore::Number(-0.25).normalize_similarity() - 0.75).abs() < 1e-12);
        assert_eq!(RawScore::Token("0.3".into()).normalize_similarity(), 0.3);
        assert_eq!(RawScore::Token("close".into()).normalize_similarity(), 0.5);
        assert_eq!(RawScore::Unknown.normalize_similarity(), 0.5);
    }

    #[test]
    fn test_from_json_shapes() {
        assert_eq!(RawScore::from_json(&json!(0.9)), RawScore::Number(0.9));
        assert_eq!(
            RawScore::from_json(&json!("PASS")),
            RawScore::Token("PASS".to_string())
        );
        assert_eq!(
            RawScore::from_json(&json!({"score": 1})),
            RawScore::Number(1.0)
        );
        assert_eq!(RawScore::from_json(&json!({"value": "Y"})), RawScore::Unknown);
        assert_eq!(RawScore::from_json(&json!(null)), RawScore::Unknown);
    }

    #[test]
    fn test_pass_rule_across_thresholds() {
        for t in [0.0, 0.25, 0.5, 0.7, 1.0] {
            for s in [ERROR_SCORE, 0.0, 0.3, 0.7, 0.99, 1.0] {
                assert_eq!(passes(s, t), s >= 0.0 && s >= t, "s={} t={}", s, t);
            }
        }
    }

    #[test]
    fn test_failed_result_never_passes() {
        let result = MetricResult::failed("criteria", "boom").with_threshold(0.0);
        assert_eq!(result.score, ERROR_SCORE);
        assert!(!result.passed);
        assert!(!result.is_valid());
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert!(result.reasoning.is_none());
    }

    #[test]
    fn test_rejudge_without_recompute() {
        let result = MetricResult::scored("criteria", 0.65, 0.7, None);
        assert!(!result.passed);
        let relaxed = result.with_threshold(0.6);
        assert!(relaxed.passed);
        assert_eq!(relaxed.score, 0.65);
    }

    #[test]
    fn test_average_excludes_errors() {
        let results = vec![
            MetricResult::scored("criteria", 0.8, 0.7, None),
            MetricResult::failed("embedding_distance", "down"),
            MetricResult::scored("string_distance", 0.4, 0.7, None),
        ];
        assert!((average_valid_scores(&results) - 0.6).abs() < 1e-12);

        let all_failed = vec![
            MetricResult::failed("criteria", "x"),
            MetricResult::failed("string_distance", "y"),
        ];
        assert_eq!(average_valid_scores(&all_failed), 0.0);
        assert_eq!(average_valid_scores(&Vec::<MetricResult>::new()), 0.0);
    }

    #[test]
    fn test_aggregate_requires_a_computed_score() {
        let all_failed = vec![MetricResult::failed("generation", "No prediction provided")];
        assert!(!aggregate_passes(&all_failed, 0.0));
        assert!(!aggregate_passes(&[], 0.0));

        let mixed = vec![
            MetricResult::failed("criteria", "down"),
            MetricResult::scored("string_distance", 0.0, 0.0, None),
        ];
        assert!(aggregate_passes(&mixed, 0.0));
        assert!(!aggregate_passes(&mixed, 0.1));
    }
}
