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

//! Criteria judge: LLM-as-judge against a named rubric
//!
//! The judge works without ground truth, so it runs for every evaluation.
//! When the caller supplies no rubric, [`default_criteria`] is used.

use crate::{
    llm_client::{CompletionRequest, LLMClient},
    Criteria, CriteriaJudge, EvalError, JudgeRequest, Judgment, RawScore,
};
use async_trait::async_trait;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

pub const CRITERIA_METRIC: &str = "criteria";

const JUDGE_SYSTEM_PROMPT: &str = "You are an expert evaluator. Respond only with valid JSON.";

/// Default rubric for social media posts
pub fn default_criteria() -> Criteria {
    [
        (
            "helpfulness",
            "Is the output helpful and relevant to the image description?",
        ),
        (
            "conciseness",
            "Is the output concise and appropriate for social media?",
        ),
        (
            "engagement",
            "Is the output engaging and likely to generate user interaction?",
        ),
        (
            "appropriateness",
            "Is the output appropriate for the specified platform and tone?",
        ),
    ]
    .into_iter()
    .map(|(name, description)| (name.to_string(), description.to_string()))
    .collect()
}

/// Criteria judge backed by a chat-completion model
pub struct LlmCriteriaJudge {
    llm_client: Arc<dyn LLMClient>,
    prompt_template: String,
}

impl LlmCriteriaJudge {
    pub fn new(llm_client: Arc<dyn LLMClient>) -> Self {
        Self {
            llm_client,
            prompt_template: Self::default_prompt_template(),
        }
    }

    /// Override the judge prompt. Placeholders: `{criteria}`, `{input}`,
    /// `{reference}`, `{prediction}`.
    pub fn with_prompt_template(mut self, template: String) -> Self {
        self.prompt_template = template;
        self
    }

    fn default_prompt_template() -> String {
        r#"You are assessing a submitted social media post against a set of criteria.

[BEGIN DATA]
[Input]: {input}
{reference}[Submission]: {prediction}
[Criteria]:
{criteria}
[END DATA]

Does the submission meet every criterion? Reason step by step about each one
before deciding.

Respond in JSON format:
{
  "reasoning": "<step by step explanation>",
  "verdict": "PASS" | "FAIL",
  "score": <float 0-1, how well the submission meets the criteria overall>
}"#
        .to_string()
    }

    fn build_prompt(&self, request: &JudgeRequest<'_>) -> String {
        let criteria = request
            .criteria
            .iter()
            .map(|(name, description)| format!("- {}: {}", name, description))
            .collect::<Vec<_>>()
            .join("\n");

        let reference = request
            .reference
            .map(|r| format!("[Reference]: {}\n", r))
            .unwrap_or_default();

        // Single pass: text substituted in is never scanned for placeholders
        placeholder()
            .replace_all(&self.prompt_template, |caps: &Captures<'_>| match &caps[1] {
                "criteria" => criteria.clone(),
                "input" => request.input.unwrap_or("").to_string(),
                "reference" => reference.clone(),
                _ => request.prediction.to_string(),
            })
            .into_owned()
    }
}

fn placeholder() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{(criteria|input|reference|prediction)\}").expect("Invalid regex pattern")
    })
}

/// Pull the raw score out of a judge response.
///
/// Prefers `score` (number, string or nested `{score}`), falling back to the
/// verdict token.
fn extract_score(json: &Value) -> RawScore {
    match json.get("score") {
        Some(value) if !value.is_null() => RawScore::from_json(value),
        _ => json
            .get("verdict")
            .map(RawScore::from_json)
            .unwrap_or(RawScore::Unknown),
    }
}

fn extract_reasoning(json: &Value) -> Option<String> {
    json.get("reasoning")
        .or_else(|| json.get("verdict"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

#[async_trait]
impl CriteriaJudge for LlmCriteriaJudge {
    async fn judge(&self, request: &JudgeRequest<'_>) -> Result<Judgment, EvalError> {
        let prompt = self.build_prompt(request);
        let response = self
            .llm_client
            .complete(
                CompletionRequest::new(prompt)
                    .with_system(JUDGE_SYSTEM_PROMPT)
                    .with_temperature(0.0)
                    .json(),
            )
            .await
            .map_err(|e| EvalError::LLMClientError(e.to_string()))?;

        let json = response.as_json().map_err(|e| {
            EvalError::InvalidResponse(format!("Failed to parse judgment JSON: {}", e))
        })?;

        Ok(Judgment {
            score: extract_score(&json),
            reasoning: extract_reasoning(&json),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{LLMError, LLMResponse, TokenUsage};
    use serde_json::json;
    use std::sync::Mutex;

    struct MockLLMClient {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl MockLLMClient {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMClient for MockLLMClient {
        async fn complete(&self, request: CompletionRequest) -> Result<LLMResponse, LLMError> {
            self.prompts.lock().unwrap().push(request.user);
            Ok(LLMResponse {
                content: self.reply.clone(),
                usage: TokenUsage::default(),
                model: "mock-model".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "mock-model"
        }
    }

    #[test]
    fn test_default_rubric() {
        let criteria = default_criteria();
        let names: Vec<_> = criteria.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec!["appropriateness", "conciseness", "engagement", "helpfulness"]
        );
    }

    #[test]
    fn test_extract_score_shapes() {
        assert_eq!(extract_score(&json!({"score": 0.8})), RawScore::Number(0.8));
        assert_eq!(
            extract_score(&json!({"score": {"score": 1}})),
            RawScore::Number(1.0)
        );
        assert_eq!(
            extract_score(&json!({"score": null, "verdict": "FAIL"})),
            RawScore::Token("FAIL".to_string())
        );
        assert_eq!(extract_score(&json!({})), RawScore::Unknown);
    }

    #[tokio::test]
    async fn test_judge_builds_prompt_and_parses() {
        let client = Arc::new(MockLLMClient::new(
            r#"{"reasoning": "Relevant and upbeat.", "verdict": "PASS", "score": 0.9}"#,
        ));
        let judge = LlmCriteriaJudge::new(client.clone());
        let criteria = default_criteria();

        let judgment = judge
            .judge(&JudgeRequest {
                prediction: "Golden hour magic!",
                input: Some("A sunset over mountains"),
                reference: Some("A sunset post"),
                criteria: &criteria,
            })
            .await
            .unwrap();

        assert_eq!(judgment.score, RawScore::Number(0.9));
        assert_eq!(judgment.reasoning.as_deref(), Some("Relevant and upbeat."));

        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[0].contains("[Submission]: Golden hour magic!"));
        assert!(prompts[0].contains("[Reference]: A sunset post"));
        assert!(prompts[0].contains("- engagement: Is the output engaging"));
    }

    #[tokio::test]
    async fn test_placeholders_in_caller_text_stay_literal() {
        let client = Arc::new(MockLLMClient::new(r#"{"verdict": "PASS"}"#));
        let judge = LlmCriteriaJudge::new(client.clone());
        let mut criteria = Criteria::new();
        criteria.insert("tone".to_string(), "Matches {reference} voice".to_string());

        judge
            .judge(&JudgeRequest {
                prediction: "SECRET_PRED",
                input: Some("Describe {prediction} here"),
                reference: None,
                criteria: &criteria,
            })
            .await
            .unwrap();

        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[0].contains("[Input]: Describe {prediction} here"));
        assert!(!prompts[0].contains("Describe SECRET_PRED"));
        assert!(prompts[0].contains("- tone: Matches {reference} voice"));
        assert!(prompts[0].contains("[Submission]: SECRET_PRED"));
    }

    #[tokio::test]
    async fn test_judge_rejects_non_json() {
        let client = Arc::new(MockLLMClient::new("Looks good to me"));
        let judge = LlmCriteriaJudge::new(client);
        let criteria = default_criteria();

        let err = judge
            .judge(&JudgeRequest {
                prediction: "x",
                input: None,
                reference: None,
                criteria: &criteria,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::InvalidResponse(_)));
    }
}
