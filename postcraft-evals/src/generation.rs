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

//! Social media post generation from image descriptions

use crate::llm_client::{CompletionRequest, LLMClient};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

pub const DEFAULT_PLATFORM: &str = "instagram";
pub const DEFAULT_TONE: &str = "friendly";

/// Structured social media post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialMediaPost {
    /// Main caption text (2-3 sentences)
    pub caption: String,
    #[serde(default)]
    pub call_to_action: Option<String>,
    /// Relevant hashtags (5-10 items)
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRequest {
    pub image_description: String,
    pub platform: String,
    pub tone: String,
}

impl PostRequest {
    /// Build a request, falling back to the default platform and tone
    pub fn new(image_description: impl Into<String>, platform: Option<&str>, tone: Option<&str>) -> Self {
        Self {
            image_description: image_description.into(),
            platform: platform.unwrap_or(DEFAULT_PLATFORM).to_string(),
            tone: tone.unwrap_or(DEFAULT_TONE).to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("LLM provider error: {0}")]
    Provider(String),

    #[error("Failed to parse generated post: {0}")]
    Parse(String),

    #[error("Generation produced no caption")]
    Empty,
}

/// Capability producing a post for an image description
#[async_trait]
pub trait PostGenerator: Send + Sync {
    async fn generate(&self, request: &PostRequest) -> Result<SocialMediaPost, GenerationError>;
}

const SYSTEM_PROMPT: &str = r#"You are an expert social media content creator.
Generate engaging, structured social media posts based on image descriptions.

Your task is to create:
1. A compelling caption (2-3 sentences)
2. An optional call to action
3. Relevant hashtags (5-10 items) as an array

Consider the platform and tone when creating the content.
The output should be formatted as a JSON object matching this schema:
{
  "caption": "<string, main caption text (2-3 sentences)>",
  "call_to_action": "<string or null, optional call to action>",
  "tags": ["<string>", "..."]
}
Return only the JSON object."#;

/// Post generator backed by a chat-completion model
pub struct LlmPostGenerator {
    llm_client: Arc<dyn LLMClient>,
    temperature: f32,
}

impl LlmPostGenerator {
    pub fn new(llm_client: Arc<dyn LLMClient>) -> Self {
        Self {
            llm_client,
            temperature: 0.7,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn build_prompt(request: &PostRequest) -> String {
        format!(
            "Create a social media post for the following image description:\n\n\
             Image Description: {}\n\
             Platform: {}\n\
             Tone: {}\n\n\
             Generate a structured post that is engaging and appropriate for the specified platform and tone.",
            request.image_description, request.platform, request.tone
        )
    }
}

#[async_trait]
impl PostGenerator for LlmPostGenerator {
    async fn generate(&self, request: &PostRequest) -> Result<SocialMediaPost, GenerationError> {
        let response = self
            .llm_client
            .complete(
                CompletionRequest::new(Self::build_prompt(request))
                    .with_system(SYSTEM_PROMPT)
                    .with_temperature(self.temperature)
                    .json(),
            )
            .await
            .map_err(|e| GenerationError::Provider(e.to_string()))?;

        let post = parse_post(&response.content)?;
        tracing::debug!(
            platform = %request.platform,
            tags = post.tags.as_ref().map(|t| t.len()).unwrap_or(0),
            "generated post"
        );
        Ok(post)
    }
}

fn fenced_json() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").expect("Invalid regex pattern")
    })
}

/// Parse model output into a post, tolerating a Markdown code fence
pub fn parse_post(content: &str) -> Result<SocialMediaPost, GenerationError> {
    let json = fenced_json()
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or_else(|| content.trim());

    let post: SocialMediaPost =
        serde_json::from_str(json).map_err(|e| GenerationError::Parse(e.to_string()))?;

    if post.caption.trim().is_empty() {
        return Err(GenerationError::Empty);
    }
    Ok(post)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{LLMError, LLMResponse, TokenUsage};

    struct MockLLM {
        reply: Result<String, String>,
    }

    #[async_trait]
    impl LLMClient for MockLLM {
        async fn complete(&self, request: CompletionRequest) -> Result<LLMResponse, LLMError> {
            assert!(request.user.contains("Platform: linkedin"));
            assert!(request.system.is_some());
            match &self.reply {
                Ok(content) => Ok(LLMResponse {
                    content: content.clone(),
                    usage: TokenUsage::default(),
                    model: "mock".to_string(),
                }),
                Err(msg) => Err(LLMError::ApiError(msg.clone())),
            }
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    #[test]
    fn test_request_defaults() {
        let request = PostRequest::new("A cozy coffee shop", None, None);
        assert_eq!(request.platform, "instagram");
        assert_eq!(request.tone, "friendly");
    }

    #[test]
    fn test_parse_plain_json() {
        let post = parse_post(
            r##"{"caption": "Team work makes the dream work.", "tags": ["#teamwork"]}"##,
        )
        .unwrap();
        assert_eq!(post.caption, "Team work makes the dream work.");
        assert_eq!(post.call_to_action, None);
        assert_eq!(post.tags, Some(vec!["#teamwork".to_string()]));
    }

    #[test]
    fn test_parse_fenced_json() {
        let content = "Here you go:\n```json\n{\"caption\": \"Sunsets!\", \"call_to_action\": \"Share yours\"}\n```";
        let post = parse_post(content).unwrap();
        assert_eq!(post.caption, "Sunsets!");
        assert_eq!(post.call_to_action.as_deref(), Some("Share yours"));
    }

    #[test]
    fn test_parse_rejects_malformed_and_empty() {
        assert!(matches!(
            parse_post("A lovely caption without structure"),
            Err(GenerationError::Parse(_))
        ));
        assert!(matches!(
            parse_post(r#"{"caption": "   "}"#),
            Err(GenerationError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_generate_uses_platform_and_tone() {
        let generator = LlmPostGenerator::new(Arc::new(MockLLM {
            reply: Ok(r#"{"caption": "Meetings that matter."}"#.to_string()),
        }));
        let post = generator
            .generate(&PostRequest::new("A team meeting", Some("linkedin"), Some("professional")))
            .await
            .unwrap();
        assert_eq!(post.caption, "Meetings that matter.");
    }

    #[tokio::test]
    async fn test_generate_provider_error() {
        let generator = LlmPostGenerator::new(Arc::new(MockLLM {
            reply: Err("quota exceeded".to_string()),
        }));
        let err = generator
            .generate(&PostRequest::new("A team meeting", Some("linkedin"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Provider(_)));
    }
}
