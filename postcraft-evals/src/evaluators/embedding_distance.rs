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

//! Semantic similarity between prediction and reference via embeddings

use crate::llm_client::EmbeddingClient;
use crate::{EvalError, RawScore, SimilarityScorer};
use async_trait::async_trait;
use std::sync::Arc;

pub const EMBEDDING_DISTANCE_METRIC: &str = "embedding_distance";

/// Cosine similarity of the prediction and reference embeddings.
///
/// Anti-correlated embeddings are reported as 0.0 so every score this
/// scorer emits is a similarity in [0, 1].
pub struct EmbeddingDistance {
    embedding_client: Arc<dyn EmbeddingClient>,
}

impl EmbeddingDistance {
    pub fn new(embedding_client: Arc<dyn EmbeddingClient>) -> Self {
        Self { embedding_client }
    }
}

#[async_trait]
impl SimilarityScorer for EmbeddingDistance {
    fn metric_name(&self) -> &str {
        EMBEDDING_DISTANCE_METRIC
    }

    async fn score(&self, prediction: &str, reference: &str) -> Result<RawScore, EvalError> {
        let embeddings = self
            .embedding_client
            .embed_batch(&[prediction.to_string(), reference.to_string()])
            .await
            .map_err(|e| EvalError::EmbeddingError(e.to_string()))?;

        match embeddings.as_slice() {
            [a, b] => Ok(RawScore::Number(cosine_similarity(a, b).clamp(0.0, 1.0))),
            other => Err(EvalError::EmbeddingError(format!(
                "Expected 2 embeddings, got {}",
                other.len()
            ))),
        }
    }
}

fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a < 1e-10 || norm_b < 1e-10 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::EmbedError;
    use std::collections::HashMap;

    struct MockEmbeddingClient {
        embeddings: HashMap<String, Vec<f64>>,
    }

    impl MockEmbeddingClient {
        fn new() -> Self {
            let mut embeddings = HashMap::new();
            embeddings.insert("sunset".to_string(), vec![1.0, 0.0]);
            embeddings.insert("dusk".to_string(), vec![0.9, 0.1]);
            embeddings.insert("invoice".to_string(), vec![0.0, 1.0]);
            embeddings.insert("spreadsheet".to_string(), vec![-0.05, 1.0]);
            Self { embeddings }
        }
    }

    #[async_trait]
    impl EmbeddingClient for MockEmbeddingClient {
        async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbedError> {
            self.embeddings
                .get(text)
                .cloned()
                .ok_or_else(|| EmbedError::ApiError("Text not found in mock".to_string()))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, EmbedError> {
            let mut results = Vec::new();
            for text in texts {
                results.push(self.embed(text).await?);
            }
            Ok(results)
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-12);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_semantic_similarity() {
        let scorer = EmbeddingDistance::new(Arc::new(MockEmbeddingClient::new()));

        match scorer.score("sunset", "dusk").await.unwrap() {
            RawScore::Number(score) => assert!(score > 0.9),
            other => panic!("unexpected score {:?}", other),
        }
        match scorer.score("sunset", "invoice").await.unwrap() {
            RawScore::Number(score) => assert!(score < 0.1),
            other => panic!("unexpected score {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_anti_correlated_never_beats_orthogonal() {
        let scorer = EmbeddingDistance::new(Arc::new(MockEmbeddingClient::new()));

        let opposed = scorer.score("sunset", "spreadsheet").await.unwrap();
        let orthogonal = scorer.score("sunset", "invoice").await.unwrap();
        assert_eq!(opposed, RawScore::Number(0.0));

        let opposed = opposed.normalize_similarity();
        let orthogonal = orthogonal.normalize_similarity();
        assert_eq!(opposed, 0.0);
        assert!(opposed <= orthogonal);
    }

    #[tokio::test]
    async fn test_embedding_failure_surfaces() {
        let scorer = EmbeddingDistance::new(Arc::new(MockEmbeddingClient::new()));
        let err = scorer.score("sunset", "unknown").await.unwrap_err();
        assert!(matches!(err, EvalError::EmbeddingError(_)));
    }
}
