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

//! Lexical similarity between prediction and reference
//!
//! Deterministic, no network: Jaro-Winkler by default, normalized
//! Levenshtein as an alternative.

use crate::{EvalError, RawScore, SimilarityScorer};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const STRING_DISTANCE_METRIC: &str = "string_distance";

/// Edit-based similarity algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringDistanceKind {
    #[default]
    JaroWinkler,
    Levenshtein,
}

impl FromStr for StringDistanceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "jaro_winkler" => Ok(Self::JaroWinkler),
            "levenshtein" => Ok(Self::Levenshtein),
            other => Err(format!("Unknown string distance algorithm: {}", other)),
        }
    }
}

pub struct StringDistance {
    kind: StringDistanceKind,
}

impl StringDistance {
    pub fn new() -> Self {
        Self {
            kind: StringDistanceKind::default(),
        }
    }

    pub fn with_kind(mut self, kind: StringDistanceKind) -> Self {
        self.kind = kind;
        self
    }

    /// Similarity in `[0, 1]`, case-insensitive
    pub fn similarity(&self, prediction: &str, reference: &str) -> f64 {
        let prediction = prediction.trim().to_lowercase();
        let reference = reference.trim().to_lowercase();
        match self.kind {
            StringDistanceKind::JaroWinkler => strsim::jaro_winkler(&prediction, &reference),
            StringDistanceKind::Levenshtein => {
                strsim::normalized_levenshtein(&prediction, &reference)
            }
        }
    }
}

impl Default for StringDistance {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimilarityScorer for StringDistance {
    fn metric_name(&self) -> &str {
        STRING_DISTANCE_METRIC
    }

    async fn score(&self, prediction: &str, reference: &str) -> Result<RawScore, EvalError> {
        Ok(RawScore::Number(self.similarity(prediction, reference)))
    }
}
