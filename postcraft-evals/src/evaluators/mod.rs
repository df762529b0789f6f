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

//! Built-in scorers backing the criteria and similarity metrics

pub mod criteria;
pub mod embedding_distance;
pub mod string_distance;

pub use criteria::{default_criteria, LlmCriteriaJudge, CRITERIA_METRIC};
pub use embedding_distance::{EmbeddingDistance, EMBEDDING_DISTANCE_METRIC};
pub use string_distance::{StringDistance, StringDistanceKind, STRING_DISTANCE_METRIC};
