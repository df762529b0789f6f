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

//! Batch summary statistics

use crate::batch::CaseResult;
use crate::score::mean;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary of a batch evaluation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub total_tests: usize,
    pub passed: usize,
    pub failed: usize,

    /// Mean over all valid scores across all metrics and cases
    pub average_score: f64,

    /// Mean valid score per metric name
    pub metrics: BTreeMap<String, f64>,

    pub results: Vec<CaseResult>,
}

/// Folds case results into an [`EvaluationSummary`].
///
/// Cases must be added in input order; pools are built in that order so the
/// summary does not depend on completion order.
#[derive(Debug, Default)]
pub struct SummaryBuilder {
    cases: Vec<CaseResult>,
}

impl SummaryBuilder {
    pub fn build(self) -> EvaluationSummary {
        let mut pool = Vec::new();
        let mut per_metric: BTreeMap<String, Vec<f64>> = BTreeMap::new();

        for result in self.cases.iter().flat_map(|c| &c.evaluation_results) {
            if result.is_valid() {
                pool.push(result.score);
                per_metric
                    .entry(result.metric_name.clone())
                    .or_default()
                    .push(result.score);
            }
        }

        let total_tests = self.cases.len();
        let passed = self.cases.iter().filter(|c| c.passed).count();

        EvaluationSummary {
            total_tests,
            passed,
            failed: total_tests - passed,
            average_score: mean(pool),
            metrics: per_metric
                .into_iter()
                .map(|(name, scores)| (name, mean(scores)))
                .collect(),
            results: self.cases,
        }
    }
}

impl Extend<CaseResult> for SummaryBuilder {
    fn extend<T: IntoIterator<Item = CaseResult>>(&mut self, iter: T) {
        self.cases.extend(iter);
    }
}
