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

//! Input validation for API requests

use crate::api::ApiError;
use postcraft_evals::TestCase;

/// Image description length bounds, in characters
pub const MIN_IMAGE_DESCRIPTION_CHARS: usize = 10;
pub const MAX_IMAGE_DESCRIPTION_CHARS: usize = 1000;

/// Maximum test cases per batch request
pub const MAX_TEST_CASES_PER_BATCH: usize = 500;

pub fn validate_image_description(description: &str) -> Result<(), ApiError> {
    let chars = description.chars().count();
    if chars < MIN_IMAGE_DESCRIPTION_CHARS {
        return Err(ApiError::Validation(format!(
            "image_description must be at least {} characters, got {}",
            MIN_IMAGE_DESCRIPTION_CHARS, chars
        )));
    }
    if chars > MAX_IMAGE_DESCRIPTION_CHARS {
        return Err(ApiError::Validation(format!(
            "image_description must be at most {} characters, got {}",
            MAX_IMAGE_DESCRIPTION_CHARS, chars
        )));
    }
    Ok(())
}

pub fn validate_prediction(prediction: &str) -> Result<(), ApiError> {
    if prediction.trim().is_empty() {
        return Err(ApiError::Validation(
            "prediction must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_threshold(threshold: Option<f64>) -> Result<(), ApiError> {
    match threshold {
        Some(t) if !(0.0..=1.0).contains(&t) => Err(ApiError::Validation(format!(
            "threshold must be between 0.0 and 1.0, got {}",
            t
        ))),
        _ => Ok(()),
    }
}

/// Validate batch size and every case's threshold override
pub fn validate_test_cases(cases: &[TestCase]) -> Result<(), ApiError> {
    if cases.is_empty() {
        return Err(ApiError::Validation(
            "test_cases must contain at least one test case".to_string(),
        ));
    }

    if cases.len() > MAX_TEST_CASES_PER_BATCH {
        return Err(ApiError::Validation(format!(
            "Batch size exceeds limit: {} test cases (maximum allowed: {})",
            cases.len(),
            MAX_TEST_CASES_PER_BATCH
        )));
    }

    for (index, case) in cases.iter().enumerate() {
        if let Some(t) = case.threshold.filter(|t| !(0.0..=1.0).contains(t)) {
            return Err(ApiError::Validation(format!(
                "test_cases[{}].threshold must be between 0.0 and 1.0, got {}",
                index, t
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_description_bounds() {
        assert!(validate_image_description("too short").is_err());
        assert!(validate_image_description("A sunset over mountains").is_ok());
        assert!(validate_image_description(&"x".repeat(1000)).is_ok());
        assert!(validate_image_description(&"x".repeat(1001)).is_err());
        // Counted in characters, not bytes
        assert!(validate_image_description("ééééééééé").is_err());
    }

    #[test]
    fn test_threshold_range() {
        assert!(validate_threshold(None).is_ok());
        assert!(validate_threshold(Some(0.0)).is_ok());
        assert!(validate_threshold(Some(1.0)).is_ok());
        assert!(validate_threshold(Some(-0.1)).is_err());
        assert!(validate_threshold(Some(1.1)).is_err());
    }

    #[test]
    fn test_prediction_not_blank() {
        assert!(validate_prediction("Great shot!").is_ok());
        assert!(validate_prediction("  ").is_err());
    }

    #[test]
    fn test_test_cases() {
        assert!(validate_test_cases(&[]).is_err());
        assert!(validate_test_cases(&[TestCase::new("A cozy coffee shop")]).is_ok());

        let err = validate_test_cases(&[
            TestCase::new("ok"),
            TestCase::new("bad").with_threshold(2.0),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("test_cases[1]"));
    }
}
