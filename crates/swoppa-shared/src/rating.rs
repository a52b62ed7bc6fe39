use serde::{Deserialize, Serialize};

use crate::constants::{RATING_COMMENT_MIN_CHARS, RATING_SCORE_MAX, RATING_SCORE_MIN};
use crate::error::{DomainError, DomainResult};

/// The three per-transaction scores.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RatingScores {
    pub communication: u8,
    pub reliability: u8,
    pub overall: u8,
}

impl RatingScores {
    pub fn validate(&self) -> DomainResult<()> {
        for (field, score) in [
            ("communication_rating", self.communication),
            ("reliability_rating", self.reliability),
            ("overall_rating", self.overall),
        ] {
            if !(RATING_SCORE_MIN..=RATING_SCORE_MAX).contains(&score) {
                return Err(DomainError::validation(
                    field,
                    format!("must be between {RATING_SCORE_MIN} and {RATING_SCORE_MAX}"),
                ));
            }
        }
        Ok(())
    }
}

pub fn validate_rating_comment(comment: &str) -> DomainResult<String> {
    let trimmed = comment.trim();
    if trimmed.chars().count() < RATING_COMMENT_MIN_CHARS {
        return Err(DomainError::validation(
            "comment",
            format!("must be at least {RATING_COMMENT_MIN_CHARS} characters"),
        ));
    }
    Ok(trimmed.to_string())
}
