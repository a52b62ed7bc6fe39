use serde::{Deserialize, Serialize};

use crate::constants::{REPORT_DETAILS_MAX_CHARS, REPORT_DETAILS_MIN_CHARS};
use crate::error::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    Inappropriate,
    Scam,
    Misleading,
    Counterfeit,
    Offensive,
    Other,
}

impl ReportReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inappropriate => "inappropriate",
            Self::Scam => "scam",
            Self::Misleading => "misleading",
            Self::Counterfeit => "counterfeit",
            Self::Offensive => "offensive",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for ReportReason {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inappropriate" => Ok(Self::Inappropriate),
            "scam" => Ok(Self::Scam),
            "misleading" => Ok(Self::Misleading),
            "counterfeit" => Ok(Self::Counterfeit),
            "offensive" => Ok(Self::Offensive),
            "other" => Ok(Self::Other),
            other => Err(DomainError::validation(
                "reason",
                format!("unknown report reason '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Dismissed => "dismissed",
        }
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            "dismissed" => Ok(Self::Dismissed),
            other => Err(DomainError::validation(
                "status",
                format!("unknown report status '{other}'"),
            )),
        }
    }
}

/// Final decision an admin records on a report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportOutcome {
    Resolved,
    Dismissed,
}

impl From<ReportOutcome> for ReportStatus {
    fn from(outcome: ReportOutcome) -> Self {
        match outcome {
            ReportOutcome::Resolved => ReportStatus::Resolved,
            ReportOutcome::Dismissed => ReportStatus::Dismissed,
        }
    }
}

/// Trimmed report details within bounds.
pub fn validate_report_details(details: &str) -> DomainResult<String> {
    let trimmed = details.trim();
    let len = trimmed.chars().count();
    if !(REPORT_DETAILS_MIN_CHARS..=REPORT_DETAILS_MAX_CHARS).contains(&len) {
        return Err(DomainError::validation(
            "details",
            format!(
                "must be between {REPORT_DETAILS_MIN_CHARS} and {REPORT_DETAILS_MAX_CHARS} characters"
            ),
        ));
    }
    Ok(trimmed.to_string())
}

/// Non-empty trimmed rejection reason.
pub fn validate_rejection_reason(reason: &str) -> DomainResult<String> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(
            "reason",
            "a rejection reason is required",
        ));
    }
    Ok(trimmed.to_string())
}
