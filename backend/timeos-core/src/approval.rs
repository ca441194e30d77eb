// src/approval.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::models::TimeEntryStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    /// Validates a review decision. Only `pending` may move, and only to a terminal state.
    pub fn transition_to(self, next: ApprovalStatus) -> Result<ApprovalStatus, TransitionError> {
        match (self, next) {
            (ApprovalStatus::Pending, ApprovalStatus::Approved)
            | (ApprovalStatus::Pending, ApprovalStatus::Rejected) => Ok(next),
            (from, to) => Err(TransitionError { from, to }),
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ApprovalStatus> for TimeEntryStatus {
    fn from(status: ApprovalStatus) -> Self {
        match status {
            ApprovalStatus::Pending => TimeEntryStatus::Pending,
            ApprovalStatus::Approved => TimeEntryStatus::Approved,
            ApprovalStatus::Rejected => TimeEntryStatus::Rejected,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Cannot move approval from '{from}' to '{to}'")]
pub struct TransitionError {
    pub from: ApprovalStatus,
    pub to: ApprovalStatus,
}
