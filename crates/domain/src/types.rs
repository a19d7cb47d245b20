//! Domain data types for segments, memberships and audit history

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::SegmentifyError;

/// A named cohort of users.
///
/// `slug` is the unique, human-readable identity; `percent` is the rollout
/// percentage applied once at creation time (0 means no rollout).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub slug: String,
    pub percent: i16,
}

/// A single addition requested by a membership update.
///
/// `expire_at = None` means the membership never expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipChange {
    pub slug: String,
    pub expire_at: Option<DateTime<Utc>>,
}

/// Audit operation recorded for a membership transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOperation {
    Add,
    Remove,
}

impl AuditOperation {
    /// Stable wire representation, also stored in `users_segments_history`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditOperation {
    type Err = SegmentifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "remove" => Ok(Self::Remove),
            other => Err(SegmentifyError::Internal(format!(
                "unknown audit operation: {other}"
            ))),
        }
    }
}

/// One append-only history row for a user's membership transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub user_id: i64,
    pub segment_slug: String,
    pub operation: AuditOperation,
    pub created_at: DateTime<Utc>,
}

/// A calendar month used to scope history reports.
///
/// Parsed from the strict `YYYY-MM` form; anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl FromStr for Period {
    type Err = SegmentifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SegmentifyError::InvalidRequest(format!("invalid period: {s}"));

        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }

        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }

        Ok(Self { year, month })
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
