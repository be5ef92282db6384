use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::IngestError;

/// Lifecycle of an identifier in the dedup ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    /// Reserved by a worker, rows not yet committed
    InProgress,
    Complete,
    /// Stopped early by a malformed record; loaded batches kept
    Partial,
    /// Undecodable payload or unusable header; nothing loaded
    Rejected,
}

impl LedgerStatus {
    pub const ALL: [LedgerStatus; 4] = [
        LedgerStatus::InProgress,
        LedgerStatus::Complete,
        LedgerStatus::Partial,
        LedgerStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::InProgress => "in_progress",
            LedgerStatus::Complete => "complete",
            LedgerStatus::Partial => "partial",
            LedgerStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerStatus {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(LedgerStatus::InProgress),
            "complete" => Ok(LedgerStatus::Complete),
            "partial" => Ok(LedgerStatus::Partial),
            "rejected" => Ok(LedgerStatus::Rejected),
            other => Err(IngestError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub url: String,
    pub status: LedgerStatus,
    pub rows_loaded: u64,
    pub recorded_at: String,
}

/// Count of ledger entries per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub in_progress: u64,
    pub complete: u64,
    pub partial: u64,
    pub rejected: u64,
    pub rows_loaded: u64,
}

impl LedgerSummary {
    pub fn add(&mut self, status: LedgerStatus, count: u64) {
        match status {
            LedgerStatus::InProgress => self.in_progress += count,
            LedgerStatus::Complete => self.complete += count,
            LedgerStatus::Partial => self.partial += count,
            LedgerStatus::Rejected => self.rejected += count,
        }
    }

    pub fn total(&self) -> u64 {
        self.in_progress + self.complete + self.partial + self.rejected
    }

    pub fn summary(&self) -> String {
        format!(
            "Ledger Summary:\n  Files: {}\n  Complete: {}\n  Partial: {}\n  Rejected: {}\n  In progress: {}\n  Rows loaded: {}",
            self.total(),
            self.complete,
            self.partial,
            self.rejected,
            self.in_progress,
            self.rows_loaded
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in LedgerStatus::ALL {
            assert_eq!(status.as_str().parse::<LedgerStatus>().unwrap(), status);
        }
        assert!("done".parse::<LedgerStatus>().is_err());
    }

    #[test]
    fn test_summary_totals() {
        let mut summary = LedgerSummary::default();
        summary.add(LedgerStatus::Complete, 3);
        summary.add(LedgerStatus::Partial, 1);
        assert_eq!(summary.total(), 4);
        assert!(summary.summary().contains("Complete: 3"));
    }
}
