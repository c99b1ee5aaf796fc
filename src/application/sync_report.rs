//! Per-kind and per-run sync reports

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::errors::{SyncError, SyncErrorKind};
use crate::domain::EntityKind;

/// Lifecycle of one entity kind sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncPhase {
    NotStarted,
    DiscoveringPageCount,
    Dispatching,
    Draining,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncStatus {
    Success,
    PartialFailure,
    Failed,
}

/// A page that committed nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFailure {
    pub page: u32,
    pub error_kind: SyncErrorKind,
    pub message: String,
}

/// An item skipped because it could not be mapped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub page: u32,
    pub item_index: usize,
    pub message: String,
}

/// Fatal error that stopped a kind before or during dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FatalFailure {
    pub error_kind: SyncErrorKind,
    pub message: String,
}

impl From<&SyncError> for FatalFailure {
    fn from(error: &SyncError) -> Self {
        Self {
            error_kind: error.kind(),
            message: error.to_string(),
        }
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub kind: EntityKind,
    pub phase: SyncPhase,
    pub page_count: u32,
    pub pages_attempted: u32,
    pub pages_committed: u32,
    pub records_committed: usize,
    pub custom_records_committed: usize,
    pub items_skipped: usize,
    pub unknown_custom_fields: usize,
    pub page_failures: Vec<PageFailure>,
    pub item_failures: Vec<ItemFailure>,
    pub fatal: Option<FatalFailure>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl SyncReport {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            phase: SyncPhase::NotStarted,
            page_count: 0,
            pages_attempted: 0,
            pages_committed: 0,
            records_committed: 0,
            custom_records_committed: 0,
            items_skipped: 0,
            unknown_custom_fields: 0,
            page_failures: Vec::new(),
            item_failures: Vec::new(),
            fatal: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Report of a kind that a fatal error stopped before any page was dispatched
    pub fn aborted(kind: EntityKind, error: &SyncError, elapsed: Duration) -> Self {
        Self {
            phase: SyncPhase::Failed,
            fatal: Some(error.into()),
            elapsed,
            ..Self::new(kind)
        }
    }

    pub fn status(&self) -> SyncStatus {
        if self.phase == SyncPhase::Failed || (self.page_count > 0 && self.pages_committed == 0) {
            SyncStatus::Failed
        } else if self.page_failures.is_empty() && self.item_failures.is_empty() {
            SyncStatus::Success
        } else {
            SyncStatus::PartialFailure
        }
    }
}

/// Reports of every kind in one run, in sync order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub reports: Vec<SyncReport>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl RunReport {
    pub fn get(&self, kind: EntityKind) -> Option<&SyncReport> {
        self.reports.iter().find(|report| report.kind == kind)
    }

    pub fn has_failures(&self) -> bool {
        self.reports
            .iter()
            .any(|report| report.status() == SyncStatus::Failed)
    }

    /// Process exit code: 1 when any kind failed outright, otherwise 0
    pub fn exit_code(&self) -> u8 {
        u8::from(self.has_failures())
    }
}
