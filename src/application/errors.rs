//! Sync error taxonomy
//!
//! Fatal errors stop one entity kind. Recoverable errors are caught at the page boundary and end up in the
//! [`SyncReport`](super::sync_report::SyncReport).

use serde::Serialize;
use thiserror::Error;

use crate::domain::{EntityKind, FetchError, MappingError, PersistenceError, SchemaError};

/// Why a custom field catalog could not be turned into a schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaDiscoveryFailure {
    #[error("{0} has no custom field catalog")]
    Unsupported(EntityKind),

    #[error("catalog request failed: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Invalid(#[from] SchemaError),
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("could not determine page count for {kind}: {source}")]
    Discovery {
        kind: EntityKind,
        #[source]
        source: FetchError,
    },

    #[error("custom field schema for {kind} is unusable: {source}")]
    SchemaDiscovery {
        kind: EntityKind,
        #[source]
        source: SchemaDiscoveryFailure,
    },

    #[error("page {page} could not be fetched: {source}")]
    PageFetch {
        page: u32,
        #[source]
        source: FetchError,
    },

    #[error("no item of page {page} could be mapped ({failed_items} failed): {source}")]
    Mapping {
        page: u32,
        failed_items: usize,
        #[source]
        source: MappingError,
    },

    #[error("page {page} could not be persisted: {source}")]
    Persistence {
        page: u32,
        #[source]
        source: PersistenceError,
    },

    #[error("destination tables for {kind} could not be prepared: {source}")]
    Preparation {
        kind: EntityKind,
        #[source]
        source: PersistenceError,
    },
}

/// Serializable tag of a [`SyncError`] used in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SyncErrorKind {
    Discovery,
    SchemaDiscovery,
    PageFetch,
    Mapping,
    Persistence,
    Preparation,
}

impl SyncError {
    pub const fn kind(&self) -> SyncErrorKind {
        match self {
            Self::Discovery { .. } => SyncErrorKind::Discovery,
            Self::SchemaDiscovery { .. } => SyncErrorKind::SchemaDiscovery,
            Self::PageFetch { .. } => SyncErrorKind::PageFetch,
            Self::Mapping { .. } => SyncErrorKind::Mapping,
            Self::Persistence { .. } => SyncErrorKind::Persistence,
            Self::Preparation { .. } => SyncErrorKind::Preparation,
        }
    }

    /// Recoverable errors affect a single page; the rest abort a kind
    pub const fn is_recoverable(&self) -> bool {
        self.kind().is_recoverable()
    }
}

impl SyncErrorKind {
    pub const fn is_recoverable(self) -> bool {
        matches!(self, Self::PageFetch | Self::Mapping | Self::Persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SyncError::Discovery { kind: EntityKind::Asset, source: FetchError::EmptyPage }, SyncErrorKind::Discovery, false)]
    #[case(
        SyncError::SchemaDiscovery { kind: EntityKind::User, source: SchemaError::EmptyCatalog.into() },
        SyncErrorKind::SchemaDiscovery,
        false
    )]
    #[case(SyncError::PageFetch { page: 3, source: FetchError::Status { status: 500 } }, SyncErrorKind::PageFetch, true)]
    #[case(
        SyncError::Mapping { page: 0, failed_items: 2, source: MappingError::NotAnObject },
        SyncErrorKind::Mapping,
        true
    )]
    #[case(
        SyncError::Persistence { page: 1, source: PersistenceError::Database("locked".into()) },
        SyncErrorKind::Persistence,
        true
    )]
    #[case(
        SyncError::Preparation { kind: EntityKind::Room, source: PersistenceError::Closed },
        SyncErrorKind::Preparation,
        false
    )]
    fn classifies_errors(#[case] error: SyncError, #[case] kind: SyncErrorKind, #[case] recoverable: bool) {
        assert_eq!(error.kind(), kind);
        assert_eq!(error.is_recoverable(), recoverable);
    }

    #[test]
    fn messages_name_the_page() {
        let error = SyncError::PageFetch {
            page: 1,
            source: FetchError::Status { status: 503 },
        };
        assert_eq!(error.to_string(), "page 1 could not be fetched: HTTP status 503");
    }
}
