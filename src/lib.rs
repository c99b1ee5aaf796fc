//! IIQ Sync - full refresh of IncidentIQ resources into a relational database
//!
//! Every entity kind is paged concurrently from the IncidentIQ API, mapped onto a
//! fixed table plus an optional tenant-defined custom field table, and committed
//! page by page.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
pub(crate) mod test_utils;
