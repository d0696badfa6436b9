/// CouchDB-backed document store.
pub mod couchdb;
/// In-memory store used by tests and local development.
pub mod memory;

use crate::dao::models::{
    MetricEntity, PlayerLibraryEntity, TeamDocumentEntity, TeamRecordEntity,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the persistence layer for team records and documents.
///
/// The store is a plain KV surface: it has no conditional-write primitive, so
/// the compare-then-write staleness check lives in the service layer, not
/// here.
pub trait TeamStore: Send + Sync {
    /// All roster-index records in insertion order.
    fn list_records(&self) -> BoxFuture<'static, StorageResult<Vec<TeamRecordEntity>>>;
    /// Look up a single record by team ID.
    fn find_record(
        &self,
        team_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<TeamRecordEntity>>>;
    /// Append a freshly created record to the roster index.
    fn append_record(&self, record: TeamRecordEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Replace the record with the same team ID.
    fn update_record(&self, record: TeamRecordEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load the team document stored under `sheet_name`.
    fn load_document(
        &self,
        sheet_name: String,
    ) -> BoxFuture<'static, StorageResult<Option<TeamDocumentEntity>>>;
    /// Replace the team document stored under `sheet_name`.
    fn store_document(
        &self,
        sheet_name: String,
        document: TeamDocumentEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Load the cross-team player library.
    fn load_library(&self) -> BoxFuture<'static, StorageResult<Option<PlayerLibraryEntity>>>;
    /// Replace the cross-team player library.
    fn store_library(
        &self,
        library: PlayerLibraryEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Append one diagnostics row.
    fn append_metric(&self, metric: MetricEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Newest-first diagnostics rows, at most `limit`.
    fn list_metrics(&self, limit: usize)
    -> BoxFuture<'static, StorageResult<Vec<MetricEntity>>>;
    /// Read a named opaque setting (e.g. the fixture API auth token).
    fn load_setting(&self, name: String) -> BoxFuture<'static, StorageResult<Option<String>>>;
    /// Write a named opaque setting.
    fn store_setting(
        &self,
        name: String,
        value: String,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap connectivity probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish a lost connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
