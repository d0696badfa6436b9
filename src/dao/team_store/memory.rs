use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use futures::future::BoxFuture;
use indexmap::IndexMap;

use crate::dao::{
    models::{MetricEntity, PlayerLibraryEntity, TeamDocumentEntity, TeamRecordEntity},
    storage::StorageResult,
    team_store::TeamStore,
};

/// In-memory [`TeamStore`] backend.
///
/// Keeps roster records in insertion order like the spreadsheet the data model
/// descends from. Used by unit tests and by local development runs without a
/// CouchDB instance.
#[derive(Clone, Default)]
pub struct MemoryTeamStore {
    records: Arc<Mutex<IndexMap<String, TeamRecordEntity>>>,
    documents: Arc<DashMap<String, TeamDocumentEntity>>,
    library: Arc<Mutex<Option<PlayerLibraryEntity>>>,
    metrics: Arc<Mutex<Vec<MetricEntity>>>,
    settings: Arc<DashMap<String, String>>,
}

impl MemoryTeamStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TeamStore for MemoryTeamStore {
    fn list_records(&self) -> BoxFuture<'static, StorageResult<Vec<TeamRecordEntity>>> {
        let records = self.records.clone();
        Box::pin(async move {
            let guard = records.lock().expect("records lock poisoned");
            Ok(guard.values().cloned().collect())
        })
    }

    fn find_record(
        &self,
        team_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<TeamRecordEntity>>> {
        let records = self.records.clone();
        Box::pin(async move {
            let guard = records.lock().expect("records lock poisoned");
            Ok(guard.get(&team_id).cloned())
        })
    }

    fn append_record(&self, record: TeamRecordEntity) -> BoxFuture<'static, StorageResult<()>> {
        let records = self.records.clone();
        Box::pin(async move {
            let mut guard = records.lock().expect("records lock poisoned");
            guard.insert(record.team_id.clone(), record);
            Ok(())
        })
    }

    fn update_record(&self, record: TeamRecordEntity) -> BoxFuture<'static, StorageResult<()>> {
        let records = self.records.clone();
        Box::pin(async move {
            let mut guard = records.lock().expect("records lock poisoned");
            guard.insert(record.team_id.clone(), record);
            Ok(())
        })
    }

    fn load_document(
        &self,
        sheet_name: String,
    ) -> BoxFuture<'static, StorageResult<Option<TeamDocumentEntity>>> {
        let documents = self.documents.clone();
        Box::pin(async move { Ok(documents.get(&sheet_name).map(|doc| doc.clone())) })
    }

    fn store_document(
        &self,
        sheet_name: String,
        document: TeamDocumentEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let documents = self.documents.clone();
        Box::pin(async move {
            documents.insert(sheet_name, document);
            Ok(())
        })
    }

    fn load_library(&self) -> BoxFuture<'static, StorageResult<Option<PlayerLibraryEntity>>> {
        let library = self.library.clone();
        Box::pin(async move { Ok(library.lock().expect("library lock poisoned").clone()) })
    }

    fn store_library(
        &self,
        value: PlayerLibraryEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let library = self.library.clone();
        Box::pin(async move {
            *library.lock().expect("library lock poisoned") = Some(value);
            Ok(())
        })
    }

    fn append_metric(&self, metric: MetricEntity) -> BoxFuture<'static, StorageResult<()>> {
        let metrics = self.metrics.clone();
        Box::pin(async move {
            metrics.lock().expect("metrics lock poisoned").push(metric);
            Ok(())
        })
    }

    fn list_metrics(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MetricEntity>>> {
        let metrics = self.metrics.clone();
        Box::pin(async move {
            let guard = metrics.lock().expect("metrics lock poisoned");
            Ok(guard.iter().rev().take(limit).cloned().collect())
        })
    }

    fn load_setting(&self, name: String) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let settings = self.settings.clone();
        Box::pin(async move { Ok(settings.get(&name).map(|value| value.clone())) })
    }

    fn store_setting(
        &self,
        name: String,
        value: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let settings = self.settings.clone();
        Box::pin(async move {
            settings.insert(name, value);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
