use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use uuid::Uuid;

use crate::dao::{
    models::{MetricEntity, PlayerLibraryEntity, TeamDocumentEntity, TeamRecordEntity},
    storage::StorageResult,
    team_store::TeamStore,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, CouchLibraryDocument, CouchMetricDocument, CouchRecordDocument,
        CouchSettingDocument, CouchSheetDocument, END_SUFFIX, LIBRARY_DOC_ID, METRIC_PREFIX,
        RECORD_PREFIX, record_doc_id, setting_doc_id, sheet_doc_id,
    },
};

/// [`TeamStore`] backend persisting every collection as CouchDB documents
/// with prefixed IDs.
#[derive(Clone)]
pub struct CouchTeamStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchTeamStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = format!("{}/{}", self.base_url, self.database);
        let mut builder = self.client.get(&url);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
        }

        let response = builder
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let mut builder = self.client.put(&url);
                if let Some((ref user, ref pass)) = self.auth {
                    builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
                }
                let create =
                    builder
                        .send()
                        .await
                        .map_err(|source| CouchDaoError::DatabaseCreate {
                            database: database.clone(),
                            source,
                        })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut documents = Vec::new();
        for row in payload.rows {
            if let Some(doc) = row.doc {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    async fn upsert<T>(&self, doc_id: &str, build: impl FnOnce(Option<String>) -> T) -> CouchResult<()>
    where
        T: Serialize,
    {
        let rev = self
            .get_document::<serde_json::Value>(doc_id)
            .await?
            .and_then(|existing| {
                existing
                    .get("_rev")
                    .and_then(|rev| rev.as_str())
                    .map(str::to_string)
            });
        let doc = build(rev);
        self.put_document(doc_id, &doc).await
    }
}

impl TeamStore for CouchTeamStore {
    fn list_records(&self) -> BoxFuture<'static, StorageResult<Vec<TeamRecordEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchRecordDocument>(RECORD_PREFIX)
                .await?;
            Ok(docs.into_iter().map(|doc| doc.record).collect())
        })
    }

    fn find_record(
        &self,
        team_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<TeamRecordEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = record_doc_id(&team_id);
            let maybe_doc = store.get_document::<CouchRecordDocument>(&doc_id).await?;
            Ok(maybe_doc.map(|doc| doc.record))
        })
    }

    fn append_record(&self, record: TeamRecordEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = CouchRecordDocument::from_entity(record);
            store.put_document(&doc.id, &doc).await.map_err(Into::into)
        })
    }

    fn update_record(&self, record: TeamRecordEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = record_doc_id(&record.team_id);
            store
                .upsert(&doc_id, |rev| {
                    let mut doc = CouchRecordDocument::from_entity(record);
                    doc.rev = rev;
                    doc
                })
                .await
                .map_err(Into::into)
        })
    }

    fn load_document(
        &self,
        sheet_name: String,
    ) -> BoxFuture<'static, StorageResult<Option<TeamDocumentEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = sheet_doc_id(&sheet_name);
            let maybe_doc = store.get_document::<CouchSheetDocument>(&doc_id).await?;
            Ok(maybe_doc.map(|doc| doc.document))
        })
    }

    fn store_document(
        &self,
        sheet_name: String,
        document: TeamDocumentEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = sheet_doc_id(&sheet_name);
            store
                .upsert(&doc_id, |rev| {
                    let mut doc = CouchSheetDocument::from_entity(&sheet_name, document);
                    doc.rev = rev;
                    doc
                })
                .await
                .map_err(Into::into)
        })
    }

    fn load_library(&self) -> BoxFuture<'static, StorageResult<Option<PlayerLibraryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let maybe_doc = store
                .get_document::<CouchLibraryDocument>(LIBRARY_DOC_ID)
                .await?;
            Ok(maybe_doc.map(|doc| doc.library))
        })
    }

    fn store_library(
        &self,
        library: PlayerLibraryEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert(LIBRARY_DOC_ID, |rev| {
                    let mut doc = CouchLibraryDocument::from_entity(library);
                    doc.rev = rev;
                    doc
                })
                .await
                .map_err(Into::into)
        })
    }

    fn append_metric(&self, metric: MetricEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = CouchMetricDocument::from_entity(metric, Uuid::new_v4());
            store.put_document(&doc.id, &doc).await.map_err(Into::into)
        })
    }

    fn list_metrics(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MetricEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchMetricDocument>(METRIC_PREFIX)
                .await?;
            // IDs embed RFC 3339 timestamps, so range order is chronological;
            // newest-first means reading from the tail.
            Ok(docs
                .into_iter()
                .rev()
                .take(limit)
                .map(|doc| doc.metric)
                .collect())
        })
    }

    fn load_setting(&self, name: String) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = setting_doc_id(&name);
            let maybe_doc = store.get_document::<CouchSettingDocument>(&doc_id).await?;
            Ok(maybe_doc.map(|doc| doc.value))
        })
    }

    fn store_setting(
        &self,
        name: String,
        value: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = setting_doc_id(&name);
            store
                .upsert(&doc_id, |rev| {
                    let mut doc = CouchSettingDocument::from_parts(&name, value);
                    doc.rev = rev;
                    doc
                })
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = format!("{}/{}", store.base_url, store.database);
            let mut builder = store.client.get(&url);
            if let Some((ref user, ref pass)) = store.auth {
                builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
            }

            let response = builder
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
