//! Named response buckets and the cache-first / network-first strategies.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the runtime bucket backing network-first fallbacks. Not versioned:
/// it survives activations.
pub const RUNTIME_BUCKET: &str = "rostersync-runtime";

/// Versioned name of the static asset bucket for a build.
pub fn static_bucket_name(version: &str) -> String {
    format!("rostersync-static-{version}")
}

/// Request methods the cache engine distinguishes. Anything but GET is a
/// mutation and must never be served from cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMethod {
    /// Read.
    Get,
    /// Mutation.
    Post,
}

/// A request as seen by the cache engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Request method.
    pub method: FetchMethod,
    /// Absolute URL.
    pub url: String,
}

impl FetchRequest {
    /// A GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: FetchMethod::Get,
            url: url.into(),
        }
    }

    /// A POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: FetchMethod::Post,
            url: url.into(),
        }
    }
}

/// A stored response: enough of the original to replay it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    /// HTTP status code.
    pub status: u16,
    /// Content type header value.
    pub content_type: String,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl StoredResponse {
    /// A 200 response with the given type and body.
    pub fn ok(content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    /// Whether the response may be cached.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetch failures surfaced by the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The network is unreachable or the origin did not answer.
    #[error("network unreachable: {0}")]
    Network(String),
    /// Nothing cached for the request and the network failed.
    #[error("no cached response for {0}")]
    CacheMiss(String),
}

/// Network abstraction behind the engine, mockable in tests.
pub trait Fetcher: Send + Sync {
    /// Perform the request against the real network.
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'static, Result<StoredResponse, FetchError>>;
}

/// Strategy selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve from the static bucket, fall back to network.
    CacheFirst,
    /// Always try the network; runtime cache only as a read fallback.
    NetworkFirst,
}

/// Pick the strategy for a request: mutations, `api=true` URLs, and requests
/// to the backing API host always go network-first.
pub fn classify(request: &FetchRequest, api_host: Option<&str>) -> Strategy {
    if request.method != FetchMethod::Get {
        return Strategy::NetworkFirst;
    }
    if let Ok(url) = reqwest::Url::parse(&request.url) {
        let is_api_flagged = url
            .query_pairs()
            .any(|(key, value)| key == "api" && value == "true");
        let is_api_host = api_host.is_some_and(|host| url.host_str() == Some(host));
        if is_api_flagged || is_api_host {
            return Strategy::NetworkFirst;
        }
    }
    Strategy::CacheFirst
}

type Bucket = Arc<DashMap<String, StoredResponse>>;

/// The engine: named buckets plus the two strategies over a [`Fetcher`].
pub struct OfflineCache {
    buckets: DashMap<String, Bucket>,
    static_bucket: String,
    fetcher: Arc<dyn Fetcher>,
    api_host: Option<String>,
    offline_fallback: Option<String>,
}

impl OfflineCache {
    /// Create an engine for the given build version.
    pub fn new(
        version: &str,
        fetcher: Arc<dyn Fetcher>,
        api_host: Option<String>,
        offline_fallback: Option<String>,
    ) -> Self {
        let cache = Self {
            buckets: DashMap::new(),
            static_bucket: static_bucket_name(version),
            fetcher,
            api_host,
            offline_fallback,
        };
        cache.bucket(&cache.static_bucket.clone());
        cache.bucket(RUNTIME_BUCKET);
        cache
    }

    /// Name of the current static bucket.
    pub fn static_bucket(&self) -> &str {
        &self.static_bucket
    }

    /// Names of every existing bucket.
    pub fn bucket_names(&self) -> Vec<String> {
        self.buckets.iter().map(|entry| entry.key().clone()).collect()
    }

    fn bucket(&self, name: &str) -> Bucket {
        self.buckets
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(DashMap::new()))
            .clone()
    }

    /// Insert a response into a named bucket (tests and migrations).
    pub fn seed(&self, bucket: &str, url: &str, response: StoredResponse) {
        self.bucket(bucket).insert(url.to_string(), response);
    }

    /// Look up a cached response without touching the network.
    pub fn peek(&self, bucket: &str, url: &str) -> Option<StoredResponse> {
        self.buckets
            .get(bucket)?
            .get(url)
            .map(|response| response.clone())
    }

    /// Fetch and store every manifest entry into the static bucket.
    pub async fn precache(&self, manifest: &[String]) -> Result<(), FetchError> {
        let bucket = self.bucket(&self.static_bucket);
        for url in manifest {
            let response = self.fetcher.fetch(FetchRequest::get(url.clone())).await?;
            if response.is_success() {
                bucket.insert(url.clone(), response);
            } else {
                warn!(%url, status = response.status, "skipping precache of failed response");
            }
        }
        Ok(())
    }

    /// Delete every bucket that is neither the current static bucket nor the
    /// runtime bucket. Returns the deleted names.
    pub fn purge_stale_buckets(&self) -> Vec<String> {
        let keep_static = self.static_bucket.clone();
        let mut purged = Vec::new();
        self.buckets.retain(|name, _| {
            let keep = *name == keep_static || name == RUNTIME_BUCKET;
            if !keep {
                purged.push(name.clone());
            }
            keep
        });
        for name in &purged {
            debug!(bucket = %name, "deleted stale cache bucket");
        }
        purged
    }

    /// Serve a request with the strategy its shape selects.
    pub async fn handle(&self, request: FetchRequest) -> Result<StoredResponse, FetchError> {
        match classify(&request, self.api_host.as_deref()) {
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
        }
    }

    async fn cache_first(&self, request: FetchRequest) -> Result<StoredResponse, FetchError> {
        let bucket = self.bucket(&self.static_bucket);
        if let Some(cached) = bucket.get(&request.url) {
            debug!(url = %request.url, "serving from static cache");
            return Ok(cached.clone());
        }

        match self.fetcher.fetch(request.clone()).await {
            Ok(response) => {
                if response.is_success() {
                    bucket.insert(request.url.clone(), response.clone());
                }
                Ok(response)
            }
            Err(err) => {
                if let Some(fallback) = &self.offline_fallback {
                    if let Some(page) = bucket.get(fallback) {
                        debug!(url = %request.url, "serving offline fallback page");
                        return Ok(page.clone());
                    }
                }
                Err(err)
            }
        }
    }

    async fn network_first(&self, request: FetchRequest) -> Result<StoredResponse, FetchError> {
        // Mutations never touch the cache: a failed write must surface as a
        // failure, not silently succeed from a stale copy.
        if request.method != FetchMethod::Get {
            return self.fetcher.fetch(request).await;
        }

        let bucket = self.bucket(RUNTIME_BUCKET);
        match self.fetcher.fetch(request.clone()).await {
            Ok(response) => {
                if response.is_success() {
                    bucket.insert(request.url.clone(), response.clone());
                }
                Ok(response)
            }
            Err(_) => match bucket.get(&request.url) {
                Some(cached) => {
                    debug!(url = %request.url, "network failed; serving runtime cache");
                    Ok(cached.clone())
                }
                None => Err(FetchError::CacheMiss(request.url)),
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Fetcher with a scripted URL map and a switchable offline mode.
    pub(crate) struct MapFetcher {
        pub(crate) responses: Mutex<HashMap<String, StoredResponse>>,
        pub(crate) offline: AtomicBool,
        pub(crate) calls: AtomicUsize,
    }

    impl MapFetcher {
        pub(crate) fn new(entries: &[(&str, &str)]) -> Arc<Self> {
            let responses = entries
                .iter()
                .map(|(url, body)| {
                    (url.to_string(), StoredResponse::ok("text/html", body.as_bytes()))
                })
                .collect();
            Arc::new(Self {
                responses: Mutex::new(responses),
                offline: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn go_offline(&self) {
            self.offline.store(true, Ordering::SeqCst);
        }
    }

    impl Fetcher for MapFetcher {
        fn fetch(
            &self,
            request: FetchRequest,
        ) -> BoxFuture<'static, Result<StoredResponse, FetchError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if self.offline.load(Ordering::SeqCst) {
                Err(FetchError::Network("offline".into()))
            } else {
                self.responses
                    .lock()
                    .unwrap()
                    .get(&request.url)
                    .cloned()
                    .ok_or_else(|| FetchError::Network(format!("no route for {}", request.url)))
            };
            Box::pin(async move { result })
        }
    }
}
