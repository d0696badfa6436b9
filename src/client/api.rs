//! Remote API client: builds action calls, recognizes the sentinel error
//! codes, and refuses writes in read-only contexts before any network I/O.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;
use serde_json::{Value, json};
use thiserror::Error;

use crate::dao::models::TeamDocumentEntity;
use crate::dto::envelope::{CODE_AUTH_REQUIRED, CODE_STALE_DATA};
use crate::dto::team::{TeamDataBody, TeamSummary};

/// Actions rejected by the read-only guard. Includes the client-local roster
/// intents (`addPlayer`, `deletePlayer`) that never reach the wire directly
/// but must still fail fast in viewer contexts.
pub const WRITE_ACTIONS: &[&str] = &[
    "saveTeamData",
    "savePlayerLibrary",
    "updateTeam",
    "deletePlayer",
    "addPlayer",
    "setTeamPIN",
    "revokeTeamAccess",
    "createTeam",
];

/// Failure taxonomy for client-side calls.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure; the only retryable kind.
    #[error("network error: {message}")]
    Network {
        /// Underlying transport message.
        message: String,
    },
    /// Server answered `success: false` with a non-sentinel error.
    #[error("api error: {message}")]
    Api {
        /// Error code when the server sent one.
        code: Option<String>,
        /// Human-readable message.
        message: String,
    },
    /// PIN token missing, invalid, or expired.
    #[error("invalid or expired access token")]
    AuthRequired,
    /// Write rejected as stale; the server's current state is attached when
    /// the response carried it.
    #[error("server has newer data (lastModified {server_last_modified})")]
    Stale {
        /// The server's current timestamp.
        server_last_modified: u64,
        /// The server's current document, when attached.
        snapshot: Option<TeamDocumentEntity>,
    },
    /// Rejected locally by the read-only guard; no network call was made.
    #[error("read-only view: `{action}` is disabled")]
    ReadOnly {
        /// The refused action.
        action: String,
    },
    /// Request malformed before it could be sent.
    #[error("invalid input: {0}")]
    Validation(String),
}

impl ClientError {
    /// Whether the sync scheduler may retry this failure automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Network { .. })
    }
}

/// Low-level request executor, kept behind a trait so tests can count and
/// script calls.
pub trait Transport: Send + Sync {
    /// Issue a GET and decode the JSON body.
    fn get(&self, url: String) -> BoxFuture<'static, Result<Value, ClientError>>;
    /// Issue a POST with a JSON body and decode the JSON response.
    fn post(&self, url: String, body: Value) -> BoxFuture<'static, Result<Value, ClientError>>;
}

/// Production transport over reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a fresh connection pool.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

async fn decode(response: reqwest::Response) -> Result<Value, ClientError> {
    let text = response.text().await.map_err(|err| ClientError::Network {
        message: err.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|err| ClientError::Api {
        code: None,
        message: format!("invalid response format: {err}"),
    })
}

impl Transport for HttpTransport {
    fn get(&self, url: String) -> BoxFuture<'static, Result<Value, ClientError>> {
        let client = self.client.clone();
        Box::pin(async move {
            let response = client.get(&url).send().await.map_err(|err| {
                ClientError::Network {
                    message: err.to_string(),
                }
            })?;
            decode(response).await
        })
    }

    fn post(&self, url: String, body: Value) -> BoxFuture<'static, Result<Value, ClientError>> {
        let client = self.client.clone();
        Box::pin(async move {
            let response = client.post(&url).json(&body).send().await.map_err(|err| {
                ClientError::Network {
                    message: err.to_string(),
                }
            })?;
            decode(response).await
        })
    }
}

/// Arguments for one outbound `saveTeamData` call.
#[derive(Debug, Clone)]
pub struct SaveTeamCall {
    /// Storage key to write under.
    pub sheet_name: String,
    /// The document to persist.
    pub document: TeamDocumentEntity,
    /// The caller's staleness baseline.
    pub client_last_modified: Option<u64>,
    /// PIN token for protected teams.
    pub pin_token: Option<String>,
}

/// The subset of the API the sync scheduler drives.
pub trait SyncTransport: Send + Sync {
    /// Persist a team document; resolves to the server-assigned timestamp.
    fn save_team(&self, call: SaveTeamCall) -> BoxFuture<'static, Result<u64, ClientError>>;
}

/// Client for the action API.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    read_only: bool,
    sequence: AtomicU64,
}

impl ApiClient {
    /// Create a client against `base_url` using the reqwest transport.
    pub fn new(base_url: impl Into<String>, read_only: bool) -> Self {
        Self::with_transport(base_url, read_only, Arc::new(HttpTransport::new()))
    }

    /// Create a client with an explicit transport (tests).
    pub fn with_transport(
        base_url: impl Into<String>,
        read_only: bool,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            read_only,
            sequence: AtomicU64::new(0),
        }
    }

    /// Whether this client refuses write actions.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Fail fast when a write action is attempted in a read-only context.
    pub fn ensure_writable(&self, action: &str) -> Result<(), ClientError> {
        if self.read_only && WRITE_ACTIONS.contains(&action) {
            return Err(ClientError::ReadOnly {
                action: action.to_string(),
            });
        }
        Ok(())
    }

    /// Issue a GET action with query parameters.
    pub async fn call_read(
        &self,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, ClientError> {
        self.ensure_writable(action)?;

        let mut url = format!("{}?api=true&action={}", self.base_url, action);
        for (key, value) in params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        // Cache-busting parameter so intermediaries never serve a stale copy.
        let bust = self.sequence.fetch_add(1, Ordering::Relaxed);
        url.push_str(&format!("&t={bust}"));

        let value = self.transport.get(url).await?;
        parse_envelope(value)
    }

    /// Issue a POST action with a JSON body.
    pub async fn call_write(&self, action: &str, mut body: Value) -> Result<Value, ClientError> {
        self.ensure_writable(action)?;
        body["action"] = Value::String(action.to_string());
        let value = self.transport.post(self.base_url.clone(), body).await?;
        parse_envelope(value)
    }

    /// Fetch the teams listing.
    pub async fn fetch_teams(&self) -> Result<Vec<TeamSummary>, ClientError> {
        let value = self.call_read("getTeams", &[]).await?;
        let teams = value.get("teams").cloned().unwrap_or(Value::Array(vec![]));
        serde_json::from_value(teams).map_err(|err| ClientError::Api {
            code: None,
            message: format!("malformed teams payload: {err}"),
        })
    }

    /// Fetch one team document.
    pub async fn fetch_team(
        &self,
        team_id: &str,
        sheet_name: &str,
    ) -> Result<TeamDataBody, ClientError> {
        let value = self
            .call_read(
                "getTeamData",
                &[("teamID", team_id), ("sheetName", sheet_name)],
            )
            .await?;
        let team_data = value.get("teamData").cloned().ok_or_else(|| {
            ClientError::Api {
                code: None,
                message: "missing teamData in response".into(),
            }
        })?;
        serde_json::from_value(team_data).map_err(|err| ClientError::Api {
            code: None,
            message: format!("malformed teamData payload: {err}"),
        })
    }

    /// Exchange a PIN for a token.
    pub async fn validate_pin(&self, team_id: &str, pin: &str) -> Result<String, ClientError> {
        let value = self
            .call_read("validateTeamPIN", &[("teamID", team_id), ("pin", pin)])
            .await?;
        Ok(value
            .get("pinToken")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}

impl SyncTransport for ApiClient {
    fn save_team(&self, call: SaveTeamCall) -> BoxFuture<'static, Result<u64, ClientError>> {
        let guard = self.ensure_writable("saveTeamData");
        let transport = self.transport.clone();
        let base_url = self.base_url.clone();
        Box::pin(async move {
            guard?;
            let mut body = json!({
                "action": "saveTeamData",
                "sheetName": call.sheet_name,
                "teamData": call.document,
                "clientLastModified": call.client_last_modified,
            });
            if let Some(token) = call.pin_token {
                body["pinToken"] = Value::String(token);
            }
            let value = transport.post(base_url, body).await?;
            let value = parse_envelope(value)?;
            Ok(value
                .get("lastModified")
                .and_then(Value::as_u64)
                .unwrap_or_default())
        })
    }
}

/// Turn a decoded response into the tagged client result, recognizing the
/// sentinel error codes callers must branch on.
pub fn parse_envelope(value: Value) -> Result<Value, ClientError> {
    if value.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(value);
    }

    let code = value.get("error").and_then(Value::as_str);
    match code {
        Some(CODE_STALE_DATA) => Err(ClientError::Stale {
            server_last_modified: value
                .get("lastModified")
                .and_then(Value::as_u64)
                .unwrap_or_default(),
            snapshot: value
                .get("teamData")
                .cloned()
                .and_then(|snapshot| serde_json::from_value(snapshot).ok()),
        }),
        Some(CODE_AUTH_REQUIRED) => Err(ClientError::AuthRequired),
        other => Err(ClientError::Api {
            code: other.map(str::to_string),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .or(other)
                .unwrap_or("request failed")
                .to_string(),
        }),
    }
}

/// Scriptable transport shared by client-side tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Transport that counts calls and returns scripted responses.
    pub(crate) struct CountingTransport {
        pub(crate) calls: AtomicUsize,
        pub(crate) responses: Mutex<Vec<Result<Value, ClientError>>>,
    }

    impl CountingTransport {
        pub(crate) fn scripted(responses: Vec<Result<Value, ClientError>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                responses: Mutex::new(responses),
            }
        }

        fn next(&self) -> Result<Value, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(json!({ "success": true }))
            } else {
                responses.remove(0)
            }
        }
    }

    impl Transport for CountingTransport {
        fn get(&self, _url: String) -> BoxFuture<'static, Result<Value, ClientError>> {
            let next = self.next();
            Box::pin(async move { next })
        }

        fn post(
            &self,
            _url: String,
            _body: Value,
        ) -> BoxFuture<'static, Result<Value, ClientError>> {
            let next = self.next();
            Box::pin(async move { next })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::CountingTransport;
    use super::*;

    fn read_only_client(transport: Arc<CountingTransport>) -> ApiClient {
        ApiClient::with_transport("https://example.test/api", true, transport)
    }

    #[tokio::test]
    async fn read_only_guard_blocks_every_write_action_without_network() {
        let transport = Arc::new(CountingTransport::scripted(vec![]));
        let client = read_only_client(transport.clone());

        for action in [
            "saveTeamData",
            "savePlayerLibrary",
            "updateTeam",
            "deletePlayer",
            "addPlayer",
        ] {
            let err = client.call_write(action, json!({})).await.unwrap_err();
            assert!(
                matches!(err, ClientError::ReadOnly { .. }),
                "expected read-only rejection for {action}"
            );
        }

        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn read_only_guard_applies_to_writes_tunneled_over_get() {
        let transport = Arc::new(CountingTransport::scripted(vec![]));
        let client = read_only_client(transport.clone());

        let err = client
            .call_read("updateTeam", &[("teamID", "t")])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ReadOnly { .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reads_pass_through_in_read_only_mode() {
        let transport = Arc::new(CountingTransport::scripted(vec![Ok(
            json!({ "success": true, "teams": [] }),
        )]));
        let client = read_only_client(transport.clone());

        let teams = client.fetch_teams().await.unwrap();
        assert!(teams.is_empty());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_envelope_parses_into_typed_error_with_snapshot() {
        let transport = Arc::new(CountingTransport::scripted(vec![Ok(json!({
            "success": false,
            "error": "STALE_DATA",
            "message": "Server has newer data. Please refresh before saving.",
            "lastModified": 150,
            "teamData": { "players": [], "games": [], "_lastModified": 150 },
        }))]));
        let client = ApiClient::with_transport("https://example.test/api", false, transport);

        let err = client
            .save_team(SaveTeamCall {
                sheet_name: "sheet".into(),
                document: TeamDocumentEntity::default(),
                client_last_modified: Some(100),
                pin_token: None,
            })
            .await
            .unwrap_err();

        match err {
            ClientError::Stale {
                server_last_modified,
                snapshot,
            } => {
                assert_eq!(server_last_modified, 150);
                assert_eq!(snapshot.unwrap().last_modified, 150);
            }
            other => panic!("expected stale error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn auth_required_envelope_parses_into_typed_error() {
        let transport = Arc::new(CountingTransport::scripted(vec![Ok(json!({
            "success": false,
            "error": "AUTH_REQUIRED",
            "message": "Invalid or expired access token",
        }))]));
        let client = ApiClient::with_transport("https://example.test/api", false, transport);

        let err = client
            .call_write("saveTeamData", json!({ "sheetName": "s" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::AuthRequired));
    }

    #[test]
    fn only_network_errors_are_retryable() {
        assert!(
            ClientError::Network {
                message: "timeout".into()
            }
            .is_retryable()
        );
        assert!(!ClientError::AuthRequired.is_retryable());
        assert!(
            !ClientError::Stale {
                server_last_modified: 1,
                snapshot: None
            }
            .is_retryable()
        );
    }
}
