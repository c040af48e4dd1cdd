//! REST API client for the Smart Storage HTTP endpoints.
//!
//! Wraps structured-data upload (analyze, execute, job status, failed
//! records), entity listing and authentication using [`reqwest`]. The
//! bearer token from the current [`Session`] is attached to every
//! request; a `401` response clears it.

use serde::{Deserialize, Serialize};
use smartstore_core::analysis::{AnalysisResult, StorageKind};
use smartstore_core::decisions::{ExecuteRequest, ExecuteResponse};
use smartstore_core::file_selection::SelectedFile;
use smartstore_core::job::{FailedRecord, Job};
use tokio::sync::RwLock;

use crate::config::ClientConfig;
use crate::error::{extract_detail, ApiError};
use crate::session::{Session, SessionStore};

/// Multipart field the analyze endpoint reads uploads from.
const UPLOAD_FIELD: &str = "files";

/// HTTP client for a Smart Storage backend.
pub struct SmartStorageApi {
    client: reqwest::Client,
    api_url: String,
    session: RwLock<Session>,
    store: Option<SessionStore>,
}

/// A table or collection already stored in the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEntity {
    pub name: String,
    #[serde(default)]
    pub record_count: u64,
    pub storage_type: StorageKind,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EntityList {
    #[serde(default)]
    entities: Vec<DataEntity>,
}

/// The failed-records endpoint has answered both with a bare list and
/// with a wrapping object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FailedRecordsBody {
    List(Vec<FailedRecord>),
    Wrapped {
        #[serde(default)]
        failed_records: Vec<FailedRecord>,
    },
}

impl SmartStorageApi {
    /// Create a client from configuration, restoring the persisted
    /// session if one exists.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let store = SessionStore::new(config.session_file.clone());
        let session = store.load().unwrap_or_else(|e| {
            tracing::warn!(
                path = %store.path().display(),
                error = %e,
                "Ignoring unreadable session file",
            );
            Session::default()
        });

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            session: RwLock::new(session),
            store: Some(store),
        })
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    /// The session lives in memory only.
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            session: RwLock::new(Session::default()),
            store: None,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Snapshot of the current session.
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_authenticated()
    }

    /// Upload a file for structural analysis.
    ///
    /// Sends `POST /api/data/upload/analyze` with the file contents in the
    /// multipart field `files`.
    pub async fn analyze_file(&self, file: &SelectedFile) -> Result<AnalysisResult, ApiError> {
        let bytes = tokio::fs::read(&file.path).await?;
        let mime = match file.extension().as_deref() {
            Some(".json") => "application/json",
            Some(".csv") => "text/csv",
            _ => "application/octet-stream",
        };
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new().part(UPLOAD_FIELD, part);

        tracing::info!(file = %file.name, size = file.size, "Submitting file for analysis");
        let request = self
            .client
            .post(self.url("/api/data/upload/analyze"))
            .multipart(form);
        self.send_json(request).await
    }

    /// Start the import described by `request`.
    ///
    /// Sends `POST /api/data/upload/execute` and returns the job id.
    pub async fn execute_upload(&self, request: &ExecuteRequest) -> Result<ExecuteResponse, ApiError> {
        tracing::info!(
            analysis_id = %request.analysis_id,
            schemas = request.decisions.len(),
            user_override = request.user_override,
            "Executing upload",
        );
        let builder = self
            .client
            .post(self.url("/api/data/upload/execute"))
            .json(request);
        self.send_json(builder).await
    }

    /// Sends `GET /api/data/upload/status/{job_id}`.
    pub async fn get_job_status(&self, job_id: &str) -> Result<Job, ApiError> {
        let request = self
            .client
            .get(self.url(&format!("/api/data/upload/status/{job_id}")));
        self.send_json(request).await
    }

    /// Records the job could not import.
    ///
    /// Sends `GET /api/data/upload/{job_id}/failed`.
    pub async fn get_failed_records(&self, job_id: &str) -> Result<Vec<FailedRecord>, ApiError> {
        let request = self
            .client
            .get(self.url(&format!("/api/data/upload/{job_id}/failed")));
        let body: FailedRecordsBody = self.send_json(request).await?;
        Ok(match body {
            FailedRecordsBody::List(records) => records,
            FailedRecordsBody::Wrapped { failed_records } => failed_records,
        })
    }

    /// Sends `GET /api/data/entities`.
    pub async fn list_entities(&self) -> Result<Vec<DataEntity>, ApiError> {
        let request = self.client.get(self.url("/api/data/entities"));
        let list: EntityList = self.send_json(request).await?;
        Ok(list.entities)
    }

    // ---- crate helpers ----

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Attach the bearer token, send, and decode a JSON body.
    pub(crate) async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let token = self.session.read().await.token.clone();
        let request = match token {
            Some(token) if !token.is_empty() => request.bearer_auth(token),
            _ => request,
        };
        let response = request.send().await?;
        self.parse_response(response).await
    }

    /// Replace the session in memory and persist it.
    pub(crate) async fn store_session(&self, session: Session) -> Result<(), ApiError> {
        if let Some(store) = &self.store {
            store.save(&session)?;
        }
        *self.session.write().await = session;
        Ok(())
    }

    /// Drop the session in memory and on disk. Failing to delete the
    /// file is logged, not returned.
    pub(crate) async fn clear_session(&self) {
        *self.session.write().await = Session::default();
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                tracing::warn!(path = %store.path().display(), error = %e, "Failed to remove session file");
            }
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. A `401` clears the
    /// session and maps to [`ApiError::Unauthorized`]; any other failure
    /// becomes [`ApiError::Api`] with the extracted `detail`.
    async fn ensure_success(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        let detail = extract_detail(&body);

        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::warn!("Backend rejected credentials; clearing session");
            self.clear_session().await;
            return Err(ApiError::Unauthorized(
                detail.unwrap_or_else(|| "Session expired. Please log in again.".to_string()),
            ));
        }

        Err(ApiError::Api {
            status: status.as_u16(),
            detail,
            body,
        })
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = self.ensure_success(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
