use std::path::PathBuf;
use std::time::Duration;

use smartstore_core::error::CoreError;
use smartstore_core::upload_config::UploadConfig;

/// Default backend base URL for local development.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a backend running locally.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL without a trailing slash.
    pub api_url: String,
    /// Where the bearer token is persisted between invocations.
    pub session_file: PathBuf,
    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,
    /// Upload limits and polling cadence.
    pub upload: UploadConfig,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                       |
    /// |---------------------------|-------------------------------|
    /// | `SMARTSTORE_API_URL`      | `http://localhost:8000`       |
    /// | `SMARTSTORE_SESSION_FILE` | `~/.smartstore/session.json`  |
    /// | `REQUEST_TIMEOUT_SECS`    | `60`                          |
    ///
    /// Upload limits are read by [`UploadConfig::from_env`].
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("SMARTSTORE_API_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let session_file = lookup("SMARTSTORE_SESSION_FILE")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| default_session_file(lookup("HOME")));

        let request_timeout_secs = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| {
                    CoreError::Validation(format!(
                        "REQUEST_TIMEOUT_SECS must be a positive integer, got '{raw}'"
                    ))
                })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        let upload = UploadConfig::from_lookup(&lookup)?;

        Ok(Self {
            api_url,
            session_file,
            request_timeout: Duration::from_secs(request_timeout_secs),
            upload,
        })
    }
}

fn default_session_file(home: Option<String>) -> PathBuf {
    match home.filter(|h| !h.is_empty()) {
        Some(home) => PathBuf::from(home).join(".smartstore").join("session.json"),
        None => PathBuf::from(".smartstore-session.json"),
    }
}
