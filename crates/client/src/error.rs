use smartstore_core::error::CoreError;

/// Errors from the Smart Storage REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Smart Storage API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Server-provided `detail`, when the body carried one.
        detail: Option<String>,
        /// Raw response body for debugging.
        body: String,
    },

    /// The backend rejected the session token. The stored session has
    /// been cleared.
    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    /// A 2xx response whose body did not match the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Reading the upload or the session file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Best available message for the user: the server's `detail`, then
    /// the transport error, then the status line.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Api {
                detail: Some(detail),
                ..
            } => detail.clone(),
            ApiError::Api { status, .. } => format!("Request failed with status code {status}"),
            ApiError::Unauthorized(msg) => msg.clone(),
            ApiError::Request(err) => err.to_string(),
            ApiError::Decode(err) => err.to_string(),
            ApiError::Io(err) => err.to_string(),
        }
    }

    /// HTTP status, when the backend answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            ApiError::Unauthorized(_) => Some(401),
            ApiError::Request(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Errors surfaced by [`ImportSession`](crate::import::ImportSession).
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Local validation or an illegal workflow transition.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A request to the backend failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Monitoring was cancelled before the job reached a terminal status.
    #[error("Stopped observing job {job_id} before it finished")]
    Cancelled { job_id: String },
}

impl ImportError {
    pub fn user_message(&self) -> String {
        match self {
            ImportError::Core(err) => err.user_message(),
            ImportError::Api(err) => err.user_message(),
            ImportError::Cancelled { .. } => self.to_string(),
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"detail": "..."}` and validation lists of the form
/// `{"detail": [{"msg": "..."}, ...]}`, plus a plain `{"error": "..."}`.
pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    let detail = match value.get("detail") {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Array(items)) => {
            let msgs: Vec<String> = items
                .iter()
                .filter_map(|item| {
                    item.get("msg")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .collect();
            (!msgs.is_empty()).then(|| msgs.join("; "))
        }
        _ => value
            .get("error")
            .and_then(|e| e.as_str())
            .map(str::to_string),
    };

    detail.filter(|d| !d.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_string() {
        assert_eq!(
            extract_detail(r#"{"detail": "Analysis not found"}"#).as_deref(),
            Some("Analysis not found")
        );
    }

    #[test]
    fn detail_validation_list() {
        let body = r#"{"detail": [{"loc": ["body", "decisions"], "msg": "field required"}, {"msg": "bad id"}]}"#;
        assert_eq!(
            extract_detail(body).as_deref(),
            Some("field required; bad id")
        );
    }

    #[test]
    fn error_key_fallback() {
        assert_eq!(
            extract_detail(r#"{"error": "boom", "code": "INTERNAL_ERROR"}"#).as_deref(),
            Some("boom")
        );
    }

    #[test]
    fn non_json_or_blank_detail() {
        assert!(extract_detail("<html>502</html>").is_none());
        assert!(extract_detail(r#"{"detail": "  "}"#).is_none());
        assert!(extract_detail(r#"{"detail": []}"#).is_none());
    }

    #[test]
    fn user_message_prefers_detail_then_status() {
        let with_detail = ApiError::Api {
            status: 422,
            detail: Some("Invalid decisions".into()),
            body: String::new(),
        };
        assert_eq!(with_detail.user_message(), "Invalid decisions");

        let bare = ApiError::Api {
            status: 500,
            detail: None,
            body: "oops".into(),
        };
        assert_eq!(bare.user_message(), "Request failed with status code 500");
        assert_eq!(bare.status(), Some(500));
    }
}
