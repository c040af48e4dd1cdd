//! Login, registration and profile endpoints.
//!
//! A successful login stores the bearer token in the client's
//! [`Session`] (and the session file, when one is configured) so every
//! later request is authenticated.

use serde::{Deserialize, Serialize};

use crate::api::SmartStorageApi;
use crate::error::ApiError;
use crate::session::Session;

/// Role assumed for freshly registered accounts.
const DEFAULT_ROLE: &str = "user";

/// User identifier. The backend has issued both numeric and string ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Int(i64),
    Text(String),
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserId::Int(id) => write!(f, "{id}"),
            UserId::Text(id) => f.write_str(id),
        }
    }
}

/// Profile returned by `GET /auth/profile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

/// Body of a successful `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Body of `POST /auth/signup`. Some deployments log the new user in
/// immediately and return a token; others only confirm the account.
#[derive(Debug, Deserialize)]
struct SignupResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Result of [`SmartStorageApi::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// The backend returned a token; the session is now authenticated.
    LoggedIn(UserProfile),
    /// The account exists but the user must log in explicitly.
    LoginRequired,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

impl SmartStorageApi {
    /// Exchange credentials for a token, then fetch the profile so the
    /// session knows the user's role.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, ApiError> {
        let request = self
            .http()
            .post(self.url("/auth/login"))
            .json(&Credentials { email, password });
        let token: TokenResponse = self.send_json(request).await?;
        tracing::debug!(token_type = %token.token_type, "Login accepted");

        self.store_session(Session {
            token: Some(token.access_token.clone()),
            user: None,
            saved_at: None,
        })
        .await?;

        let profile = match self.profile().await {
            Ok(profile) => profile,
            Err(e) => {
                self.clear_session().await;
                return Err(e);
            }
        };

        self.store_session(Session {
            token: Some(token.access_token),
            user: Some(profile.clone()),
            saved_at: None,
        })
        .await?;

        tracing::info!(email = %profile.email, role = ?profile.role, "Logged in");
        Ok(profile)
    }

    /// Create an account. When the backend returns a token the user is
    /// logged in straight away with the default role.
    pub async fn register(&self, email: &str, password: &str) -> Result<Registration, ApiError> {
        let request = self
            .http()
            .post(self.url("/auth/signup"))
            .json(&Credentials { email, password });
        let signup: SignupResponse = self.send_json(request).await?;

        match signup.access_token.filter(|t| !t.is_empty()) {
            Some(token) => {
                let profile = UserProfile {
                    user_id: None,
                    email: email.to_string(),
                    role: Some(DEFAULT_ROLE.to_string()),
                };
                self.store_session(Session {
                    token: Some(token),
                    user: Some(profile.clone()),
                    saved_at: None,
                })
                .await?;
                tracing::info!(email, "Registered and logged in");
                Ok(Registration::LoggedIn(profile))
            }
            None => {
                tracing::info!(email, "Registered; login required");
                Ok(Registration::LoginRequired)
            }
        }
    }

    /// Fetch the profile of the authenticated user.
    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        let request = self.http().get(self.url("/auth/profile"));
        self.send_json(request).await
    }

    /// Forget the token in memory and on disk.
    pub async fn logout(&self) {
        self.clear_session().await;
        tracing::info!("Logged out");
    }
}
