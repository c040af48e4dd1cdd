//! Bearer-token session persisted between CLI invocations.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use smartstore_core::types::Timestamp;

use crate::auth::UserProfile;
use crate::error::ApiError;

/// Authentication state: the access token plus the profile it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub saved_at: Option<Timestamp>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// JSON file holding a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session. A missing file is an anonymous session.
    pub fn load(&self) -> Result<Session, ApiError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Session::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, session: &Session) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut stamped = session.clone();
        stamped.saved_at = Some(chrono::Utc::now());
        let bytes = serde_json::to_vec_pretty(&stamped)?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
            options.mode(0o600);
            // `mode` only applies when the file is created.
            if self.path.exists() {
                std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
            }
        }
        let mut file = options.open(&self.path)?;
        file.write_all(&bytes)?;
        tracing::debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    /// Remove the stored session. Clearing an absent file succeeds.
    pub fn clear(&self) -> Result<(), ApiError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserId;

    #[test]
    fn missing_file_is_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("none.json"));
        let session = store.load().unwrap();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested").join("session.json"));
        let session = Session {
            token: Some("tok".into()),
            user: Some(UserProfile {
                user_id: Some(UserId::Int(7)),
                email: "ana@example.com".into(),
                role: Some("user".into()),
            }),
            saved_at: None,
        };

        store.save(&session).unwrap();
        let loaded = store.load().unwrap();
        assert!(loaded.is_authenticated());
        assert_eq!(loaded.user, session.user);
        assert!(loaded.saved_at.is_some());

        store.clear().unwrap();
        assert!(!store.load().unwrap().is_authenticated());
        store.clear().unwrap();
    }

    #[test]
    fn empty_token_is_not_authenticated() {
        let session = Session {
            token: Some(String::new()),
            ..Default::default()
        };
        assert!(!session.is_authenticated());
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = SessionStore::new(&path);
        store
            .save(&Session {
                token: Some("tok".into()),
                ..Default::default()
            })
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(store.load().unwrap().is_authenticated());

        store.clear().unwrap();
        let fresh = SessionStore::new(dir.path().join("fresh.json"));
        fresh.save(&Session::default()).unwrap();
        let mode = std::fs::metadata(fresh.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
