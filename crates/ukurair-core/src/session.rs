// ── Persisted session ──
//
// The signed-in session survives restarts as a small JSON file. The file
// is written owner-only on unix; anything unreadable is treated as "not
// signed in".

use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{BackendKind, Session, UserProfile};

/// On-disk shape. Secrets are plain strings only inside this DTO.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    backend: BackendKind,
    token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default)]
    user: UserProfile,
    issued_at: DateTime<Utc>,
}

impl From<&Session> for PersistedSession {
    fn from(s: &Session) -> Self {
        Self {
            backend: s.backend,
            token: s.token.expose_secret().to_owned(),
            refresh_token: s.refresh_token.as_ref().map(|t| t.expose_secret().to_owned()),
            user: s.user.clone(),
            issued_at: s.issued_at,
        }
    }
}

impl From<PersistedSession> for Session {
    fn from(p: PersistedSession) -> Self {
        Self {
            token: SecretString::from(p.token),
            refresh_token: p.refresh_token.map(SecretString::from),
            user: p.user,
            backend: p.backend,
            issued_at: p.issued_at,
        }
    }
}

/// Session persistence. `None` path keeps sessions in memory only.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    path: Option<PathBuf>,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A store that never touches disk.
    pub fn ephemeral() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The stored session for `backend`, if any.
    ///
    /// Missing, corrupt and foreign-backend files all yield `None`.
    pub fn load(&self, backend: BackendKind) -> Option<Session> {
        let path = self.path.as_ref()?;
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read session file");
                return None;
            }
        };

        let persisted: PersistedSession = match serde_json::from_str(&raw) {
            Ok(p) => p,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring corrupt session file");
                return None;
            }
        };

        if persisted.backend != backend {
            debug!(stored = %persisted.backend, active = %backend, "session belongs to another backend");
            return None;
        }
        Some(persisted.into())
    }

    pub fn save(&self, session: &Session) -> Result<(), CoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(storage)?;
        }

        let json = serde_json::to_vec_pretty(&PersistedSession::from(session))
            .map_err(|e| CoreError::Storage {
                message: e.to_string(),
            })?;

        let mut file = open_private(path).map_err(storage)?;
        file.write_all(&json).map_err(storage)?;
        debug!(path = %path.display(), "session saved");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        match std::fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "session cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage(e)),
        }
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::{OpenOptionsExt as _, PermissionsExt as _};

    let file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

fn storage(e: std::io::Error) -> CoreError {
    CoreError::Storage {
        message: e.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn session(backend: BackendKind) -> Session {
        Session {
            token: SecretString::from("tok".to_owned()),
            refresh_token: Some(SecretString::from("ref".to_owned())),
            user: UserProfile {
                username: Some("admin".into()),
                ..UserProfile::default()
            },
            backend,
            issued_at: Utc::now(),
        }
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested/session.json"));
        store.save(&session(BackendKind::Realtime)).unwrap();

        let loaded = store.load(BackendKind::Realtime).unwrap();
        assert_eq!(loaded.token.expose_secret(), "tok");
        assert_eq!(loaded.refresh_token.unwrap().expose_secret(), "ref");
        assert_eq!(loaded.user.display_name(), "admin");
    }

    #[test]
    fn other_backend_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        store.save(&session(BackendKind::Rest)).unwrap();
        assert!(store.load(BackendKind::Realtime).is_none());
        assert!(store.load(BackendKind::Rest).is_some());
    }

    #[test]
    fn corrupt_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(SessionStore::new(&path).load(BackendKind::Rest).is_none());
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        store.save(&session(BackendKind::Rest)).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load(BackendKind::Rest).is_none());
    }

    #[test]
    fn ephemeral_store_keeps_nothing() {
        let store = SessionStore::ephemeral();
        store.save(&session(BackendKind::Rest)).unwrap();
        assert!(store.load(BackendKind::Rest).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt as _;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        SessionStore::new(&path).save(&session(BackendKind::Rest)).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
