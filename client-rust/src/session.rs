use crate::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Visitor,
    Member,
    Manager,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Visitor => "visitor",
            Self::Member => "member",
            Self::Manager => "manager",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials of the signed-in user as returned by the login endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub username: String,
}

impl Session {
    #[must_use]
    pub fn has_any_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }
}

/// Where the current session lives. Every outgoing request reads the token
/// through this accessor; only sign-in, sign-out and 401 handling write it.
pub trait SessionStore: Send + Sync {
    fn get(&self) -> Option<Session>;
    fn set(&self, session: Session) -> ClientResult<()>;
    /// Removes the session. Returns whether one was present.
    fn clear(&self) -> ClientResult<bool>;

    fn token(&self) -> Option<String> {
        self.get().map(|session| session.token)
    }
}

/// Tab-local store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Option<Session> {
        self.slot().clone()
    }

    fn set(&self, session: Session) -> ClientResult<()> {
        *self.slot() = Some(session);
        Ok(())
    }

    fn clear(&self) -> ClientResult<bool> {
        Ok(self.slot().take().is_some())
    }
}

/// Persists the session as a small JSON document so it outlives restarts.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    cached: Mutex<Option<Session>>,
}

impl FileSessionStore {
    /// Opens the store, loading a previously saved session if the file exists.
    /// A corrupt file is treated as signed out.
    pub fn open(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref().to_path_buf();
        let cached = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "ignoring unreadable session file: {e}");
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(ClientError::Invariant(format!(
                    "Failed to read session file {}: {e}",
                    path.display()
                )))
            }
        };
        Ok(Self {
            path,
            cached: Mutex::new(cached),
        })
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.cached
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Option<Session> {
        self.slot().clone()
    }

    fn set(&self, session: Session) -> ClientResult<()> {
        let raw = serde_json::to_string_pretty(&session)
            .map_err(|e| ClientError::Invariant(format!("Failed to encode session: {e}")))?;
        fs::write(&self.path, raw).map_err(|e| {
            ClientError::Invariant(format!(
                "Failed to write session file {}: {e}",
                self.path.display()
            ))
        })?;
        *self.slot() = Some(session);
        Ok(())
    }

    fn clear(&self) -> ClientResult<bool> {
        let had_session = self.slot().take().is_some();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(had_session),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(had_session),
            Err(e) => Err(ClientError::Invariant(format!(
                "Failed to remove session file {}: {e}",
                self.path.display()
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthGuard {
    Allowed(Session),
    RedirectToLogin,
}

/// Decides whether a role-scoped page may render for whoever is signed in.
pub fn require_role(store: &dyn SessionStore, allowed: &[Role]) -> AuthGuard {
    match store.get() {
        Some(session) if !session.token.is_empty() && session.has_any_role(allowed) => {
            AuthGuard::Allowed(session)
        }
        _ => AuthGuard::RedirectToLogin,
    }
}
