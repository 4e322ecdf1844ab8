//! Identity and session lifecycle.
//!
//! [`LocalIdentity`] is a single-profile provider: signing in records the user in a
//! `session.json` file next to the database, signing out removes it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};

const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Stable key every task is stored under
    pub uid: String,
    pub display_name: String,
}

impl User {
    /// Build a user from a typed name. The uid is the lower-cased name with runs of
    /// whitespace collapsed to `-`.
    pub fn from_name(name: &str) -> Result<Self, AuthError> {
        let display_name = name.split_whitespace().collect::<Vec<_>>().join(" ");
        if display_name.is_empty() {
            return Err(AuthError::InvalidName("name is empty".to_string()));
        }
        if display_name.chars().count() > MAX_NAME_LEN {
            return Err(AuthError::InvalidName(format!("name is longer than {} characters", MAX_NAME_LEN)));
        }
        if let Some(bad) = display_name
            .chars()
            .find(|c| !(c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_' || *c == '.'))
        {
            return Err(AuthError::InvalidName(format!("'{}' is not allowed in a name", bad)));
        }
        let uid = display_name.to_lowercase().replace(' ', "-");
        Ok(Self { uid, display_name })
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid user name: {0}")]
    InvalidName(String),
    #[error("Could not determine data directory")]
    DataDirError,
    #[error("Failed to access session file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse session file: {0}")]
    ParseError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type AuthListener = Box<dyn FnMut(Option<&User>)>;

pub trait Identity {
    fn current_user(&self) -> Option<User>;

    fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }

    fn sign_in(&mut self, name: &str) -> Result<User, AuthError>;

    fn sign_out(&mut self) -> Result<(), AuthError>;

    /// Register a listener. It is called right away with the current user and
    /// again on every sign-in and sign-out.
    fn on_auth_state_change(&mut self, listener: AuthListener) -> ListenerId;

    fn remove_listener(&mut self, id: ListenerId);
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    user: User,
    signed_in_at: chrono::DateTime<chrono::Utc>,
}

/// Session persisted as JSON at a fixed path
pub struct LocalIdentity {
    session_path: Option<PathBuf>,
    user: Option<User>,
    listeners: Vec<(ListenerId, AuthListener)>,
    next_listener: u64,
}

impl LocalIdentity {
    /// Open the session stored at `session_path`. A missing file means signed out;
    /// an unreadable one is logged and treated the same way.
    pub fn open(session_path: PathBuf) -> Self {
        let user = match Self::read_session(&session_path) {
            Ok(user) => user,
            Err(e) => {
                error!(path = %session_path.display(), "discarding unreadable session: {}", e);
                None
            }
        };
        Self {
            session_path: Some(session_path),
            user,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// Session that lives only as long as the process
    pub fn ephemeral() -> Self {
        Self {
            session_path: None,
            user: None,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    fn read_session(path: &PathBuf) -> Result<Option<User>, AuthError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        let session: SessionFile = serde_json::from_str(&contents)?;
        Ok(Some(session.user))
    }

    fn write_session(&self, user: &User) -> Result<(), AuthError> {
        let Some(ref path) = self.session_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let session = SessionFile {
            user: user.clone(),
            signed_in_at: chrono::Utc::now(),
        };
        fs::write(path, serde_json::to_string_pretty(&session)?)?;
        Ok(())
    }

    fn emit(&mut self) {
        let user = self.user.clone();
        for (_, listener) in self.listeners.iter_mut() {
            listener(user.as_ref());
        }
    }
}

impl Identity for LocalIdentity {
    fn current_user(&self) -> Option<User> {
        self.user.clone()
    }

    fn sign_in(&mut self, name: &str) -> Result<User, AuthError> {
        let user = User::from_name(name)?;
        self.write_session(&user)?;
        info!(uid = %user.uid, "signed in");
        self.user = Some(user.clone());
        self.emit();
        Ok(user)
    }

    fn sign_out(&mut self) -> Result<(), AuthError> {
        if let Some(ref path) = self.session_path {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        if let Some(user) = self.user.take() {
            info!(uid = %user.uid, "signed out");
            self.emit();
        }
        Ok(())
    }

    fn on_auth_state_change(&mut self, mut listener: AuthListener) -> ListenerId {
        listener(self.user.as_ref());
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
    }
}
