//! Authentication Module
//!
//! Holds the active LibreLinkUp login in memory.

use std::sync::Mutex;

use serde::Deserialize;
use tracing::info;

use crate::config::Region;

/// Login credentials submitted by the user
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub region: Region,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>, region: Region) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            region,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

/// Single active credential set, last write wins
#[derive(Default)]
pub struct CredentialStore {
    credentials: Mutex<Option<Credentials>>,
}

impl CredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active credentials
    pub fn set(&self, credentials: Credentials) {
        info!("Credentials set for {} ({})", credentials.email, credentials.region);
        if let Ok(mut slot) = self.credentials.lock() {
            *slot = Some(credentials);
        }
    }

    /// Snapshot of the active credentials
    pub fn get(&self) -> Option<Credentials> {
        self.credentials.lock().ok().and_then(|slot| slot.clone())
    }

    /// Check if a login is active
    pub fn is_logged_in(&self) -> bool {
        self.credentials
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Forget the active credentials
    pub fn clear(&self) {
        info!("Credentials cleared");
        if let Ok(mut slot) = self.credentials.lock() {
            *slot = None;
        }
    }
}
