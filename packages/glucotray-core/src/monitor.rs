//! Monitor Module
//!
//! Session context owned by the application: login, logout and on-demand
//! refresh on top of the credential store and poller.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

use crate::api::{ApiError, GlucoseApi};
use crate::auth::{CredentialStore, Credentials};
use crate::config::{PollerConfig, Region};
use crate::poller::{DisplaySink, Poller};

/// Snapshot of the session for the shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub logged_in: bool,
    pub email: Option<String>,
    pub region: Option<Region>,
    pub polling: bool,
}

/// Single active glucose monitoring session
pub struct Monitor {
    api: Arc<dyn GlucoseApi>,
    credentials: Arc<CredentialStore>,
    poller: Poller,
    /// Logout count; a login that straddles a logout is discarded
    logouts: Mutex<u64>,
}

impl Monitor {
    pub fn new(api: Arc<dyn GlucoseApi>, sink: Arc<dyn DisplaySink>, config: PollerConfig) -> Self {
        let credentials = Arc::new(CredentialStore::new());
        let poller = Poller::new(Arc::clone(&api), Arc::clone(&credentials), sink, config);

        Self {
            api,
            credentials,
            poller,
            logouts: Mutex::new(0),
        }
    }

    /// Verify credentials, store them and start polling
    ///
    /// A rejected login leaves the current session and timer untouched.
    pub async fn login(&self, credentials: Credentials) -> Result<(), ApiError> {
        info!("Login requested for {} ({})", credentials.email, credentials.region);

        let logouts_before = *self.logouts.lock().unwrap_or_else(PoisonError::into_inner);

        if let Err(e) = self.api.authenticate(&credentials).await {
            warn!("Login failed: {}", e);
            return Err(e);
        }

        let logouts = self.logouts.lock().unwrap_or_else(PoisonError::into_inner);
        if *logouts != logouts_before {
            warn!("Logged out while authenticating, discarding login");
            return Err(ApiError::Cancelled);
        }

        self.credentials.set(credentials);
        self.poller.start();
        Ok(())
    }

    /// Fetch now if logged in
    pub fn refresh(&self) -> bool {
        self.poller.refresh_now()
    }

    /// Forget the login and stop polling
    pub fn logout(&self) {
        info!("Logging out");
        let mut logouts = self.logouts.lock().unwrap_or_else(PoisonError::into_inner);
        *logouts += 1;
        self.credentials.clear();
        self.poller.stop();
    }

    pub fn status(&self) -> SessionStatus {
        let credentials = self.credentials.get();

        SessionStatus {
            logged_in: credentials.is_some(),
            email: credentials.as_ref().map(|c| c.email.clone()),
            region: credentials.map(|c| c.region),
            polling: self.poller.is_active(),
        }
    }
}
