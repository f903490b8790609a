//! Configuration Module
//!
//! Compiled-in LibreLinkUp endpoints and client/poller settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Client product identifier sent with every request
pub const PRODUCT: &str = "llu.android";

/// Client version sent with every request
pub const VERSION: &str = "4.7.1";

/// Default period between scheduled fetch cycles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

const EU_AUTH_URL: &str = "https://api-eu.libreview.io/llu/auth/login";
const EU_DATA_URL: &str = "https://api-eu.libreview.io/llu/connections";
const US_AUTH_URL: &str = "https://api.libreview.io/llu/auth/login";
const US_DATA_URL: &str = "https://api.libreview.io/llu/connections";

/// Deployment zone selecting the API host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Eu,
    Us,
}

impl Region {
    pub const ALL: [Region; 2] = [Region::Eu, Region::Us];
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Region::Eu => write!(f, "EU"),
            Region::Us => write!(f, "US"),
        }
    }
}

/// Auth and data URLs for one region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub auth: String,
    pub data: String,
}

/// Region → endpoint table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTable {
    eu: Endpoints,
    us: Endpoints,
}

impl EndpointTable {
    pub fn new(eu: Endpoints, us: Endpoints) -> Self {
        Self { eu, us }
    }

    /// Endpoints for the given region
    pub fn get(&self, region: Region) -> &Endpoints {
        match region {
            Region::Eu => &self.eu,
            Region::Us => &self.us,
        }
    }
}

impl Default for EndpointTable {
    fn default() -> Self {
        Self {
            eu: Endpoints {
                auth: EU_AUTH_URL.to_string(),
                data: EU_DATA_URL.to_string(),
            },
            us: Endpoints {
                auth: US_AUTH_URL.to_string(),
                data: US_DATA_URL.to_string(),
            },
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoints: EndpointTable,
    pub product: String,
    pub version: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: EndpointTable::default(),
            product: PRODUCT.to_string(),
            version: VERSION.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Poller settings
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    /// Skip a tick while the previous cycle is still in flight
    pub skip_overlapping: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            skip_overlapping: false,
        }
    }
}
