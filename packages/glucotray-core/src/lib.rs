//! Glucotray Core Library
//!
//! LibreLinkUp client, in-memory credential store and the glucose poller
//! shared by the desktop shell.

pub mod api;
pub mod auth;
pub mod config;
pub mod monitor;
pub mod poller;

pub use api::{ApiError, GlucoseApi, LibreLinkClient};
pub use auth::{CredentialStore, Credentials};
pub use config::{ClientConfig, EndpointTable, Endpoints, PollerConfig, Region};
pub use monitor::{Monitor, SessionStatus};
pub use poller::{DisplaySink, GlucoseUpdate, Poller};
