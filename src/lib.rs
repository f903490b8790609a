//! Glucotray Desktop Library
//!
//! Tauri shell around the glucose monitor core.

pub mod commands;
pub mod display;
pub mod logging;
pub mod tray;

use glucotray_core::Monitor;

/// Application state shared across commands
pub struct AppState {
    pub monitor: Monitor,
}
