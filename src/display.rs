//! Display Module
//!
//! Forwards glucose updates to the popup window.

use glucotray_core::{DisplaySink, GlucoseUpdate};
use tauri::{AppHandle, Emitter};
use tracing::{debug, warn};

/// Event carrying every `GlucoseUpdate` to the frontend
pub const UPDATE_EVENT: &str = "updateGlucose";

/// Label of the popup window
pub const MAIN_WINDOW: &str = "main";

/// Display sink backed by the popup webview
pub struct WindowSink {
    app: AppHandle,
}

impl WindowSink {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl DisplaySink for WindowSink {
    fn deliver(&self, update: GlucoseUpdate) {
        debug!("Emitting {} (error: {})", UPDATE_EVENT, update.is_error());

        if let Err(e) = self.app.emit_to(MAIN_WINDOW, UPDATE_EVENT, update) {
            warn!("Failed to emit {}: {}", UPDATE_EVENT, e);
        }
    }
}
