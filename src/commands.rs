//! Tauri Commands Module
//!
//! IPC commands exposed to the frontend.

use glucotray_core::{Credentials, Region, SessionStatus};
use serde::Serialize;
use tauri::{command, AppHandle, Manager, State, WebviewWindow};
use tracing::{debug, error, info};

use crate::display::MAIN_WINDOW;
use crate::tray::{self, LOGIN_WINDOW};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct LoginResult {
    pub success: bool,
    pub error: Option<String>,
}

/// Authenticate and start polling
#[command]
pub async fn login(
    email: String,
    password: String,
    region: Region,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<LoginResult, String> {
    info!("Login event received");

    match state.monitor.login(Credentials::new(email, password, region)).await {
        Ok(()) => {
            if let Some(window) = app.get_webview_window(LOGIN_WINDOW) {
                let _ = window.hide();
            }
            if let Some(window) = app.get_webview_window(MAIN_WINDOW) {
                let _ = window.show();
            }

            Ok(LoginResult {
                success: true,
                error: None,
            })
        }
        Err(e) => {
            error!("Login failed: {}", e);
            Ok(LoginResult {
                success: false,
                error: Some(e.to_string()),
            })
        }
    }
}

/// Forget the login and stop polling
#[command]
pub fn logout(state: State<'_, AppState>) {
    state.monitor.logout();
}

/// Fetch a fresh reading now
#[command]
pub async fn refresh_glucose(state: State<'_, AppState>) -> Result<bool, String> {
    Ok(state.monitor.refresh())
}

#[command]
pub fn session_status(state: State<'_, AppState>) -> SessionStatus {
    state.monitor.status()
}

/// Replace the tray image with one rendered by the frontend
#[command]
pub fn update_tray_icon(app: AppHandle, data_url: String) -> Result<(), String> {
    debug!("Updating tray icon");

    tray::set_icon_from_data_url(&app, &data_url).map_err(|e| {
        error!("Failed to update tray icon: {:#}", e);
        format!("{:#}", e)
    })
}

/// Hide to system tray
#[command]
pub fn hide_to_tray(window: WebviewWindow) {
    let _ = window.hide();
}
