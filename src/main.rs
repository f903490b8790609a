//! Glucotray Desktop - Main Entry Point
//!
//! Tray utility showing the latest LibreLinkUp glucose reading.

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::sync::Arc;

use tauri::Manager;
use tracing::info;

use glucotray_core::{ClientConfig, LibreLinkClient, Monitor, PollerConfig};
use glucotray_lib::{
    commands,
    display::{WindowSink, MAIN_WINDOW},
    logging, tray, AppState,
};

fn main() {
    logging::init();
    info!("Glucotray starting...");

    let result = tauri::Builder::default()
        .on_window_event(|window, event| match event {
            tauri::WindowEvent::CloseRequested { api, .. } if tray::hides_on_close(window.label()) => {
                let _ = window.hide();
                api.prevent_close();
            }
            tauri::WindowEvent::Focused(false) if window.label() == MAIN_WINDOW => {
                let _ = window.hide();
            }
            _ => {}
        })
        .invoke_handler(tauri::generate_handler![
            commands::login,
            commands::logout,
            commands::refresh_glucose,
            commands::session_status,
            commands::update_tray_icon,
            commands::hide_to_tray,
        ])
        .setup(|app| {
            let handle = app.handle().clone();

            let api = LibreLinkClient::new(ClientConfig::default())?;
            let monitor = Monitor::new(
                Arc::new(api),
                Arc::new(WindowSink::new(handle.clone())),
                PollerConfig::default(),
            );
            app.manage(AppState { monitor });

            tray::build(&handle)?;

            info!("Application setup complete");
            Ok(())
        })
        .build(tauri::generate_context!());

    let app = match result {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("Error building Glucotray: {}", e);
            std::process::exit(1);
        }
    };

    app.run(|_app, event| {
        // Keep running in the tray with no windows open
        if let tauri::RunEvent::ExitRequested { api, code: None, .. } = event {
            api.prevent_exit();
        }
    });
}
