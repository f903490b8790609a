//! Tray Module
//!
//! Tray icon, popup placement and the login window.

use anyhow::{bail, Context};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tauri::image::Image;
use tauri::menu::{Menu, MenuItem};
use tauri::tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent};
use tauri::{AppHandle, Manager, PhysicalPosition, WebviewUrl, WebviewWindowBuilder};
use tracing::{debug, info, warn};

use crate::display::MAIN_WINDOW;
use crate::AppState;

pub const TRAY_ID: &str = "main";
pub const LOGIN_WINDOW: &str = "login";

const TOOLTIP: &str = "Glucose Monitor";

/// Build the tray icon and its menu
pub fn build(app: &AppHandle) -> tauri::Result<()> {
    let tray_menu = Menu::with_items(app, &[
        &MenuItem::with_id(app, "show", "Show", true, None::<&str>)?,
        &MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)?,
    ])?;

    let mut builder = TrayIconBuilder::with_id(TRAY_ID)
        .tooltip(TOOLTIP)
        .menu(&tray_menu)
        .show_menu_on_left_click(false)
        .on_menu_event(|app, event| match event.id().as_ref() {
            "show" => open(app, None),
            "quit" => app.exit(0),
            _ => {}
        })
        .on_tray_icon_event(|tray, event| {
            if let TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                position,
                ..
            } = event
            {
                debug!("Tray icon clicked");
                open(tray.app_handle(), Some(position));
            }
        });

    if let Some(icon) = app.default_window_icon() {
        builder = builder.icon(icon.clone());
    }

    builder.build(app)?;
    info!("Tray icon created");
    Ok(())
}

/// Show the popup when logged in, otherwise the login window
fn open(app: &AppHandle, click: Option<PhysicalPosition<f64>>) {
    let logged_in = app.state::<AppState>().monitor.status().logged_in;

    if !logged_in {
        if let Err(e) = show_login_window(app) {
            warn!("Failed to open login window: {}", e);
        }
        return;
    }

    if let Some(window) = app.get_webview_window(MAIN_WINDOW) {
        if let (Some(click), Ok(size)) = (click, window.outer_size()) {
            let x = click.x - f64::from(size.width) / 2.0;
            let y = if cfg!(target_os = "macos") {
                click.y
            } else {
                click.y - f64::from(size.height)
            };
            let _ = window.set_position(PhysicalPosition::new(x, y));
        }
        let _ = window.show();
        let _ = window.set_focus();
    }

    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        app.state::<AppState>().monitor.refresh();
    });
}

/// Windows that hide on close instead of being destroyed
pub fn hides_on_close(label: &str) -> bool {
    label == MAIN_WINDOW || label == LOGIN_WINDOW
}

/// Focus the login window, creating it on first use
pub fn show_login_window(app: &AppHandle) -> tauri::Result<()> {
    if let Some(window) = app.get_webview_window(LOGIN_WINDOW) {
        window.show()?;
        return window.set_focus();
    }

    info!("Creating the login window");
    WebviewWindowBuilder::new(app, LOGIN_WINDOW, WebviewUrl::App("login.html".into()))
        .title("Glucotray Login")
        .inner_size(300.0, 400.0)
        .build()?;
    Ok(())
}

/// Replace the tray image with a `data:image/png;base64,...` URL
pub fn set_icon_from_data_url(app: &AppHandle, data_url: &str) -> anyhow::Result<()> {
    let bytes = decode_data_url(data_url)?;
    let image = Image::from_bytes(&bytes).context("unsupported tray image")?;

    let tray = app.tray_by_id(TRAY_ID).context("tray icon not created")?;
    tray.set_icon(Some(image)).context("failed to set tray image")?;
    Ok(())
}

fn decode_data_url(data_url: &str) -> anyhow::Result<Vec<u8>> {
    let (header, payload) = data_url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .context("not a data URL")?;

    if !header.ends_with(";base64") {
        bail!("data URL is not base64 encoded");
    }

    STANDARD.decode(payload.trim()).context("invalid base64 payload")
}
