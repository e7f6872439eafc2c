use std::fs;
use std::sync::{Arc, Mutex};

use tauri::path::BaseDirectory;
use tauri::{Emitter, Manager};
use tauri_plugin_autostart::MacosLauncher;
use tracing::warn;

pub mod backup;
pub mod commands;
pub mod config;
mod error;
pub mod events;
pub mod logging;
pub mod paths;
pub mod scanner;
pub mod state;
pub mod updater;
pub mod util;
pub mod watcher;

pub use error::{AppError, AppResult};
pub use logging::init_logging;

use crate::commands::API_KEY_ENV;
use crate::config::{ConfigStore, CONFIG_FILE_NAME, KEY_API_KEY};
use crate::events::{DEEP_LINK_SCHEME, EVENT_DATA_CHANGED};
use crate::paths::{default_data_root, DataRootResolver};
use crate::state::AppState;
use crate::updater::UpdateState;
use crate::watcher::DataWatcher;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, argv, _cwd| {
            // A second launch hands its arguments to us and exits; if one of
            // them is a deep link, relay it to the attached UI.
            if let Some(url) = argv.iter().find(|arg| arg.starts_with(DEEP_LINK_SCHEME)) {
                events::emit_deep_link(app, url);
            }
        }))
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_notification::init())
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_deep_link::init())
        .plugin(tauri_plugin_autostart::init(
            MacosLauncher::LaunchAgent,
            None,
        ))
        .plugin(tauri_plugin_updater::Builder::new().build())
        .setup(|app| {
            let handle = app.handle().clone();

            let config_path = handle
                .path()
                .app_config_dir()
                .map(|dir| dir.join(CONFIG_FILE_NAME))
                .unwrap_or_else(|_| {
                    dirs::config_dir()
                        .unwrap_or_else(std::env::temp_dir)
                        .join("daybook")
                        .join(CONFIG_FILE_NAME)
                });
            let store = Arc::new(ConfigStore::open(config_path));

            // Mirror a previously saved API key into the environment for the
            // chat subsystem.
            let saved_key = store.get_string(KEY_API_KEY);
            if !saved_key.is_empty() {
                std::env::set_var(API_KEY_ENV, &saved_key);
            }

            let demo_root = handle
                .path()
                .resolve("assets/demo_data", BaseDirectory::Resource)
                .unwrap_or_else(|_| {
                    std::env::current_dir()
                        .unwrap_or_default()
                        .join("assets/demo_data")
                });
            let resolver = DataRootResolver::new(default_data_root(), demo_root, store.clone());

            let state = AppState {
                store,
                resolver,
                watcher: Arc::new(Mutex::new(None)),
                updates: Arc::new(UpdateState::default()),
            };
            app.manage(state.clone());

            // The watch always covers the collector-owned tree, regardless of
            // the demo flag. Failure to start is logged, never fatal.
            let watch_root = default_data_root();
            fs::create_dir_all(&watch_root).ok();
            let emit_handle = handle.clone();
            match DataWatcher::start(&watch_root, move |event| {
                if let Err(err) = emit_handle.emit(EVENT_DATA_CHANGED, &event) {
                    warn!(
                        target: "daybook",
                        event = "emit_failed",
                        channel = EVENT_DATA_CHANGED,
                        error = %err
                    );
                }
            }) {
                Ok(data_watcher) => {
                    *state.watcher.lock().unwrap_or_else(|e| e.into_inner()) = Some(data_watcher);
                }
                Err(err) => {
                    warn!(target: "daybook", event = "watcher_start_failed", error = %err);
                }
            }

            updater::schedule_startup_check(handle);
            Ok(())
        })
        .on_window_event(|window, event| {
            if matches!(event, tauri::WindowEvent::Destroyed) {
                // Last window going away is process shutdown for us; release
                // the OS watch handle instead of leaking it.
                if let Some(state) = window.app_handle().try_state::<AppState>() {
                    state.stop_watcher();
                }
            }
        })
        .invoke_handler(tauri::generate_handler![
            commands::read_latest_telemetry,
            commands::read_daily_summary,
            commands::get_calendar_data,
            commands::get_user_profile,
            commands::save_user_profile,
            commands::get_tasks,
            commands::save_tasks,
            commands::get_auto_launch,
            commands::set_auto_launch,
            commands::send_notification,
            commands::get_demo_mode,
            commands::set_demo_mode,
            commands::get_api_key,
            commands::set_api_key,
            commands::delete_api_key,
            commands::export_data,
            commands::import_data,
            commands::check_for_updates,
            commands::download_update,
            commands::install_update,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
