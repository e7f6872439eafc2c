//! IPC surface exposed to the webview.
//!
//! Every handler returns `Result<T, AppError>`; there is no fault-propagation
//! channel across the process boundary, so failures always cross it as the
//! serialized error struct. Absence of collector data is a friendly
//! `DATA/NOT_FOUND`, never a crash.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::{json, Value};
use tauri::{AppHandle, State};
use tauri_plugin_autostart::ManagerExt;
use tauri_plugin_notification::NotificationExt;
use ts_rs::TS;

use crate::backup::{self, ExportReceipt};
use crate::config::{KEY_API_KEY, KEY_AUTO_LAUNCH, KEY_DEMO_MODE};
use crate::paths::{TASKS_FILE, USER_FILE};
use crate::scanner::{self, CalendarEntry, SUMMARY_FILE, TELEMETRY_FILE};
use crate::state::AppState;
use crate::updater::{self, UpdateCheck};
use crate::{AppError, AppResult};

/// Environment variable the chat subsystem reads the key from.
pub const API_KEY_ENV: &str = "DAYBOOK_API_KEY";

const NO_DATA_MESSAGE: &str = "No data found yet. Run the telemetry collector first.";

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../bindings/")]
pub struct SummaryPayload {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../bindings/")]
pub struct ApiKeyStatus {
    pub has_key: bool,
    pub masked: String,
}

// ─── Telemetry & data reads ──────────────────────────────────────────────

#[tauri::command]
pub async fn read_latest_telemetry(state: State<'_, AppState>) -> AppResult<Value> {
    let root = state.resolver.resolve();
    let latest = scanner::find_latest(&root)
        .ok_or_else(|| AppError::new("DATA/NOT_FOUND", NO_DATA_MESSAGE))?;

    let snapshot_path = latest.join(TELEMETRY_FILE);
    let raw = fs::read(&snapshot_path).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "read_latest_telemetry")
            .with_context("path", snapshot_path.display().to_string())
    })?;
    let doc: Value = serde_json::from_slice(&raw)
        .map_err(|err| AppError::from(err).with_context("operation", "parse_latest_telemetry"))?;
    Ok(doc)
}

#[tauri::command]
pub async fn read_daily_summary(state: State<'_, AppState>) -> AppResult<SummaryPayload> {
    let root = state.resolver.resolve();
    let latest = scanner::find_latest(&root)
        .ok_or_else(|| AppError::new("DATA/NOT_FOUND", NO_DATA_MESSAGE))?;

    let summary_path = latest.join(SUMMARY_FILE);
    if !summary_path.exists() {
        return Err(AppError::new(
            "DATA/NO_SUMMARY",
            "No summary found for the latest day yet. Run the summarizer first.",
        ));
    }
    let content = fs::read_to_string(&summary_path).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "read_daily_summary")
            .with_context("path", summary_path.display().to_string())
    })?;
    Ok(SummaryPayload { content })
}

#[tauri::command]
pub async fn get_calendar_data(state: State<'_, AppState>) -> AppResult<Vec<CalendarEntry>> {
    // Per-folder failures are already absorbed inside the scan; a tree with
    // no data is simply an empty calendar.
    Ok(scanner::scan_calendar(&state.resolver.resolve()))
}

// ─── Profile & tasks ─────────────────────────────────────────────────────

#[tauri::command]
pub async fn get_user_profile(state: State<'_, AppState>) -> AppResult<Option<Value>> {
    let path = state.resolver.resolve().join(USER_FILE);
    let Ok(raw) = fs::read(&path) else {
        return Ok(None);
    };
    Ok(serde_json::from_slice(&raw).ok())
}

#[tauri::command]
pub async fn save_user_profile(state: State<'_, AppState>, profile: Value) -> AppResult<()> {
    let root = state.resolver.resolve();
    fs::create_dir_all(&root).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "save_user_profile_mkdir")
            .with_context("path", root.display().to_string())
    })?;
    let payload = serde_json::to_vec_pretty(&profile)
        .map_err(|err| AppError::from(err).with_context("operation", "save_user_profile_encode"))?;
    crate::util::write_atomic(&root.join(USER_FILE), &payload)
}

pub(crate) fn default_task_board() -> Value {
    json!({
        "groups": [{"id": "general", "name": "General"}],
        "tasks": [],
    })
}

#[tauri::command]
pub async fn get_tasks(state: State<'_, AppState>) -> AppResult<Value> {
    let path = state.resolver.resolve().join(TASKS_FILE);
    let board = fs::read(&path)
        .ok()
        .and_then(|raw| serde_json::from_slice(&raw).ok())
        .unwrap_or_else(default_task_board);
    Ok(board)
}

#[tauri::command]
pub async fn save_tasks(state: State<'_, AppState>, board: Value) -> AppResult<()> {
    let root = state.resolver.resolve();
    fs::create_dir_all(&root).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "save_tasks_mkdir")
            .with_context("path", root.display().to_string())
    })?;
    let payload = serde_json::to_vec_pretty(&board)
        .map_err(|err| AppError::from(err).with_context("operation", "save_tasks_encode"))?;
    crate::util::write_atomic(&root.join(TASKS_FILE), &payload)
}

// ─── Auto-launch ─────────────────────────────────────────────────────────

#[tauri::command]
pub async fn get_auto_launch(state: State<'_, AppState>) -> AppResult<bool> {
    Ok(state.store.get_bool(KEY_AUTO_LAUNCH))
}

#[tauri::command]
pub async fn set_auto_launch(
    app: AppHandle,
    state: State<'_, AppState>,
    enabled: bool,
) -> AppResult<()> {
    let manager = app.autolaunch();
    let result = if enabled {
        manager.enable()
    } else {
        manager.disable()
    };
    result.map_err(|err| AppError::new("AUTOLAUNCH/SET", err.to_string()))?;
    state.store.set(KEY_AUTO_LAUNCH, json!(enabled));
    Ok(())
}

// ─── Notifications ───────────────────────────────────────────────────────

#[tauri::command]
pub async fn send_notification(app: AppHandle, title: String, body: String) -> AppResult<()> {
    app.notification()
        .builder()
        .title(title)
        .body(body)
        .show()
        .map_err(|err| AppError::new("NOTIFY/SEND", err.to_string()))
}

// ─── Demo mode ───────────────────────────────────────────────────────────

#[tauri::command]
pub async fn get_demo_mode(state: State<'_, AppState>) -> AppResult<bool> {
    Ok(state.store.get_bool(KEY_DEMO_MODE))
}

#[tauri::command]
pub async fn set_demo_mode(state: State<'_, AppState>, enabled: bool) -> AppResult<()> {
    state.store.set(KEY_DEMO_MODE, json!(enabled));
    if enabled {
        state.resolver.ensure_demo_data()?;
    }
    Ok(())
}

// ─── API key ─────────────────────────────────────────────────────────────

#[tauri::command]
pub async fn get_api_key(state: State<'_, AppState>) -> AppResult<ApiKeyStatus> {
    let key = state.store.get_string(KEY_API_KEY);
    if key.is_empty() {
        return Ok(ApiKeyStatus {
            has_key: false,
            masked: String::new(),
        });
    }
    Ok(ApiKeyStatus {
        has_key: true,
        masked: mask_key(&key),
    })
}

#[tauri::command]
pub async fn set_api_key(state: State<'_, AppState>, key: String) -> AppResult<()> {
    state.store.set(KEY_API_KEY, json!(key));
    std::env::set_var(API_KEY_ENV, &key);
    Ok(())
}

#[tauri::command]
pub async fn delete_api_key(state: State<'_, AppState>) -> AppResult<()> {
    state.store.delete(KEY_API_KEY);
    std::env::remove_var(API_KEY_ENV);
    Ok(())
}

/// First six characters, bullets, and (for long keys) the last four. The raw
/// key never crosses the IPC boundary.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let head: String = chars.iter().take(6).collect();
    let tail: String = if chars.len() > 10 {
        chars[chars.len() - 4..].iter().collect()
    } else {
        String::new()
    };
    format!("{head}\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}{tail}")
}

// ─── Backup & restore ────────────────────────────────────────────────────

#[tauri::command]
pub async fn export_data(
    state: State<'_, AppState>,
    destination: String,
) -> AppResult<ExportReceipt> {
    // Exports always capture the collector-owned tree, even in demo mode.
    backup::export_archive(state.resolver.real_root(), Path::new(&destination))
}

#[tauri::command]
pub async fn import_data(archive_path: String) -> AppResult<()> {
    let home = dirs::home_dir().ok_or_else(|| {
        AppError::new("ARCHIVE/NO_HOME", "Could not determine the home directory")
    })?;
    backup::import_archive(Path::new(&archive_path), &home)
}

// ─── Updates ─────────────────────────────────────────────────────────────

#[tauri::command]
pub async fn check_for_updates(
    app: AppHandle,
    state: State<'_, AppState>,
) -> AppResult<UpdateCheck> {
    updater::check(&app, &state.updates).await
}

#[tauri::command]
pub async fn download_update(app: AppHandle, state: State<'_, AppState>) -> AppResult<()> {
    updater::download(&app, &state.updates).await
}

#[tauri::command]
pub async fn install_update(app: AppHandle, state: State<'_, AppState>) -> AppResult<()> {
    updater::install(&state.updates)?;
    app.restart();
}
