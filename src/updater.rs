//! Update event contract.
//!
//! Only the contract lives here: one scheduled check shortly after startup,
//! plus explicit check/download/install operations driven by the UI. The
//! network flow itself belongs to the updater plugin.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tauri::{AppHandle, Emitter, Manager};
use tauri_plugin_updater::{Update, UpdaterExt};
use tracing::{debug, warn};
use ts_rs::TS;

use crate::events::{EVENT_UPDATE_AVAILABLE, EVENT_UPDATE_DOWNLOADED};
use crate::state::AppState;
use crate::{AppError, AppResult};

/// Fixed delay between process start and the one scheduled check.
pub const STARTUP_CHECK_DELAY: Duration = Duration::from_secs(5);

#[derive(Default)]
pub struct UpdateState {
    pending: Mutex<Option<Update>>,
    downloaded: Mutex<Option<Vec<u8>>>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../bindings/")]
pub struct UpdateCheck {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../bindings/")]
pub struct UpdateNotice {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub release_notes: Option<String>,
}

/// Ask the update endpoint whether a newer version exists; remembers the
/// pending update for a later download/install.
pub async fn check(app: &AppHandle, state: &UpdateState) -> AppResult<UpdateCheck> {
    let updater = app
        .updater()
        .map_err(|err| AppError::new("UPDATE/UNAVAILABLE", err.to_string()))?;
    let update = updater
        .check()
        .await
        .map_err(|err| AppError::new("UPDATE/CHECK", err.to_string()))?;

    match update {
        Some(update) => {
            let version = update.version.clone();
            *state.pending.lock().unwrap_or_else(|e| e.into_inner()) = Some(update);
            Ok(UpdateCheck {
                available: true,
                version: Some(version),
            })
        }
        None => Ok(UpdateCheck {
            available: false,
            version: None,
        }),
    }
}

/// Download the pending update and announce `update-downloaded`.
pub async fn download(app: &AppHandle, state: &UpdateState) -> AppResult<()> {
    let update = state
        .pending
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .take()
        .ok_or_else(|| {
            AppError::new("UPDATE/NONE_PENDING", "No update available to download")
        })?;

    let bytes = update
        .download(|_received, _total| {}, || {})
        .await
        .map_err(|err| AppError::new("UPDATE/DOWNLOAD", err.to_string()))?;

    *state.downloaded.lock().unwrap_or_else(|e| e.into_inner()) = Some(bytes);
    // Put the update back so install can still find it.
    *state.pending.lock().unwrap_or_else(|e| e.into_inner()) = Some(update);

    if let Err(err) = app.emit(EVENT_UPDATE_DOWNLOADED, ()) {
        warn!(target: "daybook", event = "emit_failed", channel = EVENT_UPDATE_DOWNLOADED, error = %err);
    }
    Ok(())
}

/// Install the downloaded bytes. The caller restarts the process afterwards.
pub fn install(state: &UpdateState) -> AppResult<()> {
    let update = state
        .pending
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .take()
        .ok_or_else(|| AppError::new("UPDATE/NONE_PENDING", "No update available to install"))?;
    let bytes = state
        .downloaded
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .take()
        .ok_or_else(|| {
            AppError::new("UPDATE/NOT_DOWNLOADED", "Update has not been downloaded yet")
        })?;

    update
        .install(bytes)
        .map_err(|err| AppError::new("UPDATE/INSTALL", err.to_string()))
}

/// Fire the one startup check after a fixed delay, independent of other
/// activity, and announce `update-available` if the endpoint has one.
pub fn schedule_startup_check(app: AppHandle) {
    tauri::async_runtime::spawn(async move {
        tokio::time::sleep(STARTUP_CHECK_DELAY).await;

        let state = app.state::<AppState>();
        match check(&app, &state.updates).await {
            Ok(result) if result.available => {
                let notice = {
                    let pending = state.updates.pending.lock().unwrap_or_else(|e| e.into_inner());
                    pending.as_ref().map(|update| UpdateNotice {
                        version: update.version.clone(),
                        release_notes: update.body.clone(),
                    })
                };
                if let Some(notice) = notice {
                    if let Err(err) = app.emit(EVENT_UPDATE_AVAILABLE, &notice) {
                        warn!(
                            target: "daybook",
                            event = "emit_failed",
                            channel = EVENT_UPDATE_AVAILABLE,
                            error = %err
                        );
                    }
                }
            }
            Ok(_) => debug!(target: "daybook", event = "startup_update_check_clean"),
            Err(err) => {
                // Startup check failures are routine (offline, dev build).
                debug!(target: "daybook", event = "startup_update_check_failed", error = %err);
            }
        }
    });
}
