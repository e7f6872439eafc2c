//! Push-channel contract between the background process and the webview.
//!
//! All channels are fire-and-forget: delivery is at-most-once per underlying
//! event and there is no replay buffer, so a listener that attaches after an
//! event fired never sees it.

use tauri::{AppHandle, Emitter};
use tracing::warn;

pub const EVENT_DATA_CHANGED: &str = "data-changed";
pub const EVENT_TRACKING_PAUSED: &str = "tracking-paused";
pub const EVENT_DEEP_LINK: &str = "deep-link";
pub const EVENT_UPDATE_AVAILABLE: &str = "update-available";
pub const EVENT_UPDATE_DOWNLOADED: &str = "update-downloaded";

/// URI scheme registered at the OS level for deep links.
pub const DEEP_LINK_SCHEME: &str = "daybook://";

/// Relay the tray pause toggle to whatever UI is currently attached.
pub fn emit_tracking_paused(app: &AppHandle, paused: bool) {
    if let Err(err) = app.emit(EVENT_TRACKING_PAUSED, paused) {
        warn!(target: "daybook", event = "emit_failed", channel = EVENT_TRACKING_PAUSED, error = %err);
    }
}

/// Forward a `daybook://` URL handed over by a second launch.
pub fn emit_deep_link(app: &AppHandle, url: &str) {
    if let Err(err) = app.emit(EVENT_DEEP_LINK, url) {
        warn!(target: "daybook", event = "emit_failed", channel = EVENT_DEEP_LINK, error = %err);
    }
}
