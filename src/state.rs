use std::sync::{Arc, Mutex};

use crate::config::ConfigStore;
use crate::paths::DataRootResolver;
use crate::updater::UpdateState;
use crate::watcher::DataWatcher;

/// Everything the IPC handlers need, owned explicitly instead of living in
/// process-global state. Handlers receive this via `tauri::State`, and tests
/// construct it directly against temp directories.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConfigStore>,
    pub resolver: DataRootResolver,
    pub watcher: Arc<Mutex<Option<DataWatcher>>>,
    pub updates: Arc<UpdateState>,
}

impl AppState {
    pub fn stop_watcher(&self) {
        if let Some(mut watcher) = self
            .watcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            watcher.stop();
        }
    }
}
