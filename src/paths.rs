use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::config::{ConfigStore, KEY_DEMO_MODE};
use crate::util::write_atomic;
use crate::AppResult;

/// Name of the collector-owned tree under the user's home directory.
pub const DATA_DIR_NAME: &str = "Daybook_Data";

/// Profile record at the root of the tree.
pub const USER_FILE: &str = "user.json";

/// Kanban board record at the root of the tree.
pub const TASKS_FILE: &str = "tasks.json";

/// The real data root: `~/Daybook_Data`.
pub fn default_data_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
}

/// Decides which directory is the active data root.
///
/// The demo flag is re-read from the config store on every call because it
/// can be toggled at runtime, so the result is never cached. Resolution itself has
/// no failure path; downstream I/O errors belong to the callers.
#[derive(Clone)]
pub struct DataRootResolver {
    real_root: PathBuf,
    demo_root: PathBuf,
    store: Arc<ConfigStore>,
}

impl DataRootResolver {
    pub fn new(real_root: PathBuf, demo_root: PathBuf, store: Arc<ConfigStore>) -> Self {
        Self {
            real_root,
            demo_root,
            store,
        }
    }

    pub fn resolve(&self) -> PathBuf {
        if self.store.get_bool(KEY_DEMO_MODE) {
            self.demo_root.clone()
        } else {
            self.real_root.clone()
        }
    }

    /// The collector-owned tree, regardless of the demo flag. Backups always
    /// operate on this one.
    pub fn real_root(&self) -> &Path {
        &self.real_root
    }

    /// Seed the demo tree so a wholly empty demo dataset still satisfies
    /// profile reads. Invoked when demo mode is switched on.
    pub fn ensure_demo_data(&self) -> AppResult<()> {
        ensure_demo_data_at(&self.demo_root)
    }
}

pub(crate) fn ensure_demo_data_at(demo_root: &Path) -> AppResult<()> {
    fs::create_dir_all(demo_root).ok();

    let user_file = demo_root.join(USER_FILE);
    if user_file.exists() {
        return Ok(());
    }

    let profile = json!({
        "name": "Demo User",
        "dob": "2000-01-01",
        "profession": "Digital Architect",
        "interests": "Coding, Design, Synthwave",
    });
    let payload = serde_json::to_vec_pretty(&profile)?;
    write_atomic(&user_file, &payload)?;
    info!(
        target: "daybook",
        event = "demo_data_seeded",
        path = %user_file.display()
    );
    Ok(())
}
