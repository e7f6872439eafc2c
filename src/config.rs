//! Persistent configuration record with an obfuscated on-disk form.
//!
//! The backing file is scrambled with a keystream derived from a fixed,
//! hard-coded local key. That is deliberate: it deters casual inspection of
//! the file in a text editor and nothing more. It is NOT a defense against a
//! determined local attacker, and no stronger claim should be made for it.
//!
//! If the backing file cannot be read back (corruption, decode failure), the
//! store degrades to a volatile in-memory map with the same contract so the
//! host process keeps running; the failure is logged, never propagated.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::util::write_atomic;
use crate::{AppError, AppResult};

pub const KEY_API_KEY: &str = "apiKey";
pub const KEY_DEMO_MODE: &str = "demoMode";
pub const KEY_AUTO_LAUNCH: &str = "autoLaunch";
pub const KEY_TOKEN_BUDGET: &str = "tokenBudget";

/// File name of the scrambled record under the app config directory.
pub const CONFIG_FILE_NAME: &str = "config.dat";

const FILE_MAGIC: &str = "DBK1:";
const LOCAL_KEY: &[u8] = b"daybook-local-key-v1";
const NONCE_LEN: usize = 16;

/// Schema default for a recognized key; unknown keys default to `Null`.
pub fn default_for(key: &str) -> Value {
    match key {
        KEY_API_KEY => json!(""),
        KEY_DEMO_MODE => json!(false),
        KEY_AUTO_LAUNCH => json!(false),
        KEY_TOKEN_BUDGET => json!({
            "dailyLimit": 100_000,
            "monthlyLimit": 2_000_000,
            "dailyUsed": 0,
            "monthlyUsed": 0,
            "lastResetDay": "",
            "lastResetMonth": "",
        }),
        _ => Value::Null,
    }
}

trait ConfigBackend: Send + Sync {
    fn persist(&self, data: &Map<String, Value>) -> AppResult<()>;
}

struct EncryptedFileBackend {
    path: PathBuf,
}

impl EncryptedFileBackend {
    fn load(&self) -> AppResult<Map<String, Value>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Map::new());
            }
            Err(err) => {
                return Err(AppError::from(err)
                    .with_context("operation", "config_read")
                    .with_context("path", self.path.display().to_string()))
            }
        };
        let plain = unscramble(raw.trim())?;
        let data: Map<String, Value> = serde_json::from_slice(&plain)
            .map_err(|err| AppError::from(err).with_context("operation", "config_parse"))?;
        Ok(data)
    }
}

impl ConfigBackend for EncryptedFileBackend {
    fn persist(&self, data: &Map<String, Value>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                AppError::from(err)
                    .with_context("operation", "config_create_dir")
                    .with_context("path", parent.display().to_string())
            })?;
        }
        let plain = serde_json::to_vec(&Value::Object(data.clone()))
            .map_err(|err| AppError::from(err).with_context("operation", "config_encode"))?;
        write_atomic(&self.path, scramble(&plain).as_bytes())
    }
}

struct MemoryBackend;

impl ConfigBackend for MemoryBackend {
    fn persist(&self, _data: &Map<String, Value>) -> AppResult<()> {
        Ok(())
    }
}

/// Process-wide configuration record.
///
/// `get`/`set`/`delete` are synchronous; the data mutex is held across the
/// backing write, so a `get` immediately after a `set` always observes the
/// new value.
pub struct ConfigStore {
    data: Mutex<Map<String, Value>>,
    backend: Box<dyn ConfigBackend>,
}

impl ConfigStore {
    /// Open the store at `path`, falling back to a volatile in-memory map if
    /// the backing file exists but cannot be decoded. Never fails.
    pub fn open(path: PathBuf) -> Self {
        let backend = EncryptedFileBackend { path };
        match backend.load() {
            Ok(data) => ConfigStore {
                data: Mutex::new(data),
                backend: Box::new(backend),
            },
            Err(err) => {
                warn!(
                    target: "daybook",
                    event = "config_init_failed",
                    error = %err,
                    "falling back to in-memory configuration; settings will not persist"
                );
                ConfigStore::in_memory()
            }
        }
    }

    /// A store that never touches disk. Used as the degraded fallback and in
    /// tests.
    pub fn in_memory() -> Self {
        ConfigStore {
            data: Mutex::new(Map::new()),
            backend: Box::new(MemoryBackend),
        }
    }

    /// Read a key, materializing the schema default when absent.
    pub fn get(&self, key: &str) -> Value {
        let data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        data.get(key).cloned().unwrap_or_else(|| default_for(key))
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).as_bool().unwrap_or(false)
    }

    pub fn get_string(&self, key: &str) -> String {
        match self.get(key) {
            Value::String(s) => s,
            _ => String::new(),
        }
    }

    pub fn set(&self, key: &str, value: Value) {
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        data.insert(key.to_string(), value);
        if let Err(err) = self.backend.persist(&data) {
            warn!(
                target: "daybook",
                event = "config_persist_failed",
                key,
                error = %err
            );
        }
    }

    pub fn delete(&self, key: &str) {
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        data.remove(key);
        if let Err(err) = self.backend.persist(&data) {
            warn!(
                target: "daybook",
                event = "config_persist_failed",
                key,
                error = %err
            );
        }
    }
}

#[derive(Debug, Error)]
enum CipherError {
    #[error("configuration file has an unknown format")]
    BadMagic,
    #[error("configuration file is not valid base64: {0}")]
    BadEncoding(#[from] base64::DecodeError),
    #[error("configuration file is too short to contain a nonce")]
    Truncated,
}

impl From<CipherError> for AppError {
    fn from(error: CipherError) -> Self {
        let code = match error {
            CipherError::BadMagic => "CONFIG/BAD_MAGIC",
            CipherError::BadEncoding(_) => "CONFIG/BAD_ENCODING",
            CipherError::Truncated => "CONFIG/TRUNCATED",
        };
        AppError::new(code, error.to_string())
    }
}

fn keystream_block(nonce: &[u8], counter: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(LOCAL_KEY);
    hasher.update(nonce);
    hasher.update(counter.to_le_bytes());
    hasher.finalize().into()
}

fn apply_keystream(nonce: &[u8], buf: &mut [u8]) {
    for (i, chunk) in buf.chunks_mut(32).enumerate() {
        let block = keystream_block(nonce, i as u64);
        for (byte, key) in chunk.iter_mut().zip(block.iter()) {
            *byte ^= key;
        }
    }
}

fn scramble(plain: &[u8]) -> String {
    let nonce = *Uuid::new_v4().as_bytes();
    let mut buf = plain.to_vec();
    apply_keystream(&nonce, &mut buf);
    let mut payload = Vec::with_capacity(NONCE_LEN + buf.len());
    payload.extend_from_slice(&nonce);
    payload.extend_from_slice(&buf);
    format!("{FILE_MAGIC}{}", BASE64.encode(payload))
}

fn unscramble(raw: &str) -> Result<Vec<u8>, CipherError> {
    let encoded = raw.strip_prefix(FILE_MAGIC).ok_or(CipherError::BadMagic)?;
    let payload = BASE64.decode(encoded)?;
    if payload.len() < NONCE_LEN {
        return Err(CipherError::Truncated);
    }
    let (nonce, cipher) = payload.split_at(NONCE_LEN);
    let mut buf = cipher.to_vec();
    apply_keystream(nonce, &mut buf);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn scramble_roundtrips_and_is_not_plaintext() {
        let plain = br#"{"apiKey":"secret"}"#;
        let encoded = scramble(plain);
        assert!(encoded.starts_with(FILE_MAGIC));
        assert!(!encoded.contains("secret"));
        assert_eq!(unscramble(&encoded).unwrap(), plain.to_vec());
    }

    #[test]
    fn unscramble_rejects_foreign_content() {
        let err = AppError::from(unscramble("not a config file").unwrap_err());
        assert_eq!(err.code(), "CONFIG/BAD_MAGIC");
        let err = AppError::from(unscramble("DBK1:!!!not-base64!!!").unwrap_err());
        assert_eq!(err.code(), "CONFIG/BAD_ENCODING");
    }

    #[test]
    fn token_budget_default_is_fully_materialized() {
        let store = ConfigStore::in_memory();
        let budget = store.get(KEY_TOKEN_BUDGET);
        assert_eq!(budget["dailyLimit"], 100_000);
        assert_eq!(budget["monthlyLimit"], 2_000_000);
        assert_eq!(budget["dailyUsed"], 0);
        assert_eq!(budget["monthlyUsed"], 0);
        assert_eq!(budget["lastResetDay"], "");
        assert_eq!(budget["lastResetMonth"], "");
    }

    #[test]
    fn set_is_observed_by_immediate_get() {
        let store = ConfigStore::in_memory();
        assert!(!store.get_bool(KEY_DEMO_MODE));
        store.set(KEY_DEMO_MODE, json!(true));
        assert!(store.get_bool(KEY_DEMO_MODE));
    }

    #[test]
    fn delete_restores_schema_default() {
        let store = ConfigStore::in_memory();
        store.set(KEY_API_KEY, json!("gsk_123456789"));
        store.delete(KEY_API_KEY);
        assert_eq!(store.get(KEY_API_KEY), json!(""));
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let store = ConfigStore::open(path.clone());
        store.set(KEY_AUTO_LAUNCH, json!(true));
        store.set(KEY_API_KEY, json!("gsk_abc"));
        drop(store);

        let reopened = ConfigStore::open(path);
        assert!(reopened.get_bool(KEY_AUTO_LAUNCH));
        assert_eq!(reopened.get_string(KEY_API_KEY), "gsk_abc");
    }

    #[test]
    fn corrupt_file_degrades_to_memory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "garbage, not a store file").unwrap();

        let store = ConfigStore::open(path.clone());
        // Contract still holds in degraded mode.
        store.set(KEY_DEMO_MODE, json!(true));
        assert!(store.get_bool(KEY_DEMO_MODE));
        // The corrupt file was not replaced behind the operator's back.
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "garbage, not a store file"
        );
    }

    #[test]
    fn unknown_keys_default_to_null() {
        let store = ConfigStore::in_memory();
        assert_eq!(store.get("neverHeardOfIt"), Value::Null);
    }
}
