//! Configuration loading and precedence.
//!
//! Two YAML documents configure the engine:
//!
//! - **Global config** (`<XDG config dir>/vt/config.yaml`): personal
//!   settings including the API key.
//! - **Local config** (`<tree>/.vt/config.yaml`): per-tree overrides.
//!
//! The global document loads first; the local one overrides it per key via
//! deep merge. Unknown keys are rejected on write (strict) but tolerated on
//! read, so older binaries keep working against newer config files.
//!
//! A process-global cache folder (`<XDG cache dir>/vt/cache.json`) holds
//! the last-successful-auth timestamp and the last-seen upstream version.

use std::fs;
use std::path::{Path, PathBuf};

use etcetera::base_strategy::{BaseStrategy, choose_base_strategy};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::VtError;
use crate::meta::Meta;

/// Environment variable carrying the bearer token; overrides any config.
pub const API_KEY_ENV: &str = "VAL_TOWN_API_KEY";

/// Environment variable overriding the global config/cache base.
pub const CONFIG_DIR_ENV: &str = "VT_CONFIG_DIR";

/// Top-level keys the engine understands; writes reject anything else.
const KNOWN_KEYS: &[&str] = &["apiKey", "editorFiles", "renameThreshold"];

/// The merged configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VtConfig {
    /// Bearer token for the remote API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Whether `create` materializes editor template files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_files: Option<bool>,

    /// Similarity threshold for rename detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename_threshold: Option<f64>,
}

impl VtConfig {
    /// Resolve the API key: environment first, then config.
    pub fn api_key(&self) -> Result<String, VtError> {
        if let Ok(key) = std::env::var(API_KEY_ENV)
            && !key.is_empty()
        {
            return Ok(key);
        }
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(VtError::Auth)
    }

    /// Effective rename threshold.
    pub fn rename_threshold(&self) -> f64 {
        self.rename_threshold
            .unwrap_or(crate::status::RENAME_DETECTION_THRESHOLD)
    }
}

fn strategy() -> Result<impl BaseStrategy, VtError> {
    choose_base_strategy().map_err(|e| VtError::ConfigInvalid {
        msg: format!("cannot locate config directory: {e}"),
    })
}

/// Path of the global config document.
pub fn global_config_path() -> Result<PathBuf, VtError> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir).join("config.yaml"));
    }
    Ok(strategy()?.config_dir().join("vt").join("config.yaml"))
}

/// Path of the process-global cache document.
pub fn cache_path() -> Result<PathBuf, VtError> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir).join("cache.json"));
    }
    Ok(strategy()?.cache_dir().join("vt").join("cache.json"))
}

/// Merge `overlay` into `base` per key, recursing into mappings.
fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Mapping(base_map)
        }
        (_, overlay) => overlay,
    }
}

fn load_yaml(path: &Path) -> Result<Value, VtError> {
    match fs::read_to_string(path) {
        Ok(text) => serde_yaml::from_str(&text).map_err(|e| VtError::ConfigInvalid {
            msg: format!("{}: {e}", path.display()),
        }),
        Err(_) => Ok(Value::Null),
    }
}

/// Load and merge specific config documents.
///
/// Reads are tolerant: keys this binary doesn't know are dropped at
/// deserialization rather than rejected.
pub fn load_from(global_path: &Path, root: Option<&Path>) -> Result<VtConfig, VtError> {
    let mut merged = load_yaml(global_path)?;
    if let Some(root) = root {
        let local = load_yaml(&Meta::at(root).local_config_path())?;
        merged = deep_merge(merged, local);
    }
    if merged.is_null() {
        return Ok(VtConfig::default());
    }
    serde_yaml::from_value(merged).map_err(|e| VtError::ConfigInvalid { msg: e.to_string() })
}

/// Load the merged config for a working tree (pass `None` outside one).
pub fn load(root: Option<&Path>) -> Result<VtConfig, VtError> {
    load_from(&global_config_path()?, root)
}

/// Persist a config document, rejecting unknown top-level keys.
pub fn save(path: &Path, config: &VtConfig) -> Result<(), VtError> {
    let value = serde_yaml::to_value(config)?;
    if let Value::Mapping(map) = &value {
        for key in map.keys() {
            let name = key.as_str().unwrap_or_default();
            if !KNOWN_KEYS.contains(&name) {
                return Err(VtError::ConfigInvalid {
                    msg: format!("unknown config key {name:?}"),
                });
            }
        }
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_yaml::to_string(config)?)?;
    Ok(())
}

/// Upgrade-check and auth bookkeeping, stored in the cache folder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VtCache {
    /// Milliseconds since epoch of the last successful authentication
    #[serde(default)]
    pub last_auth_at: Option<i64>,

    /// Version string of the newest release seen by the upgrade check
    #[serde(default)]
    pub latest_seen_version: Option<String>,
}

impl VtCache {
    /// Load the cache, treating a missing or unreadable file as empty.
    pub fn load() -> Self {
        cache_path()
            .ok()
            .and_then(|p| fs::read_to_string(p).ok())
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default()
    }

    pub fn save(&self) -> Result<(), VtError> {
        let path = cache_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
