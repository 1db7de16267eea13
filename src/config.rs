use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::filesystem::FilesystemAdapter;

/// A configuration key's write permission, local to the Configuration Store rather than a
/// generic OCPP 2.0.1 enum: OCPP 1.6's `GetConfiguration`/`ChangeConfiguration` only cares
/// about readOnly vs read-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutability {
    ReadOnly,
    ReadWrite,
}

/// A configuration value. Replaces the original C++ engine's templated `ConfigurationContainer`
/// with a plain sum type; OCPP 1.6 configuration keys are only ever int, bool or csv string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ConfigValue {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl ConfigValue {
    pub fn as_str(&self) -> String {
        match self {
            ConfigValue::Int(i) => i.to_string(),
            ConfigValue::Bool(b) => b.to_string(),
            ConfigValue::Str(s) => s.clone(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigEntry {
    value: ConfigValue,
    mutability: Mutability,
}

/// Keeps the full set of OCPP configuration keys in memory, persisting on every mutation so a
/// reboot never loses a CSMS-applied `ChangeConfiguration`.
///
/// Grounded on `Model/Configuration/Configuration.cpp`: a flat key/value table, read whole into
/// memory at boot and rewritten whole on every change (no WAL needed, configuration changes are
/// not transaction-critical).
pub struct ConfigStore {
    path: std::path::PathBuf,
    entries: BTreeMap<String, ConfigEntry>,
}

impl ConfigStore {
    pub fn load(
        fs: &mut dyn FilesystemAdapter,
        path: impl Into<std::path::PathBuf>,
    ) -> Result<Self, EngineError> {
        let path = path.into();
        let entries = if fs.exists(&path) {
            let data = fs
                .read(&path)
                .map_err(|e| EngineError::Filesystem(e.to_string()))?;
            serde_json::from_slice(&data)
                .map_err(|e| EngineError::Configuration(format!("corrupt config store: {e}")))?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn declare(&mut self, key: &str, default: ConfigValue, mutability: Mutability) {
        self.entries.entry(key.to_string()).or_insert(ConfigEntry {
            value: default,
            mutability,
        });
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn is_read_only(&self, key: &str) -> Option<bool> {
        self.entries.get(key).map(|e| e.mutability == Mutability::ReadOnly)
    }

    /// Applies a `ChangeConfiguration.req`. Returns an error if the key is unknown or read-only;
    /// callers map those onto `NotSupported`/`Rejected` per the OCPP 1.6 `ConfigurationStatus`.
    pub fn set(
        &mut self,
        fs: &mut dyn FilesystemAdapter,
        key: &str,
        value: ConfigValue,
    ) -> Result<(), EngineError> {
        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| EngineError::Configuration(format!("unknown key {key}")))?;
        if entry.mutability == Mutability::ReadOnly {
            return Err(EngineError::Configuration(format!("{key} is read-only")));
        }
        entry.value = value;
        self.persist(fs)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    fn persist(&self, fs: &mut dyn FilesystemAdapter) -> Result<(), EngineError> {
        let data = serde_json::to_vec(&self.entries)
            .map_err(|e| EngineError::Configuration(e.to_string()))?;
        fs.write(&self.path, &data)
            .map_err(|e| EngineError::Filesystem(e.to_string()))
    }
}

pub const CONFIG_STORE_PATH: &str = "config/configuration.json";
