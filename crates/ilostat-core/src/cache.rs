//! On-disk store for raw API responses.
//!
//! Ingest writes every response here verbatim; transform reads them back
//! without touching the network. Artifacts live at `<root>/<key>.<ext>` and a
//! save always replaces whatever was stored under the same key.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Logical key of the cached dataflow catalogue.
pub const CATALOGUE_KEY: &str = "dataflows";
/// Prefix of every cached dataflow data artifact.
pub const DATA_KEY_PREFIX: &str = "data_";

/// Key under which a dataflow's data is cached.
pub fn data_key(dataflow_id: &str) -> String {
    format!("{DATA_KEY_PREFIX}{dataflow_id}")
}

/// Payload shape of a raw artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactFormat {
    /// Tabular text (SDMX-CSV).
    Csv,
    /// Structured text (SDMX-JSON).
    Json,
}

impl ArtifactFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    /// Nothing was ever saved under this key.
    #[error("no cached artifact for key '{key}'")]
    NotFound { key: String },

    #[error("invalid cache key '{0}'")]
    InvalidKey(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Debug, Clone)]
pub struct RawCache {
    root: PathBuf,
}

impl RawCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Writes `payload` under `key`, replacing any earlier artifact.
    pub fn save(
        &self,
        key: &str,
        payload: &str,
        format: ArtifactFormat,
    ) -> Result<PathBuf, CacheError> {
        let path = self.path_for(key, format)?;
        fs::create_dir_all(&self.root)?;

        // Readers never observe a partially written artifact.
        let staging = path.with_extension(format!("{}.partial", format.extension()));
        fs::write(&staging, payload)?;
        fs::rename(&staging, &path)?;
        Ok(path)
    }

    pub fn load(&self, key: &str, format: ArtifactFormat) -> Result<String, CacheError> {
        let path = self.path_for(key, format)?;
        fs::read_to_string(&path).map_err(|error| match error.kind() {
            ErrorKind::NotFound => CacheError::NotFound {
                key: key.to_string(),
            },
            _ => CacheError::Io(error),
        })
    }

    pub fn save_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<PathBuf, CacheError> {
        let payload = serde_json::to_string(value)?;
        self.save(key, &payload, ArtifactFormat::Json)
    }

    pub fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<T, CacheError> {
        let payload = self.load(key, ArtifactFormat::Json)?;
        Ok(serde_json::from_str(&payload)?)
    }

    pub fn contains(&self, key: &str, format: ArtifactFormat) -> bool {
        self.path_for(key, format)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Keys of every `format` artifact whose key starts with `prefix`.
    ///
    /// A cache root that does not exist yet simply has no keys.
    pub fn list(
        &self,
        prefix: &str,
        format: ArtifactFormat,
    ) -> Result<BTreeSet<String>, CacheError> {
        let mut keys = BTreeSet::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(keys),
            Err(error) => return Err(error.into()),
        };

        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let has_extension = path
                .extension()
                .and_then(|extension| extension.to_str())
                .is_some_and(|extension| extension == format.extension());
            if !has_extension {
                continue;
            }
            if let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) {
                if key.starts_with(prefix) {
                    keys.insert(key.to_string());
                }
            }
        }

        Ok(keys)
    }

    fn path_for(&self, key: &str, format: ArtifactFormat) -> Result<PathBuf, CacheError> {
        let is_valid = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\', '\0']);
        if !is_valid {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.{}", format.extension())))
    }
}
