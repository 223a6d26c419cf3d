//! ImageNet class-index to name table.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{MigxError, Result};

/// Placeholder printed for indices missing from the table.
pub const UNKNOWN_LABEL: &str = "<unknown>";

/// Read-only mapping from class index to human-readable name.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    names: BTreeMap<usize, String>,
}

impl LabelTable {
    /// Parse a JSON object such as `{"0": "tench", "1": "goldfish"}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let object: Map<String, Value> = serde_json::from_str(json)?;
        let mut names = BTreeMap::new();
        for (key, value) in object {
            let index: usize = key
                .trim()
                .parse()
                .map_err(|_| MigxError::labels(format!("Invalid class index: {:?}", key)))?;
            let name = value
                .as_str()
                .ok_or_else(|| MigxError::labels(format!("Label {} is not a string", index)))?;
            names.insert(index, name.to_string());
        }
        Ok(Self { names })
    }

    /// Load the table from a local JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MigxError::FileNotFound(path.to_path_buf()));
        }
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Fetch the table from a remote JSON document.
    pub fn fetch(url: &str) -> Result<Self> {
        info!("Fetching labels: {}", url);
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("migx-rs/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| MigxError::labels(format!("HTTP client initialization failed: {}", e)))?;
        let body = client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|e| MigxError::labels(format!("Failed to fetch {}: {}", url, e)))?;
        let table = Self::from_json_str(&body)?;
        info!("Loaded {} labels", table.len());
        Ok(table)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(&index).map(String::as_str)
    }

    /// Name of `index`, or [`UNKNOWN_LABEL`].
    pub fn name_or_unknown(&self, index: usize) -> &str {
        self.get(index).unwrap_or(UNKNOWN_LABEL)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(usize, String)> for LabelTable {
    fn from_iter<I: IntoIterator<Item = (usize, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}
