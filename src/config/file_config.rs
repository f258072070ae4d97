use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Storage roots (can override CLI)
    pub uploads_root: Option<String>,
    pub frontend_public_root: Option<String>,
    pub db_path: Option<String>,
    pub temp_dir: Option<String>,

    // Limits
    pub max_file_size: Option<u64>,
    pub max_extracted_size: Option<u64>,
    pub project_lookup_timeout_ms: Option<u64>,
    pub public_url_prefix: Option<String>,

    /// Project id to project code, e.g. `12 = "400_111"`.
    /// TOML table keys are strings, so ids are parsed on resolve.
    pub projects: Option<HashMap<String, String>>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
