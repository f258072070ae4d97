mod file_config;

pub use file_config::FileConfig;

use crate::ingestion::DEFAULT_MAX_EXTRACTED_SIZE;
use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 500 * 1024 * 1024;
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_PUBLIC_URL_PREFIX: &str = "/uploads";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub uploads_root: Option<PathBuf>,
    pub frontend_public_root: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub max_file_size: Option<u64>,
    pub max_extracted_size: Option<u64>,
    pub project_lookup_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub uploads_root: PathBuf,
    pub frontend_public_root: PathBuf,
    /// Gallery database. No gallery index is kept when unset.
    pub db_path: Option<PathBuf>,
    pub temp_dir: PathBuf,
    pub max_file_size: u64,
    /// Cap on the decompressed size of one archive.
    pub max_extracted_size: u64,
    pub project_lookup_timeout: Duration,
    pub public_url_prefix: String,
    pub projects: HashMap<i64, String>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let uploads_root = file
            .uploads_root
            .map(PathBuf::from)
            .or_else(|| cli.uploads_root.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "uploads_root must be specified via --uploads-root or in config file"
                )
            })?;

        if uploads_root.exists() && !uploads_root.is_dir() {
            bail!("uploads_root is not a directory: {:?}", uploads_root);
        }

        let frontend_public_root = file
            .frontend_public_root
            .map(PathBuf::from)
            .or_else(|| cli.frontend_public_root.clone())
            .unwrap_or_else(|| uploads_root.join("public"));

        let db_path = file.db_path.map(PathBuf::from).or_else(|| cli.db_path.clone());

        let temp_dir = file
            .temp_dir
            .map(PathBuf::from)
            .or_else(|| cli.temp_dir.clone())
            .unwrap_or_else(|| uploads_root.join(".staging"));

        let max_file_size = file
            .max_file_size
            .or(cli.max_file_size)
            .unwrap_or(DEFAULT_MAX_FILE_SIZE);
        if max_file_size == 0 {
            bail!("max_file_size must be greater than zero");
        }

        let max_extracted_size = file
            .max_extracted_size
            .or(cli.max_extracted_size)
            .unwrap_or(DEFAULT_MAX_EXTRACTED_SIZE);
        if max_extracted_size == 0 {
            bail!("max_extracted_size must be greater than zero");
        }

        let timeout_ms = file
            .project_lookup_timeout_ms
            .or(cli.project_lookup_timeout_ms)
            .unwrap_or(DEFAULT_LOOKUP_TIMEOUT_MS);

        let public_url_prefix = file
            .public_url_prefix
            .unwrap_or_else(|| DEFAULT_PUBLIC_URL_PREFIX.to_string());

        let mut projects = HashMap::new();
        for (id, code) in file.projects.unwrap_or_default() {
            let id: i64 = id
                .trim()
                .parse()
                .with_context(|| format!("Invalid project id in [projects]: {:?}", id))?;
            projects.insert(id, code);
        }

        Ok(Self {
            uploads_root,
            frontend_public_root,
            db_path,
            temp_dir,
            max_file_size,
            max_extracted_size,
            project_lookup_timeout: Duration::from_millis(timeout_ms),
            public_url_prefix,
            projects,
        })
    }
}
