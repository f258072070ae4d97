use anyhow::{bail, Context, Result};
use asset_ingest::config::{AppConfig, CliConfig, FileConfig};
use asset_ingest::gallery::{GalleryIndexer, NoOpGalleryIndexer, SqliteGalleryIndexer};
use asset_ingest::ingestion::{
    CategoryRegistry, IngestionOrchestrator, IngestionOrchestratorConfig, ProjectCodeLookup,
    ProjectRef, StaticProjectDirectory, StorageResolver, UploadRequest, UploadedFile,
};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir().context("Cannot read current directory")?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
#[clap(about = "Ingest uploaded project assets into categorized storage")]
struct CliArgs {
    /// Files to upload as one batch.
    #[clap(value_parser = parse_path)]
    pub files: Vec<PathBuf>,

    /// Project id (digits) or project code.
    #[clap(long)]
    pub project: Option<String>,

    /// Upload category key, see --list-categories.
    #[clap(long)]
    pub category: Option<String>,

    /// Print the category registry as JSON and exit.
    #[clap(long)]
    pub list_categories: bool,

    /// Path to a TOML config file. Values in it override the CLI.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Root directory for backend uploads.
    #[clap(long, value_parser = parse_path)]
    pub uploads_root: Option<PathBuf>,

    /// Root of the frontend's public directory.
    #[clap(long, value_parser = parse_path)]
    pub frontend_public_root: Option<PathBuf>,

    /// Path to the SQLite gallery database. Indexing is skipped without it.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Staging directory for archives.
    #[clap(long, value_parser = parse_path)]
    pub temp_dir: Option<PathBuf>,

    /// Maximum size of a single file in bytes.
    #[clap(long)]
    pub max_file_size: Option<u64>,

    /// Maximum total decompressed size of one archive in bytes.
    #[clap(long)]
    pub max_extracted_size: Option<u64>,

    /// Timeout for resolving a project id to its code.
    #[clap(long)]
    pub project_lookup_timeout_ms: Option<u64>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            uploads_root: self.uploads_root.clone(),
            frontend_public_root: self.frontend_public_root.clone(),
            db_path: self.db_path.clone(),
            temp_dir: self.temp_dir.clone(),
            max_file_size: self.max_file_size,
            max_extracted_size: self.max_extracted_size,
            project_lookup_timeout_ms: self.project_lookup_timeout_ms,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    // Logs go to stderr, stdout carries the JSON result
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let registry = CategoryRegistry::builtin();

    if cli_args.list_categories {
        let categories: Vec<_> = registry.iter().collect();
        println!("{}", serde_json::to_string_pretty(&categories)?);
        return Ok(());
    }

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    let Some(project) = cli_args.project.as_deref() else {
        bail!("--project is required");
    };
    let Some(category) = cli_args.category.clone() else {
        bail!("--category is required");
    };

    let gallery: Arc<dyn GalleryIndexer> = match &config.db_path {
        Some(path) => {
            info!("Opening gallery database at {:?}...", path);
            Arc::new(SqliteGalleryIndexer::open(path)?)
        }
        None => {
            info!("No gallery database configured, indexing disabled");
            Arc::new(NoOpGalleryIndexer)
        }
    };

    let lookup: Option<Arc<dyn ProjectCodeLookup>> = if config.projects.is_empty() {
        None
    } else {
        Some(Arc::new(StaticProjectDirectory::new(config.projects.clone())))
    };
    let storage = StorageResolver::new(
        config.uploads_root.clone(),
        config.frontend_public_root.clone(),
        lookup,
        config.project_lookup_timeout,
    );

    let orchestrator = IngestionOrchestrator::new(
        registry,
        storage,
        gallery,
        IngestionOrchestratorConfig {
            temp_dir: config.temp_dir.clone(),
            max_file_size: config.max_file_size,
            max_extracted_size: config.max_extracted_size,
            public_url_prefix: config.public_url_prefix.clone(),
        },
    );

    let mut files = Vec::with_capacity(cli_args.files.len());
    for path in &cli_args.files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read upload: {:?}", path))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("Upload path has no file name: {:?}", path))?;
        files.push(UploadedFile::new(name, bytes));
    }

    let request = UploadRequest::new(ProjectRef::parse(project), category, files);
    match orchestrator.ingest(request).await {
        Ok(result) => {
            if result.failed() > 0 {
                warn!(
                    "{} of {} files failed, see the result for details",
                    result.failed(),
                    result.files.len()
                );
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(e) => {
            error!("Upload rejected: {}", e);
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "state": "REJECTED", "error": e.to_string() }))?
            );
            std::process::exit(1);
        }
    }
}
