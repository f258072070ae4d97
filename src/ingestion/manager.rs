//! Ingestion orchestrator - drives one upload batch end to end.
//!
//! Batch flow:
//! 1. RECEIVED: category lookup and batch validation (fail fast, nothing written)
//! 2. VALIDATED: destination resolved and created
//! 3. EXTRACTED: archives unpacked, main file renamed for structured categories
//! 4. RENAMED: plain files moved to their canonical names
//! 5. INDEXED: backend assets recorded in the gallery
//! 6. DONE, or PARTIAL_FAILURE when any file failed

use super::archive::{
    self, choose_main_file, ArchiveError, ArchiveKind, CandidateMainFile, ExtractOptions,
    DEFAULT_MAX_EXTRACTED_SIZE,
};
use super::category::{CategoryRegistry, UploadCategory, ValidationError};
use super::models::{
    BatchResult, ExtractionReport, FileOutcome, IngestionState, UploadRequest, UploadedFile,
};
use super::naming::{batch_rename, generate_file_name, resolve_name_conflict, NamingError, NamingScheme};
use super::storage::StorageResolver;
use crate::gallery::{GalleryAsset, GalleryIndexer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Errors scoped to a single file of a batch.
#[derive(Debug, Error)]
pub enum FileIngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("File too large: {0} bytes (max: {1})")]
    FileTooLarge(u64, u64),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Naming error: {0}")]
    Naming(#[from] NamingError),

    #[error("Destination unavailable: {0}")]
    Destination(String),
}

/// Configuration for the IngestionOrchestrator.
#[derive(Debug, Clone)]
pub struct IngestionOrchestratorConfig {
    /// Directory for staging archives before extraction.
    pub temp_dir: PathBuf,
    /// Maximum size of a single uploaded file in bytes.
    pub max_file_size: u64,
    /// Maximum total decompressed size of one archive in bytes.
    pub max_extracted_size: u64,
    /// URL prefix under which the uploads root is served.
    pub public_url_prefix: String,
}

impl Default for IngestionOrchestratorConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir().join("asset-ingest"),
            max_file_size: 500 * 1024 * 1024, // 500 MB for zip files
            max_extracted_size: DEFAULT_MAX_EXTRACTED_SIZE,
            public_url_prefix: "/uploads".to_string(),
        }
    }
}

/// Per-batch values shared by every file.
struct BatchContext<'a> {
    category: &'a UploadCategory,
    project_code: &'a str,
    dest_dir: &'a Path,
}

/// Runs upload batches through validation, storage, extraction, renaming and indexing.
pub struct IngestionOrchestrator {
    registry: CategoryRegistry,
    storage: StorageResolver,
    gallery: Arc<dyn GalleryIndexer>,
    config: IngestionOrchestratorConfig,
}

impl IngestionOrchestrator {
    pub fn new(
        registry: CategoryRegistry,
        storage: StorageResolver,
        gallery: Arc<dyn GalleryIndexer>,
        config: IngestionOrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            storage,
            gallery,
            config,
        }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Batch-level checks. Any failure rejects the whole batch.
    pub fn validate(&self, request: &UploadRequest) -> Result<&UploadCategory, ValidationError> {
        let category = self.registry.lookup(&request.category)?;

        if request.files.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        if request.files.len() > category.max_files {
            return Err(ValidationError::TooManyFiles {
                category: category.key.to_string(),
                count: request.files.len(),
                max: category.max_files,
            });
        }
        for file in &request.files {
            category.check_extension(upload_base_name(&file.original_name))?;
        }
        Ok(category)
    }

    // =========================================================================
    // Batch
    // =========================================================================

    /// Ingest one batch. Only validation errors are returned as `Err`; everything
    /// else is reported on the affected file.
    pub async fn ingest(&self, request: UploadRequest) -> Result<BatchResult, ValidationError> {
        let batch_id = Uuid::new_v4().to_string();
        let mut state = IngestionState::Received;
        debug!(
            "Batch {} received: {} files for {}",
            batch_id,
            request.files.len(),
            request.category
        );

        let category = match self.validate(&request) {
            Ok(category) => category,
            Err(e) => {
                advance(&mut state, IngestionState::Rejected, &request.category);
                warn!("Rejected upload batch for {}: {}", request.category, e);
                return Err(e);
            }
        };
        advance(&mut state, IngestionState::Validated, category.key);

        let (project_code, dest_dir) =
            match self.storage.resolve(&request.project_ref, category).await {
                Ok(resolved) => (resolved.project_code, resolved.dir),
                Err(e) => {
                    error!("Batch {}: {}", batch_id, e);
                    let files = request
                        .files
                        .iter()
                        .map(|f| {
                            FileOutcome::failed(
                                &f.original_name,
                                category.key,
                                FileIngestError::Destination(e.source.to_string()),
                            )
                        })
                        .collect();
                    advance(&mut state, IngestionState::PartialFailure, category.key);
                    return Ok(BatchResult {
                        batch_id,
                        files,
                        project_code: e.project_code,
                        state,
                        indexed: 0,
                    });
                }
            };

        let ctx = BatchContext {
            category,
            project_code: &project_code,
            dest_dir: &dest_dir,
        };

        // Removed with everything left in it when the batch ends.
        let mut staging: Option<TempDir> = None;
        let mut outcomes = Vec::with_capacity(request.files.len());
        let mut stored_plain = Vec::new();

        for file in &request.files {
            let extract = should_extract(category, &file.original_name);
            let result = if extract {
                self.ingest_archive(&ctx, file, &mut staging).await
            } else {
                self.store_file(&ctx, file).await
            };

            match result {
                Ok(outcome) => {
                    if !extract {
                        stored_plain.push(outcomes.len());
                    }
                    outcomes.push(outcome);
                }
                Err(e) => {
                    warn!("Failed to ingest {}: {}", file.original_name, e);
                    outcomes.push(FileOutcome::failed(&file.original_name, category.key, e));
                }
            }
        }

        if outcomes.iter().any(|o| o.extracted.is_some()) {
            advance(&mut state, IngestionState::Extracted, category.key);
        }

        if let Some(scheme) = category.naming.filter(|_| category.auto_rename) {
            if !stored_plain.is_empty() {
                self.rename_stored(&ctx, scheme, &mut outcomes, &stored_plain)
                    .await;
                advance(&mut state, IngestionState::Renamed, category.key);
            }
        }

        let indexed = self.index(&request, &ctx, &outcomes);
        advance(&mut state, IngestionState::Indexed, category.key);

        let mut result = BatchResult {
            batch_id,
            files: outcomes,
            project_code,
            state,
            indexed,
        };
        let final_state = if result.failed() == 0 {
            IngestionState::Done
        } else {
            IngestionState::PartialFailure
        };
        advance(&mut result.state, final_state, category.key);

        info!(
            "Batch {}: ingested {} of {} files into {} for project {} ({} indexed)",
            result.batch_id,
            result.succeeded(),
            result.files.len(),
            category.key,
            result.project_code,
            result.indexed
        );

        Ok(result)
    }

    // =========================================================================
    // Per-file
    // =========================================================================

    fn check_size(&self, file: &UploadedFile) -> Result<(), FileIngestError> {
        let size = file.bytes.len() as u64;
        if size > self.config.max_file_size {
            return Err(FileIngestError::FileTooLarge(size, self.config.max_file_size));
        }
        Ok(())
    }

    /// Write a plain upload into the destination under a free name.
    async fn store_file(
        &self,
        ctx: &BatchContext<'_>,
        file: &UploadedFile,
    ) -> Result<FileOutcome, FileIngestError> {
        let name = sanitize_filename(&file.original_name)?;
        self.check_size(file)?;

        let final_name = resolve_name_conflict(&name, ctx.dest_dir)?;
        let path = ctx.dest_dir.join(&final_name);
        write_file(&path, &file.bytes).await?;

        debug!("Stored {} as {:?}", file.original_name, path);
        Ok(FileOutcome::stored(
            &file.original_name,
            final_name,
            path,
            ctx.category.key,
        ))
    }

    /// Stage an archive, extract it into the destination and name its main file.
    async fn ingest_archive(
        &self,
        ctx: &BatchContext<'_>,
        file: &UploadedFile,
        staging: &mut Option<TempDir>,
    ) -> Result<FileOutcome, FileIngestError> {
        let name = sanitize_filename(&file.original_name)?;
        self.check_size(file)?;

        let staging_dir = if let Some(dir) = staging.as_ref() {
            dir.path().to_path_buf()
        } else {
            fs::create_dir_all(&self.config.temp_dir).await?;
            let dir = tempfile::Builder::new()
                .prefix("batch-")
                .tempdir_in(&self.config.temp_dir)?;
            let path = dir.path().to_path_buf();
            *staging = Some(dir);
            path
        };

        let staged = staging_dir.join(&name);
        write_file(&staged, &file.bytes).await?;

        let opts = ExtractOptions {
            file_types: main_file_types(ctx.category),
            preserve_structure: ctx.category.preserve_structure,
            max_extracted_size: self.config.max_extracted_size,
        };
        let result = archive::extract(&staged, ctx.dest_dir, &opts).await?;

        match fs::remove_file(&staged).await {
            Ok(()) => debug!("Removed source archive {:?}", staged),
            Err(e) => warn!("Failed to remove source archive {:?}: {}", staged, e),
        }

        let mut report = ExtractionReport {
            files: result
                .extracted_files
                .iter()
                .map(|p| relative_to(p, ctx.dest_dir))
                .collect(),
            skipped_entries: result.skipped_entries,
            structure: result.structure,
            main_file: None,
            main_file_renamed_from: None,
        };

        let mut outcome =
            FileOutcome::stored(&file.original_name, &name, ctx.dest_dir.to_path_buf(), ctx.category.key);
        outcome.renamed = Some(false);

        if ctx.category.preserve_structure {
            if let Some(scheme) = ctx.category.naming {
                match choose_main_file(&result.main_files) {
                    Some(main) => {
                        let (main_path, renamed) =
                            self.rename_main_file(ctx, scheme, main).await?;
                        let main_relative = relative_to(&main_path, ctx.dest_dir);

                        if renamed {
                            if let Some(entry) =
                                report.files.iter_mut().find(|f| **f == main.relative_path)
                            {
                                *entry = main_relative.clone();
                            }
                            report.main_file_renamed_from = Some(main.filename.clone());
                        }
                        report.main_file = Some(main_relative);
                        outcome.final_name = main_path
                            .file_name()
                            .map(|n| n.to_string_lossy().to_string());
                        outcome.path = Some(main_path);
                        outcome.renamed = Some(renamed);
                    }
                    None => info!("No main file found in {}", name),
                }
            }
        }

        outcome.extracted = Some(report);
        Ok(outcome)
    }

    /// Rename the chosen main file in place. Returns its final path and whether it moved.
    async fn rename_main_file(
        &self,
        ctx: &BatchContext<'_>,
        scheme: NamingScheme,
        main: &CandidateMainFile,
    ) -> Result<(PathBuf, bool), FileIngestError> {
        let parent = main.absolute_path.parent().unwrap_or(ctx.dest_dir);
        let naming = generate_file_name(scheme, &main.filename, ctx.project_code, parent)?;
        let new_path = parent.join(&naming.new_filename);

        if naming.renamed {
            fs::rename(&main.absolute_path, &new_path).await?;
            info!(
                "Main file {} renamed to {} ({})",
                main.relative_path, naming.new_filename, naming.reason
            );
        } else {
            debug!("Main file {} kept: {}", main.relative_path, naming.reason);
        }
        Ok((new_path, naming.renamed))
    }

    /// Move stored plain files to their canonical names.
    async fn rename_stored(
        &self,
        ctx: &BatchContext<'_>,
        scheme: NamingScheme,
        outcomes: &mut [FileOutcome],
        indices: &[usize],
    ) {
        let targets: Vec<(usize, String)> = indices
            .iter()
            .filter_map(|&i| outcomes[i].final_name.clone().map(|n| (i, n)))
            .collect();
        let names: Vec<String> = targets.iter().map(|(_, n)| n.clone()).collect();

        let results = batch_rename(&names, scheme, ctx.project_code, ctx.dest_dir).await;

        for ((index, _), result) in targets.into_iter().zip(results) {
            let outcome = &mut outcomes[index];
            outcome.renamed = Some(result.renamed);
            if result.success {
                outcome.path = Some(ctx.dest_dir.join(&result.new_filename));
                outcome.final_name = Some(result.new_filename);
            } else {
                outcome.error = Some(format!(
                    "Rename failed: {}",
                    result.error.unwrap_or_default()
                ));
            }
        }
    }

    // =========================================================================
    // Indexing
    // =========================================================================

    /// Record successful backend files. Failures are logged; files stay on disk.
    fn index(&self, request: &UploadRequest, ctx: &BatchContext<'_>, outcomes: &[FileOutcome]) -> usize {
        if ctx.category.is_frontend_asset {
            debug!("Category {} is served by the frontend, not indexed", ctx.category.key);
            return 0;
        }

        let project_id = request.project_ref.as_raw();
        let mut assets = Vec::new();
        for outcome in outcomes.iter().filter(|o| o.is_success()) {
            match (&outcome.extracted, &outcome.final_name) {
                (Some(report), _) => {
                    for relative in &report.files {
                        assets.push(self.gallery_asset(ctx, &project_id, relative, relative));
                    }
                }
                (None, Some(final_name)) => {
                    assets.push(self.gallery_asset(
                        ctx,
                        &project_id,
                        final_name,
                        &outcome.original_name,
                    ));
                }
                (None, None) => {}
            }
        }

        match self.gallery.record(&assets) {
            Ok(count) => count,
            Err(e) => {
                error!(
                    "Failed to index {} assets for project {}: {:#}",
                    assets.len(),
                    ctx.project_code,
                    e
                );
                0
            }
        }
    }

    fn gallery_asset(
        &self,
        ctx: &BatchContext<'_>,
        project_id: &str,
        filename: &str,
        title_source: &str,
    ) -> GalleryAsset {
        let url = format!(
            "{}/projects/{}/{}/{}",
            self.config.public_url_prefix.trim_end_matches('/'),
            ctx.project_code,
            ctx.category.key,
            filename
        );
        let base = upload_base_name(title_source);
        let title = Path::new(base)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(base);
        GalleryAsset::new(ctx.category.key, filename, url, title, project_id)
    }
}

fn advance(state: &mut IngestionState, next: IngestionState, category: &str) {
    debug_assert!(
        !state.is_terminal(),
        "batch for {} already finished as {}",
        category,
        state.as_str()
    );
    debug!("Batch for {}: {} -> {}", category, state.as_str(), next.as_str());
    *state = next;
}

fn should_extract(category: &UploadCategory, filename: &str) -> bool {
    category.extract_zip && ArchiveKind::from_filename(upload_base_name(filename)).is_some()
}

/// Extensions searched for the main file of an extracted archive.
fn main_file_types(category: &UploadCategory) -> Vec<String> {
    let types: &[&str] = match category.naming {
        Some(NamingScheme::PanoramaAssets) => &[".gltf", ".json"],
        _ => &[".json"],
    };
    types.iter().map(|t| t.to_string()).collect()
}

/// Last path segment of a client-supplied name, for either separator style.
fn upload_base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

fn relative_to(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

async fn write_file(path: &Path, data: &[u8]) -> Result<(), std::io::Error> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    Ok(())
}

/// Sanitize an uploaded filename to prevent path traversal attacks.
fn sanitize_filename(filename: &str) -> Result<String, FileIngestError> {
    let name = upload_base_name(filename);

    // Null bytes, hidden files and bare dot names are never stored
    if name.is_empty() || name.contains('\0') || name.starts_with('.') {
        return Err(FileIngestError::InvalidFilename(filename.to_string()));
    }

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect();

    Ok(sanitized)
}
