//! Asset ingestion for project uploads.
//!
//! Upload workflow:
//! 1. The batch is validated against its category (type, count)
//! 2. The destination directory is resolved from project and category
//! 3. Plain files are written under conflict-free names
//! 4. Archives are extracted safely and their root tileset located
//! 5. Files of naming-scheme categories get their canonical names
//! 6. Backend assets are recorded in the gallery index

mod archive;
mod category;
mod manager;
mod models;
mod naming;
mod storage;
mod tileset;

pub use archive::{
    check_entry_path, choose_main_file, extract, find_main_files, list_zip_entries, ArchiveEntry,
    ArchiveError, ArchiveKind, CandidateMainFile, ExtractOptions, ExtractionResult,
    ExtractionSummary, SecurityError, DEFAULT_MAX_EXTRACTED_SIZE, MAX_SCAN_DEPTH,
};
pub use category::{
    extension_of, CategoryRegistry, DestinationTemplate, UploadCategory, ValidationError,
};
pub use manager::{FileIngestError, IngestionOrchestrator, IngestionOrchestratorConfig};
pub use models::{
    BatchResult, ExtractionReport, FileOutcome, IngestionState, UploadRequest, UploadedFile,
};
pub use naming::{
    batch_rename, generate_file_name, resolve_name_conflict, NamingError, NamingResult,
    NamingScheme, NamingStrategy, MAX_CONFLICT_ATTEMPTS,
};
pub use storage::{
    DestinationError, ProjectCodeLookup, ProjectRef, ResolvedDestination, StaticProjectDirectory,
    StorageResolver,
};
pub use tileset::{
    get_tileset_priority, is_main_tileset_file, tileset_priority, ParsedTileset, ParseError,
};
