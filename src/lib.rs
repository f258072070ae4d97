//! Asset Ingest Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod gallery;
pub mod ingestion;

// Re-export commonly used types for convenience
pub use gallery::{GalleryIndexer, NoOpGalleryIndexer, SqliteGalleryIndexer};
pub use ingestion::{
    BatchResult, CategoryRegistry, IngestionOrchestrator, IngestionOrchestratorConfig,
    StorageResolver, UploadRequest, UploadedFile,
};
