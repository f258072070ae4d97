//! Request and result types for upload batches.

use super::archive::ExtractionSummary;
use super::storage::ProjectRef;
use serde::Serialize;
use std::path::PathBuf;

/// Where a batch is in the ingestion flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestionState {
    Received,
    Validated,
    Extracted,
    Renamed,
    Indexed,
    /// Every file was stored.
    Done,
    /// The batch failed validation; nothing was written.
    Rejected,
    /// The batch completed but at least one file failed.
    PartialFailure,
}

impl IngestionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Validated => "VALIDATED",
            Self::Extracted => "EXTRACTED",
            Self::Renamed => "RENAMED",
            Self::Indexed => "INDEXED",
            Self::Done => "DONE",
            Self::Rejected => "REJECTED",
            Self::PartialFailure => "PARTIAL_FAILURE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Rejected | Self::PartialFailure)
    }
}

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(original_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            original_name: original_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// A batch of files uploaded to one category of one project.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub project_ref: ProjectRef,
    pub category: String,
    pub files: Vec<UploadedFile>,
}

impl UploadRequest {
    pub fn new(
        project_ref: impl Into<ProjectRef>,
        category: impl Into<String>,
        files: Vec<UploadedFile>,
    ) -> Self {
        Self {
            project_ref: project_ref.into(),
            category: category.into(),
            files,
        }
    }
}

/// What happened to an extracted archive.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    /// Extracted files, relative to the destination directory.
    pub files: Vec<String>,
    pub skipped_entries: Vec<String>,
    pub structure: ExtractionSummary,
    /// Main file after renaming, relative to the destination directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_file: Option<String>,
    /// Main file name before renaming, when it was renamed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_file_renamed_from: Option<String>,
}

/// Result for one input file. Every input file gets exactly one.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub original_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted: Option<ExtractionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn stored(
        original_name: impl Into<String>,
        final_name: impl Into<String>,
        path: PathBuf,
        category: impl Into<String>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            final_name: Some(final_name.into()),
            path: Some(path),
            category: category.into(),
            extracted: None,
            renamed: None,
            error: None,
        }
    }

    pub fn failed(
        original_name: impl Into<String>,
        category: impl Into<String>,
        error: impl ToString,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            final_name: None,
            path: None,
            category: category.into(),
            extracted: None,
            renamed: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a whole batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// Correlates the batch's log lines.
    pub batch_id: String,
    pub files: Vec<FileOutcome>,
    pub project_code: String,
    pub state: IngestionState,
    /// Gallery records written for this batch.
    pub indexed: usize,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.len() - self.succeeded()
    }
}
