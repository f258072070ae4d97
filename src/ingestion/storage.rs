//! Resolving where a project's uploads are stored.

use super::category::UploadCategory;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

/// Looks up a project's human-readable code from its numeric id.
#[async_trait]
pub trait ProjectCodeLookup: Send + Sync {
    /// Returns `Ok(None)` when the project does not exist.
    async fn project_code(&self, project_id: i64) -> Result<Option<String>>;
}

/// Project codes held in memory, typically loaded from the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticProjectDirectory {
    codes: HashMap<i64, String>,
}

impl StaticProjectDirectory {
    pub fn new(codes: HashMap<i64, String>) -> Self {
        Self { codes }
    }
}

#[async_trait]
impl ProjectCodeLookup for StaticProjectDirectory {
    async fn project_code(&self, project_id: i64) -> Result<Option<String>> {
        Ok(self.codes.get(&project_id).cloned())
    }
}

/// How an upload names its project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectRef {
    Id(i64),
    Code(String),
}

impl ProjectRef {
    /// Anything made only of digits is an id; everything else is a code.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(id) = trimmed.parse() {
                return Self::Id(id);
            }
        }
        Self::Code(trimmed.to_string())
    }

    /// The reference as the caller gave it, used as the gallery project id.
    pub fn as_raw(&self) -> String {
        match self {
            Self::Id(id) => id.to_string(),
            Self::Code(code) => code.clone(),
        }
    }
}

impl From<i64> for ProjectRef {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for ProjectRef {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

/// The destination directory could not be created.
#[derive(Debug, Error)]
#[error("Cannot create {dir:?} for project {project_code}: {source}")]
pub struct DestinationError {
    pub project_code: String,
    pub dir: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// A resolved destination for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDestination {
    pub project_code: String,
    pub dir: PathBuf,
}

/// Maps (project, category) to a directory on disk.
pub struct StorageResolver {
    uploads_root: PathBuf,
    frontend_public_root: PathBuf,
    lookup: Option<Arc<dyn ProjectCodeLookup>>,
    lookup_timeout: Duration,
}

impl StorageResolver {
    pub fn new(
        uploads_root: impl Into<PathBuf>,
        frontend_public_root: impl Into<PathBuf>,
        lookup: Option<Arc<dyn ProjectCodeLookup>>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            uploads_root: uploads_root.into(),
            frontend_public_root: frontend_public_root.into(),
            lookup,
            lookup_timeout,
        }
    }

    pub fn uploads_root(&self) -> &Path {
        &self.uploads_root
    }

    pub fn frontend_public_root(&self) -> &Path {
        &self.frontend_public_root
    }

    /// The path segment used for a project. Never fails: numeric ids whose code
    /// cannot be found in time fall back to the id itself.
    pub async fn project_code(&self, project_ref: &ProjectRef) -> String {
        match project_ref {
            ProjectRef::Code(code) => sanitize_code(code),
            ProjectRef::Id(id) => {
                let Some(lookup) = &self.lookup else {
                    return id.to_string();
                };
                match tokio::time::timeout(self.lookup_timeout, lookup.project_code(*id)).await {
                    Ok(Ok(Some(code))) => sanitize_code(&code),
                    Ok(Ok(None)) => {
                        debug!("No code for project {}, using id", id);
                        id.to_string()
                    }
                    Ok(Err(e)) => {
                        warn!("Project code lookup failed for {}: {}", id, e);
                        id.to_string()
                    }
                    Err(_) => {
                        warn!(
                            "Project code lookup for {} timed out after {:?}",
                            id, self.lookup_timeout
                        );
                        id.to_string()
                    }
                }
            }
        }
    }

    /// Directory for `category` uploads of `project_code`, without touching disk.
    pub fn destination_dir(&self, project_code: &str, category: &UploadCategory) -> PathBuf {
        category.destination.render(
            &self.uploads_root,
            &self.frontend_public_root,
            project_code,
            category.key,
        )
    }

    /// Resolve and create (if missing) the destination directory.
    pub async fn resolve(
        &self,
        project_ref: &ProjectRef,
        category: &UploadCategory,
    ) -> Result<ResolvedDestination, DestinationError> {
        let project_code = self.project_code(project_ref).await;
        let dir = self.destination_dir(&project_code, category);
        match fs::create_dir_all(&dir).await {
            Ok(()) => Ok(ResolvedDestination { project_code, dir }),
            Err(source) => Err(DestinationError {
                project_code,
                dir,
                source,
            }),
        }
    }
}

/// Keep codes usable as a single path segment.
fn sanitize_code(code: &str) -> String {
    let sanitized: String = code
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' => c,
            _ => '_',
        })
        .collect();
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}
