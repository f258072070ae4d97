//! Upload categories: where each kind of upload lands and how it is treated.

use super::naming::NamingScheme;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that reject a whole upload batch before any file is written.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown upload category: {0}")]
    UnknownCategory(String),

    #[error("File type {extension:?} of {filename} is not allowed for category {category}")]
    DisallowedExtension {
        filename: String,
        extension: String,
        category: String,
    },

    #[error("Too many files for category {category}: {count} (max: {max})")]
    TooManyFiles {
        category: String,
        count: usize,
        max: usize,
    },

    #[error("No files in upload")]
    EmptyBatch,
}

/// Where files of a category are stored, relative to the configured roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DestinationTemplate {
    /// `<uploads_root>/projects/<code>/<category>`
    Backend,
    /// `<frontend_public_root>/<code>_project/<subdir>`
    Frontend { subdir: &'static str },
}

impl DestinationTemplate {
    pub fn render(
        &self,
        uploads_root: &Path,
        frontend_public_root: &Path,
        project_code: &str,
        category_key: &str,
    ) -> PathBuf {
        match self {
            Self::Backend => uploads_root
                .join("projects")
                .join(project_code)
                .join(category_key),
            Self::Frontend { subdir } => frontend_public_root
                .join(format!("{}_project", project_code))
                .join(subdir),
        }
    }
}

/// A single upload category.
#[derive(Debug, Clone, Serialize)]
pub struct UploadCategory {
    pub key: &'static str,
    pub destination: DestinationTemplate,
    /// Lowercase extensions including the leading dot.
    pub allowed_extensions: BTreeSet<&'static str>,
    pub max_files: usize,
    /// Served by the frontend; never indexed in the gallery.
    pub is_frontend_asset: bool,
    pub extract_zip: bool,
    pub preserve_structure: bool,
    pub auto_rename: bool,
    pub naming: Option<NamingScheme>,
}

impl UploadCategory {
    /// Check a filename against the allow-list, returning its normalized extension.
    pub fn check_extension(&self, filename: &str) -> Result<String, ValidationError> {
        let extension = extension_of(filename);
        if self.allowed_extensions.contains(extension.as_str()) {
            Ok(extension)
        } else {
            Err(ValidationError::DisallowedExtension {
                filename: filename.to_string(),
                extension,
                category: self.key.to_string(),
            })
        }
    }
}

/// Lowercase extension of `filename` with its leading dot, or an empty string.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png"];
const TILE_EXTENSIONS: &[&str] = &[
    ".json", ".b3dm", ".i3dm", ".pnts", ".cmpt", ".glb", ".gltf", ".bin",
];

struct CategoryDef {
    key: &'static str,
    destination: DestinationTemplate,
    extensions: &'static [&'static str],
    max_files: usize,
    extract_zip: bool,
    preserve_structure: bool,
    auto_rename: bool,
    naming: Option<NamingScheme>,
}

const CATEGORIES: &[CategoryDef] = &[
    CategoryDef {
        key: "drone_photos",
        destination: DestinationTemplate::Backend,
        extensions: &[".jpg", ".jpeg", ".png", ".tiff", ".tif"],
        max_files: 200,
        extract_zip: false,
        preserve_structure: false,
        auto_rename: false,
        naming: None,
    },
    CategoryDef {
        key: "view_360",
        destination: DestinationTemplate::Backend,
        extensions: IMAGE_EXTENSIONS,
        max_files: 100,
        extract_zip: false,
        preserve_structure: false,
        auto_rename: false,
        naming: None,
    },
    CategoryDef {
        key: "orthophoto",
        destination: DestinationTemplate::Backend,
        extensions: &[".tif", ".tiff", ".jpg", ".jpeg", ".png"],
        max_files: 50,
        extract_zip: false,
        preserve_structure: false,
        auto_rename: false,
        naming: None,
    },
    CategoryDef {
        key: "documents",
        destination: DestinationTemplate::Backend,
        extensions: &[".pdf", ".docx", ".xlsx", ".dwg", ".dxf", ".txt"],
        max_files: 50,
        extract_zip: false,
        preserve_structure: false,
        auto_rename: false,
        naming: None,
    },
    CategoryDef {
        key: "point_cloud",
        destination: DestinationTemplate::Backend,
        extensions: &[".las", ".laz", ".e57", ".ply", ".zip"],
        max_files: 20,
        extract_zip: true,
        preserve_structure: false,
        auto_rename: false,
        naming: None,
    },
    CategoryDef {
        key: "frontend_tiles",
        destination: DestinationTemplate::Frontend { subdir: "tiles" },
        extensions: TILE_EXTENSIONS,
        max_files: 5000,
        extract_zip: false,
        preserve_structure: false,
        auto_rename: true,
        naming: Some(NamingScheme::TilesetAssets),
    },
    CategoryDef {
        key: "frontend_tiles_zip",
        destination: DestinationTemplate::Frontend { subdir: "tiles" },
        extensions: &[".zip", ".rar", ".7z"],
        max_files: 1,
        extract_zip: true,
        preserve_structure: true,
        auto_rename: true,
        naming: Some(NamingScheme::TilesetAssets),
    },
    CategoryDef {
        key: "frontend_panorama",
        destination: DestinationTemplate::Frontend { subdir: "panorama" },
        extensions: &[".gltf", ".glb", ".bin", ".jpg", ".jpeg", ".png"],
        max_files: 200,
        extract_zip: false,
        preserve_structure: false,
        auto_rename: true,
        naming: Some(NamingScheme::PanoramaAssets),
    },
    CategoryDef {
        key: "frontend_panorama_zip",
        destination: DestinationTemplate::Frontend { subdir: "panorama" },
        extensions: &[".zip"],
        max_files: 1,
        extract_zip: true,
        preserve_structure: true,
        auto_rename: true,
        naming: Some(NamingScheme::PanoramaAssets),
    },
    CategoryDef {
        key: "frontend_boundary",
        destination: DestinationTemplate::Frontend { subdir: "boundary" },
        extensions: &[".geojson", ".kml", ".json"],
        max_files: 5,
        extract_zip: false,
        preserve_structure: false,
        auto_rename: true,
        naming: Some(NamingScheme::BoundaryAssets),
    },
];

/// Read-only table of upload categories.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    categories: Vec<UploadCategory>,
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CategoryRegistry {
    /// The built-in category table.
    pub fn builtin() -> Self {
        let categories = CATEGORIES
            .iter()
            .map(|def| UploadCategory {
                key: def.key,
                destination: def.destination.clone(),
                allowed_extensions: def.extensions.iter().copied().collect(),
                max_files: def.max_files,
                is_frontend_asset: matches!(def.destination, DestinationTemplate::Frontend { .. }),
                extract_zip: def.extract_zip,
                preserve_structure: def.preserve_structure,
                auto_rename: def.auto_rename,
                naming: def.naming,
            })
            .collect();
        Self { categories }
    }

    pub fn lookup(&self, key: &str) -> Result<&UploadCategory, ValidationError> {
        self.categories
            .iter()
            .find(|c| c.key == key)
            .ok_or_else(|| ValidationError::UnknownCategory(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.categories.iter().map(|c| c.key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UploadCategory> {
        self.categories.iter()
    }
}
