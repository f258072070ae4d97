//! Canonical file naming and collision resolution.

use super::category::extension_of;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

/// Maximum number of numbered suffixes tried before giving up on a name.
pub const MAX_CONFLICT_ATTEMPTS: u32 = 100;

#[derive(Debug, Error)]
pub enum NamingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No free name for {name} after {attempts} attempts")]
    ConflictExhausted { name: String, attempts: u32 },
}

/// How a single extension is named within a scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingStrategy {
    /// Keep the uploaded name.
    PassThrough,
    /// `<prefix>_<project code><ext>`
    PrefixedWithCode(&'static str),
    /// A fixed filename.
    ExactName(&'static str),
}

/// A per-extension naming table shared by related upload categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamingScheme {
    PanoramaAssets,
    TilesetAssets,
    BoundaryAssets,
}

const PANORAMA_RULES: &[(&str, NamingStrategy)] =
    &[(".gltf", NamingStrategy::PrefixedWithCode("panorama"))];

const TILESET_RULES: &[(&str, NamingStrategy)] = &[
    (".json", NamingStrategy::PrefixedWithCode("sezyum")),
    (".b3dm", NamingStrategy::PassThrough),
    (".i3dm", NamingStrategy::PassThrough),
    (".pnts", NamingStrategy::PassThrough),
    (".cmpt", NamingStrategy::PassThrough),
    (".glb", NamingStrategy::PassThrough),
    (".gltf", NamingStrategy::PassThrough),
    (".bin", NamingStrategy::PassThrough),
];

const BOUNDARY_RULES: &[(&str, NamingStrategy)] = &[
    (".geojson", NamingStrategy::ExactName("boundary.geojson")),
    (".kml", NamingStrategy::ExactName("boundary.kml")),
];

impl NamingScheme {
    pub fn key(&self) -> &'static str {
        match self {
            Self::PanoramaAssets => "panorama-assets",
            Self::TilesetAssets => "tileset-assets",
            Self::BoundaryAssets => "boundary-assets",
        }
    }

    fn rules(&self) -> &'static [(&'static str, NamingStrategy)] {
        match self {
            Self::PanoramaAssets => PANORAMA_RULES,
            Self::TilesetAssets => TILESET_RULES,
            Self::BoundaryAssets => BOUNDARY_RULES,
        }
    }

    pub fn strategy_for(&self, extension: &str) -> Option<NamingStrategy> {
        self.rules()
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, strategy)| *strategy)
    }

    /// The name this scheme wants for `original`, or `None` when the name is kept.
    pub fn desired_name(&self, original: &str, project_code: &str) -> Option<String> {
        let extension = extension_of(original);
        match self.strategy_for(&extension)? {
            NamingStrategy::PassThrough => None,
            NamingStrategy::PrefixedWithCode(prefix) => {
                Some(format!("{}_{}{}", prefix, project_code, extension))
            }
            NamingStrategy::ExactName(name) => Some(name.to_string()),
        }
    }
}

/// Outcome of naming one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamingResult {
    pub original_filename: String,
    pub new_filename: String,
    pub renamed: bool,
    pub reason: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NamingResult {
    fn unchanged(original: &str, reason: &str) -> Self {
        Self {
            original_filename: original.to_string(),
            new_filename: original.to_string(),
            renamed: false,
            reason: reason.to_string(),
            success: true,
            error: None,
        }
    }

    fn renamed(original: &str, new_filename: String, desired: &str) -> Self {
        let reason = if new_filename == desired {
            "renamed to canonical name"
        } else {
            "renamed to canonical name with conflict suffix"
        };
        Self {
            original_filename: original.to_string(),
            new_filename,
            renamed: true,
            reason: reason.to_string(),
            success: true,
            error: None,
        }
    }

    fn failed(original: &str, error: String) -> Self {
        Self {
            original_filename: original.to_string(),
            new_filename: original.to_string(),
            renamed: false,
            reason: "rename failed".to_string(),
            success: false,
            error: Some(error),
        }
    }
}

/// Compute the on-disk name for `original_filename` in `target_dir`.
///
/// Files that already carry their canonical name are left alone, so calling
/// this twice on the same file is a no-op.
pub fn generate_file_name(
    scheme: NamingScheme,
    original_filename: &str,
    project_code: &str,
    target_dir: &Path,
) -> Result<NamingResult, NamingError> {
    let Some(desired) = scheme.desired_name(original_filename, project_code) else {
        return Ok(NamingResult::unchanged(
            original_filename,
            "no naming rule for extension",
        ));
    };

    if is_canonical(original_filename, &desired) {
        return Ok(NamingResult::unchanged(
            original_filename,
            "already has canonical name",
        ));
    }

    let final_name = resolve_name_conflict(&desired, target_dir)?;
    Ok(NamingResult::renamed(original_filename, final_name, &desired))
}

/// Return `desired_name` if it is free in `target_dir`, otherwise the first free
/// `<stem>_<n><ext>` with n starting at 2.
///
/// The check and the later write are not atomic; concurrent batches writing into
/// the same directory can still race.
pub fn resolve_name_conflict(desired_name: &str, target_dir: &Path) -> Result<String, NamingError> {
    if !target_dir.exists() || !target_dir.join(desired_name).exists() {
        return Ok(desired_name.to_string());
    }

    let (stem, extension) = split_name(desired_name);
    for n in 2..MAX_CONFLICT_ATTEMPTS + 2 {
        let candidate = format!("{}_{}{}", stem, n, extension);
        if !target_dir.join(&candidate).exists() {
            debug!("Name {} taken, using {}", desired_name, candidate);
            return Ok(candidate);
        }
    }

    Err(NamingError::ConflictExhausted {
        name: desired_name.to_string(),
        attempts: MAX_CONFLICT_ATTEMPTS,
    })
}

/// Rename files already present in `target_dir` to their canonical names.
///
/// Desired names are computed up front; renames then run one at a time so each
/// conflict check sees the previous renames. A failing file is reported in its
/// own result and the batch goes on.
pub async fn batch_rename(
    files: &[String],
    scheme: NamingScheme,
    project_code: &str,
    target_dir: &Path,
) -> Vec<NamingResult> {
    let planned: Vec<(&String, Option<String>)> = files
        .iter()
        .map(|f| (f, scheme.desired_name(f, project_code)))
        .collect();

    let mut results = Vec::with_capacity(planned.len());
    for (original, desired) in planned {
        let desired = match desired {
            None => {
                results.push(NamingResult::unchanged(
                    original,
                    "no naming rule for extension",
                ));
                continue;
            }
            Some(d) if is_canonical(original, &d) => {
                results.push(NamingResult::unchanged(
                    original,
                    "already has canonical name",
                ));
                continue;
            }
            Some(d) => d,
        };

        let final_name = match resolve_name_conflict(&desired, target_dir) {
            Ok(name) => name,
            Err(e) => {
                warn!("Cannot name {}: {}", original, e);
                results.push(NamingResult::failed(original, e.to_string()));
                continue;
            }
        };

        match fs::rename(target_dir.join(original), target_dir.join(&final_name)).await {
            Ok(()) => {
                debug!("Renamed {} -> {}", original, final_name);
                results.push(NamingResult::renamed(original, final_name, &desired));
            }
            Err(e) => {
                warn!("Failed to rename {} -> {}: {}", original, final_name, e);
                results.push(NamingResult::failed(original, e.to_string()));
            }
        }
    }
    results
}

/// `current` is `desired` or a conflict-suffixed copy of it (`<stem>_<n><ext>`).
fn is_canonical(current: &str, desired: &str) -> bool {
    if current == desired {
        return true;
    }
    let (stem, extension) = split_name(desired);
    current
        .strip_prefix(stem)
        .and_then(|rest| rest.strip_suffix(extension))
        .and_then(|rest| rest.strip_prefix('_'))
        .and_then(|n| n.parse::<u32>().ok())
        .is_some_and(|n| (2..MAX_CONFLICT_ATTEMPTS + 2).contains(&n))
}

/// Split `name` into stem and extension (with its dot).
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}
