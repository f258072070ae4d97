//! Heuristics for spotting the root tileset (or glTF scene) among extracted fragments.
//!
//! Scoring is a pure function of the filename and, optionally, a shallow parse of
//! the file's JSON. Anything that fails to read or parse simply earns no content
//! bonus.

use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Top-level JSON value is not an object")]
    NotAnObject,
}

/// Names that are always treated as the root file.
const MAIN_EXACT_NAMES: &[&str] = &["tileset.json", "scene.json", "root.json", "production.json"];

/// Name prefixes that mark the root file.
const MAIN_PREFIXES: &[&str] = &["production", "master", "main"];

/// Exact names with a fixed priority that skips all other scoring.
const EXACT_PRIORITIES: &[(&str, i32)] = &[
    ("tileset.json", 1000),
    ("scene.json", 900),
    ("root.json", 800),
];

const PREFIX_BONUSES: &[(&str, i32)] = &[("production", 700), ("master", 650), ("main", 600)];

const SUBSTRING_BONUSES: &[(&str, i32)] = &[("tileset", 500), ("scene", 450), ("root", 400)];

const BASE_PRIORITY: i32 = 10;
const SUB_TILE_PENALTY: i32 = 100;
const JSON_BONUS: i32 = 50;

/// The fields of a tileset or glTF document the heuristics look at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTileset {
    /// `asset.version` is present.
    pub has_asset_version: bool,
    /// A `root` node is present.
    pub has_root: bool,
    /// Top-level `geometricError`, falling back to `root.geometricError`.
    pub geometric_error: Option<f64>,
    /// Length of `root.children`.
    pub child_count: usize,
    /// `root.boundingVolume.sphere[3]`.
    pub sphere_radius: Option<f64>,
    /// `root.content.uri` (or the legacy `root.content.url`).
    pub content_uri: Option<String>,
    /// Both `scene` and `scenes` are present.
    pub is_gltf_scene: bool,
}

impl ParsedTileset {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, ParseError> {
        let obj = value.as_object().ok_or(ParseError::NotAnObject)?;
        let root = obj.get("root").filter(|r| r.is_object());

        let has_asset_version = obj
            .get("asset")
            .and_then(|a| a.get("version"))
            .is_some_and(|v| !v.is_null());

        let geometric_error = obj
            .get("geometricError")
            .and_then(Value::as_f64)
            .or_else(|| root.and_then(|r| r.get("geometricError")).and_then(Value::as_f64));

        let child_count = root
            .and_then(|r| r.get("children"))
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);

        let sphere_radius = root
            .and_then(|r| r.get("boundingVolume"))
            .and_then(|b| b.get("sphere"))
            .and_then(Value::as_array)
            .and_then(|s| s.get(3))
            .and_then(Value::as_f64);

        let content_uri = root
            .and_then(|r| r.get("content"))
            .and_then(|c| c.get("uri").or_else(|| c.get("url")))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            has_asset_version,
            has_root: root.is_some(),
            geometric_error,
            child_count,
            sphere_radius,
            content_uri,
            is_gltf_scene: obj.contains_key("scene") && obj.contains_key("scenes"),
        })
    }

    pub fn is_tileset(&self) -> bool {
        self.has_asset_version && self.has_root
    }
}

/// Read and shallow-parse a JSON document from disk.
pub fn load_document(path: &Path) -> Result<ParsedTileset, ParseError> {
    let bytes = std::fs::read(path)?;
    ParsedTileset::from_slice(&bytes)
}

/// Whether files with this extension are parsed for content heuristics.
pub fn is_json_like(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    lower.ends_with(".json") || lower.ends_with(".gltf")
}

/// Naming-only part of the main-file check.
pub fn is_main_by_name(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    MAIN_EXACT_NAMES.contains(&lower.as_str())
        || MAIN_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Content part of the main-file check.
pub fn is_main_by_content(doc: &ParsedTileset) -> bool {
    if doc.is_tileset() {
        if doc.geometric_error.is_some_and(|e| e > 200.0)
            || doc.child_count > 1
            || doc.sphere_radius.is_some_and(|r| r > 300.0)
        {
            return true;
        }
        // A root whose content lives under Data/ is a fragment of a larger set.
        return !doc
            .content_uri
            .as_deref()
            .is_some_and(|uri| uri.starts_with("Data/"));
    }
    doc.is_gltf_scene
}

/// Whether the file at `path` looks like the root tileset or scene.
pub fn is_main_tileset_file(filename: &str, path: &Path) -> bool {
    if is_main_by_name(filename) {
        return true;
    }
    if !is_json_like(filename) {
        return false;
    }
    match load_document(path) {
        Ok(doc) => is_main_by_content(&doc),
        Err(_) => false,
    }
}

/// Score a candidate; higher means more likely to be the root tileset.
pub fn tileset_priority(filename: &str, doc: Option<&ParsedTileset>) -> i32 {
    let lower = filename.to_lowercase();

    if let Some((_, priority)) = EXACT_PRIORITIES.iter().find(|(name, _)| *name == lower) {
        return *priority;
    }

    let mut priority = BASE_PRIORITY;

    priority += PREFIX_BONUSES
        .iter()
        .filter(|(prefix, _)| lower.starts_with(prefix))
        .map(|(_, bonus)| bonus)
        .sum::<i32>();

    priority += SUBSTRING_BONUSES
        .iter()
        .filter(|(needle, _)| lower.contains(needle))
        .map(|(_, bonus)| bonus)
        .sum::<i32>();

    if let Some(doc) = doc.filter(|d| d.has_root) {
        priority += match doc.geometric_error {
            Some(e) if e > 500.0 => 300,
            Some(e) if e > 200.0 => 200,
            Some(e) if e > 50.0 => 100,
            _ => 0,
        };
        if doc.child_count > 1 {
            priority += 250;
        }
        if doc.sphere_radius.is_some_and(|r| r > 300.0) {
            priority += 150;
        }
    }

    if lower.contains("tile_") && !lower.contains("tileset") {
        priority -= SUB_TILE_PENALTY;
    }

    if lower.ends_with(".json") {
        priority += JSON_BONUS;
    }

    priority
}

/// [`tileset_priority`] with the document read from `path` when it is JSON.
pub fn get_tileset_priority(filename: &str, path: &Path) -> i32 {
    let doc = if is_json_like(filename) {
        load_document(path).ok()
    } else {
        None
    };
    tileset_priority(filename, doc.as_ref())
}
