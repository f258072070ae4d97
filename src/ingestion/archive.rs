//! Archive detection, safe ZIP extraction and main-file discovery.

use super::category::extension_of;
use super::naming::{resolve_name_conflict, NamingError};
use super::tileset::{is_json_like, is_main_by_content, is_main_by_name, load_document, tileset_priority};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

/// Directory levels below the extraction root that are searched for main files.
pub const MAX_SCAN_DEPTH: usize = 3;

/// Default cap on the decompressed size of one archive (2 GiB).
pub const DEFAULT_MAX_EXTRACTED_SIZE: u64 = 2 * 1024 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip extraction error: {0}")]
    Zip(String),

    #[error("{0} archives are detected but cannot be extracted")]
    UnsupportedContainer(ArchiveKind),

    #[error("Not an archive: {0}")]
    NotAnArchive(String),

    #[error("Archive expands beyond {limit} bytes")]
    ExtractedSizeExceeded { limit: u64 },

    #[error("Naming error: {0}")]
    Naming(#[from] NamingError),
}

/// An archive entry rejected before anything was written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecurityError {
    #[error("Path traversal in archive entry: {0}")]
    PathTraversal(String),

    #[error("Invalid archive entry name: {0:?}")]
    InvalidEntryName(String),
}

/// Container formats we can recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    Zip,
    Rar,
    SevenZip,
}

impl std::fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Zip => "ZIP",
            Self::Rar => "RAR",
            Self::SevenZip => "7z",
        };
        f.write_str(name)
    }
}

impl ArchiveKind {
    /// Identify a container from its magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if infer::archive::is_zip(bytes) {
            Some(Self::Zip)
        } else if infer::archive::is_rar(bytes) {
            Some(Self::Rar)
        } else if infer::archive::is_7z(bytes) {
            Some(Self::SevenZip)
        } else {
            None
        }
    }

    pub fn from_filename(filename: &str) -> Option<Self> {
        match extension_of(filename).as_str() {
            ".zip" => Some(Self::Zip),
            ".rar" => Some(Self::Rar),
            ".7z" => Some(Self::SevenZip),
            _ => None,
        }
    }

    /// Magic bytes win; the filename only decides when the content is unrecognized.
    pub fn detect(filename: &str, bytes: &[u8]) -> Option<Self> {
        Self::sniff(bytes).or_else(|| Self::from_filename(filename))
    }
}

/// Metadata of one archive entry. Contents are read only when the entry is written.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: String,
    pub is_directory: bool,
    /// Uncompressed size as declared by the archive.
    pub size: u64,
}

/// Diagnostics over every entry in the archive, including rejected ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
    pub total_files: usize,
    pub directories: Vec<String>,
    pub file_type_counts: BTreeMap<String, usize>,
}

impl ExtractionSummary {
    pub fn from_entries(entries: &[ArchiveEntry]) -> Self {
        let mut directories = BTreeSet::new();
        let mut file_type_counts = BTreeMap::new();
        let mut total_files = 0;

        for entry in entries {
            let normalized = entry.path.replace('\\', "/");
            let trimmed = normalized.trim_end_matches('/');
            if entry.is_directory {
                if !trimmed.is_empty() {
                    directories.insert(trimmed.to_string());
                }
                continue;
            }

            total_files += 1;
            if let Some((parent, _)) = trimmed.rsplit_once('/') {
                if !parent.is_empty() {
                    directories.insert(parent.to_string());
                }
            }
            let extension = extension_of(trimmed);
            let key = if extension.is_empty() {
                "(none)".to_string()
            } else {
                extension
            };
            *file_type_counts.entry(key).or_insert(0) += 1;
        }

        Self {
            total_files,
            directories: directories.into_iter().collect(),
            file_type_counts,
        }
    }
}

/// A file that might be the root tileset of an extracted archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateMainFile {
    pub filename: String,
    pub absolute_path: PathBuf,
    /// Path below the extraction root, `/`-separated.
    pub relative_path: String,
    /// Directory levels below the extraction root.
    pub depth: usize,
    pub is_main: bool,
    pub priority: i32,
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Extensions (lowercase, with dot) considered for main-file discovery.
    pub file_types: Vec<String>,
    /// Keep the archive's directory layout; otherwise every file lands in the root.
    pub preserve_structure: bool,
    /// Cap on the total decompressed bytes written for this archive.
    pub max_extracted_size: u64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            file_types: vec![".json".to_string()],
            preserve_structure: true,
            max_extracted_size: DEFAULT_MAX_EXTRACTED_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub success: bool,
    pub extracted_files: Vec<PathBuf>,
    /// Entries dropped by the path checks.
    pub skipped_entries: Vec<String>,
    pub structure: ExtractionSummary,
    /// Ranked candidates, limited to files written by this extraction.
    pub main_files: Vec<CandidateMainFile>,
}

/// Validate an entry path and turn it into a relative path made of plain components.
pub fn check_entry_path(raw: &str) -> Result<PathBuf, SecurityError> {
    if raw.contains('\0') {
        return Err(SecurityError::InvalidEntryName(raw.to_string()));
    }
    if raw.starts_with('/') || raw.starts_with('\\') || raw.contains("\\..\\") {
        return Err(SecurityError::PathTraversal(raw.to_string()));
    }
    // Drive-qualified paths such as C:\ or C:/
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return Err(SecurityError::PathTraversal(raw.to_string()));
    }

    let normalized = raw.replace('\\', "/");
    let mut result = PathBuf::new();
    for component in normalized.split('/') {
        match component {
            "" | "." => continue,
            ".." => return Err(SecurityError::PathTraversal(raw.to_string())),
            c => result.push(c),
        }
    }

    if result.as_os_str().is_empty() {
        return Err(SecurityError::InvalidEntryName(raw.to_string()));
    }
    Ok(result)
}

/// List the entries of a ZIP without decompressing anything.
pub fn list_zip_entries<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive
            .by_index_raw(i)
            .map_err(|e| ArchiveError::Zip(e.to_string()))?;
        entries.push(ArchiveEntry {
            path: file.name().to_string(),
            is_directory: file.is_dir(),
            size: file.size(),
        });
    }
    Ok(entries)
}

/// Decompress entry `index`, failing once more than `budget` bytes come out.
fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
    budget: u64,
    limit: u64,
) -> Result<Vec<u8>, ArchiveError> {
    let file = archive
        .by_index(index)
        .map_err(|e| ArchiveError::Zip(e.to_string()))?;
    if file.size() > budget {
        return Err(ArchiveError::ExtractedSizeExceeded { limit });
    }

    // The declared size is not trusted; the reader is capped one byte past the budget.
    let mut bytes = Vec::new();
    file.take(budget.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|e| ArchiveError::Zip(e.to_string()))?;
    if bytes.len() as u64 > budget {
        return Err(ArchiveError::ExtractedSizeExceeded { limit });
    }
    Ok(bytes)
}

/// Extract `archive_path` into `dest_dir` and rank the candidate main files.
///
/// Entries that would escape `dest_dir` are logged and skipped; they never
/// abort the extraction. Entries are decompressed one at a time and the
/// running total is capped by `opts.max_extracted_size`. Exceeding the cap
/// removes what was already written and fails the extraction.
pub async fn extract(
    archive_path: &Path,
    dest_dir: &Path,
    opts: &ExtractOptions,
) -> Result<ExtractionResult, ArchiveError> {
    let filename = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let data = fs::read(archive_path).await?;

    match ArchiveKind::detect(&filename, &data) {
        Some(ArchiveKind::Zip) => {}
        Some(other) => return Err(ArchiveError::UnsupportedContainer(other)),
        None => return Err(ArchiveError::NotAnArchive(filename)),
    }

    let mut archive =
        ZipArchive::new(Cursor::new(data)).map_err(|e| ArchiveError::Zip(e.to_string()))?;
    let entries = list_zip_entries(&mut archive)?;
    let structure = ExtractionSummary::from_entries(&entries);

    fs::create_dir_all(dest_dir).await?;

    let mut extracted_files = Vec::new();
    let mut skipped_entries = Vec::new();
    let mut written: u64 = 0;

    for (index, entry) in entries.iter().enumerate() {
        let relative = match check_entry_path(&entry.path) {
            Ok(p) => p,
            Err(e) => {
                warn!(target: "security", "Skipping archive entry from {}: {}", filename, e);
                skipped_entries.push(entry.path.clone());
                continue;
            }
        };

        if entry.is_directory {
            if opts.preserve_structure {
                fs::create_dir_all(dest_dir.join(&relative)).await?;
            }
            continue;
        }

        let output_path = if opts.preserve_structure {
            dest_dir.join(&relative)
        } else {
            let name = relative
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| ArchiveError::Zip(format!("Bad entry name: {}", entry.path)))?;
            dest_dir.join(resolve_name_conflict(name, dest_dir)?)
        };

        // Decompression is synchronous and the entry reader is dropped before the next await.
        let budget = opts.max_extracted_size.saturating_sub(written);
        let bytes = match read_entry(&mut archive, index, budget, opts.max_extracted_size) {
            Ok(bytes) => bytes,
            Err(e) => {
                if matches!(e, ArchiveError::ExtractedSizeExceeded { .. }) {
                    warn!(
                        target: "security",
                        "Archive {} exceeds {} decompressed bytes, discarding {} extracted files",
                        filename,
                        opts.max_extracted_size,
                        extracted_files.len()
                    );
                    remove_files(&extracted_files).await;
                }
                return Err(e);
            }
        };
        written += bytes.len() as u64;

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&output_path, &bytes).await?;
        extracted_files.push(output_path);
    }

    // The destination may hold files from earlier uploads; only this archive's files compete.
    let written_here: HashSet<&PathBuf> = extracted_files.iter().collect();
    let main_files: Vec<CandidateMainFile> = find_main_files(dest_dir, &opts.file_types)
        .into_iter()
        .filter(|c| written_here.contains(&c.absolute_path))
        .collect();

    info!(
        "Extracted {} of {} files from {} ({} bytes, {} skipped, {} main-file candidates)",
        extracted_files.len(),
        structure.total_files,
        filename,
        written,
        skipped_entries.len(),
        main_files.len()
    );

    Ok(ExtractionResult {
        success: true,
        extracted_files,
        skipped_entries,
        structure,
        main_files,
    })
}

async fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path).await {
            warn!("Failed to remove {:?}: {}", path, e);
        }
    }
}

/// Rank files under `dir` with one of `extensions` by how likely they are the root file.
///
/// The walk goes at most [`MAX_SCAN_DEPTH`] directory levels deep and does not
/// follow symlinks. Ties in priority go to the shallower file, then the
/// lexically smaller name.
pub fn find_main_files(dir: &Path, extensions: &[String]) -> Vec<CandidateMainFile> {
    let mut candidates = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(MAX_SCAN_DEPTH + 1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("Skipping unreadable path during scan: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(filename) = entry.file_name().to_str() else {
            continue;
        };
        let extension = extension_of(filename);
        if !extensions.iter().any(|e| e.eq_ignore_ascii_case(&extension)) {
            continue;
        }

        let doc = if is_json_like(filename) {
            load_document(entry.path()).ok()
        } else {
            None
        };
        let is_main = is_main_by_name(filename) || doc.as_ref().is_some_and(is_main_by_content);
        let priority = tileset_priority(filename, doc.as_ref());

        let relative_path = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        candidates.push(CandidateMainFile {
            filename: filename.to_string(),
            absolute_path: entry.path().to_path_buf(),
            relative_path,
            depth: entry.depth() - 1,
            is_main,
            priority,
        });
    }

    candidates.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.depth.cmp(&b.depth))
            .then_with(|| a.filename.cmp(&b.filename))
            .then_with(|| a.relative_path.cmp(&b.relative_path))
    });
    candidates
}

/// The file to treat as the archive's root: the best-ranked candidate flagged as
/// main, otherwise the lexically first candidate.
pub fn choose_main_file(candidates: &[CandidateMainFile]) -> Option<&CandidateMainFile> {
    candidates.iter().find(|c| c.is_main).or_else(|| {
        candidates
            .iter()
            .min_by(|a, b| a.relative_path.cmp(&b.relative_path))
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::build_zip;
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn json_opts() -> ExtractOptions {
        ExtractOptions::default()
    }

    fn files_under(dir: &Path) -> Vec<PathBuf> {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .collect()
    }

    #[test]
    fn test_check_entry_path() {
        assert_eq!(
            check_entry_path("Data/Tile_+0+0.json").unwrap(),
            PathBuf::from("Data/Tile_+0+0.json")
        );
        assert_eq!(
            check_entry_path("Data\\sub\\a.b3dm").unwrap(),
            PathBuf::from("Data/sub/a.b3dm")
        );
        assert_eq!(
            check_entry_path("./x//y.json").unwrap(),
            PathBuf::from("x/y.json")
        );
        assert!(matches!(
            check_entry_path("../evil.json"),
            Err(SecurityError::PathTraversal(_))
        ));
        assert!(matches!(
            check_entry_path("a/../../evil.json"),
            Err(SecurityError::PathTraversal(_))
        ));
        assert!(matches!(
            check_entry_path("/etc/passwd"),
            Err(SecurityError::PathTraversal(_))
        ));
        assert!(matches!(
            check_entry_path("a\\..\\evil.json"),
            Err(SecurityError::PathTraversal(_))
        ));
        assert!(matches!(
            check_entry_path("C:\\evil.json"),
            Err(SecurityError::PathTraversal(_))
        ));
        assert!(matches!(
            check_entry_path("./"),
            Err(SecurityError::InvalidEntryName(_))
        ));
        // Dots inside a name are fine
        assert!(check_entry_path("v1..2.json").is_ok());
        // A colon after a non-letter is not a drive prefix
        assert_eq!(
            check_entry_path("1:a.json").unwrap(),
            PathBuf::from("1:a.json")
        );
        assert!(matches!(
            check_entry_path("d:/evil.json"),
            Err(SecurityError::PathTraversal(_))
        ));
    }

    #[test]
    fn test_detect_kinds() {
        let zip = build_zip(&[("a.txt", b"a")]);
        assert_eq!(ArchiveKind::sniff(&zip), Some(ArchiveKind::Zip));

        let rar = [0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, 0x00, 0x00];
        assert_eq!(ArchiveKind::sniff(&rar), Some(ArchiveKind::Rar));

        let seven = [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00, 0x04];
        assert_eq!(ArchiveKind::sniff(&seven), Some(ArchiveKind::SevenZip));

        assert_eq!(ArchiveKind::detect("tiles.7z", b""), Some(ArchiveKind::SevenZip));
        assert_eq!(ArchiveKind::detect("notes.txt", b"hello"), None);
    }

    #[test]
    fn test_summary_counts_all_entries() {
        let entries = vec![
            ArchiveEntry {
                path: "Data/".to_string(),
                is_directory: true,
                size: 0,
            },
            ArchiveEntry {
                path: "Data/Tile_0.b3dm".to_string(),
                is_directory: false,
                size: 1,
            },
            ArchiveEntry {
                path: "../evil.json".to_string(),
                is_directory: false,
                size: 0,
            },
            ArchiveEntry {
                path: "README".to_string(),
                is_directory: false,
                size: 0,
            },
        ];
        let summary = ExtractionSummary::from_entries(&entries);
        assert_eq!(summary.total_files, 3);
        assert_eq!(summary.directories, vec!["..".to_string(), "Data".to_string()]);
        assert_eq!(summary.file_type_counts.get(".b3dm"), Some(&1));
        assert_eq!(summary.file_type_counts.get(".json"), Some(&1));
        assert_eq!(summary.file_type_counts.get("(none)"), Some(&1));
    }

    #[tokio::test]
    async fn test_extract_skips_traversal_entries() {
        let root = TempDir::new().unwrap();
        let dest = root.path().join("project").join("tiles");
        let archive = root.path().join("upload.zip");
        std::fs::write(
            &archive,
            build_zip(&[
                ("../escape.json", b"{}"),
                ("../../escape2.json", b"{}"),
                ("/abs.json", b"{}"),
                ("ok/inner.json", b"{}"),
            ]),
        )
        .unwrap();

        let result = extract(&archive, &dest, &json_opts()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.skipped_entries.len(), 3);
        assert_eq!(result.extracted_files, vec![dest.join("ok/inner.json")]);
        assert_eq!(result.structure.total_files, 4);

        for file in files_under(root.path()) {
            assert!(
                file.starts_with(&dest) || file == archive,
                "unexpected file outside destination: {:?}",
                file
            );
        }
    }

    #[tokio::test]
    async fn test_extract_flattens_without_structure() {
        let root = TempDir::new().unwrap();
        let dest = root.path().join("out");
        let archive = root.path().join("cloud.zip");
        std::fs::write(
            &archive,
            build_zip(&[("a/scan.las", b"1"), ("b/scan.las", b"2"), ("c/", b"")]),
        )
        .unwrap();

        let opts = ExtractOptions {
            file_types: vec![],
            preserve_structure: false,
            ..ExtractOptions::default()
        };
        let result = extract(&archive, &dest, &opts).await.unwrap();

        assert_eq!(
            result.extracted_files,
            vec![dest.join("scan.las"), dest.join("scan_2.las")]
        );
        assert!(!dest.join("c").exists());
    }

    #[tokio::test]
    async fn test_extract_enforces_decompressed_size_cap() {
        let root = TempDir::new().unwrap();
        let dest = root.path().join("out");
        let archive = root.path().join("bomb.zip");
        let big = vec![0u8; 4096];
        std::fs::write(
            &archive,
            build_zip(&[("small.json", b"{}"), ("big.bin", &big)]),
        )
        .unwrap();

        let opts = ExtractOptions {
            max_extracted_size: 1024,
            ..ExtractOptions::default()
        };
        let err = extract(&archive, &dest, &opts).await.unwrap_err();

        assert!(matches!(
            err,
            ArchiveError::ExtractedSizeExceeded { limit: 1024 }
        ));
        // Files written before the cap was hit are removed again
        assert!(files_under(&dest).is_empty());
    }

    #[tokio::test]
    async fn test_extract_cap_counts_running_total() {
        let root = TempDir::new().unwrap();
        let dest = root.path().join("out");
        let archive = root.path().join("parts.zip");
        let chunk = vec![7u8; 600];
        std::fs::write(&archive, build_zip(&[("a.bin", &chunk), ("b.bin", &chunk)])).unwrap();

        let tight = ExtractOptions {
            max_extracted_size: 1000,
            ..ExtractOptions::default()
        };
        assert!(extract(&archive, &dest, &tight).await.is_err());

        let roomy = ExtractOptions {
            max_extracted_size: 1200,
            ..ExtractOptions::default()
        };
        let result = extract(&archive, &dest, &roomy).await.unwrap();
        assert_eq!(result.extracted_files.len(), 2);
    }

    #[tokio::test]
    async fn test_main_files_ignore_earlier_uploads() {
        let root = TempDir::new().unwrap();
        let dest = root.path().join("tiles");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("tileset.json"), b"{}").unwrap();

        let archive = root.path().join("city.zip");
        std::fs::write(&archive, build_zip(&[("city.json", b"{}")])).unwrap();

        let result = extract(&archive, &dest, &json_opts()).await.unwrap();

        assert_eq!(result.main_files.len(), 1);
        assert_eq!(result.main_files[0].filename, "city.json");
    }

    #[tokio::test]
    async fn test_extract_rejects_unsupported_containers() {
        let root = TempDir::new().unwrap();
        let archive = root.path().join("tiles.rar");
        std::fs::write(&archive, [0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, 0x01, 0x00]).unwrap();

        let err = extract(&archive, &root.path().join("out"), &json_opts())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::UnsupportedContainer(ArchiveKind::Rar)
        ));
    }

    #[tokio::test]
    async fn test_extract_rejects_corrupt_zip() {
        let root = TempDir::new().unwrap();
        let archive = root.path().join("tiles.zip");
        std::fs::write(&archive, b"not really a zip").unwrap();

        let err = extract(&archive, &root.path().join("out"), &json_opts())
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Zip(_)));
    }

    #[test]
    fn test_find_main_files_ranks_root_tileset_first() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("tileset.json"),
            json!({
                "asset": { "version": "1.0" },
                "geometricError": 600,
                "root": { "children": [{}, {}] }
            })
            .to_string(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("tile_0_0.json"),
            json!({ "asset": { "version": "1.0" } }).to_string(),
        )
        .unwrap();
        std::fs::write(dir.path().join("tile_0_0.b3dm"), b"b3dm").unwrap();

        let found = find_main_files(dir.path(), &[".json".to_string()]);

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].filename, "tileset.json");
        assert!(found[0].is_main);
        assert_eq!(found[0].priority, 1000);
        assert_eq!(found[1].filename, "tile_0_0.json");
        assert!(!found[1].is_main);
    }

    #[test]
    fn test_find_main_files_depth_limit_and_ties() {
        let dir = TempDir::new().unwrap();
        let deep = dir.path().join("a/b/c");
        let too_deep = dir.path().join("a/b/c/d");
        std::fs::create_dir_all(&too_deep).unwrap();
        std::fs::write(deep.join("tileset.json"), b"{}").unwrap();
        std::fs::write(too_deep.join("tileset.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("tileset.json"), b"{}").unwrap();

        let found = find_main_files(dir.path(), &[".json".to_string()]);

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].relative_path, "tileset.json");
        assert_eq!(found[0].depth, 0);
        assert_eq!(found[1].relative_path, "a/b/c/tileset.json");
        assert_eq!(found[1].depth, 3);
    }

    #[test]
    fn test_choose_main_file_falls_back_to_first_json() {
        let candidate = |name: &str, priority: i32, is_main: bool| CandidateMainFile {
            filename: name.to_string(),
            absolute_path: PathBuf::from(name),
            relative_path: name.to_string(),
            depth: 0,
            is_main,
            priority,
        };

        let ranked = vec![
            candidate("b.json", 60, false),
            candidate("a.json", 60, false),
        ];
        assert_eq!(choose_main_file(&ranked).unwrap().filename, "a.json");

        let ranked = vec![
            candidate("z.json", 700, false),
            candidate("main.json", 660, true),
        ];
        assert_eq!(choose_main_file(&ranked).unwrap().filename, "main.json");

        assert!(choose_main_file(&[]).is_none());
    }
}
