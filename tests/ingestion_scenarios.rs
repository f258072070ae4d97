//! End-to-end upload batches against a temporary directory tree.

use asset_ingest::gallery::{GalleryIndexer, SqliteGalleryIndexer};
use asset_ingest::ingestion::{
    CategoryRegistry, IngestionOrchestrator, IngestionOrchestratorConfig, IngestionState,
    ProjectRef, StaticProjectDirectory, StorageResolver, UploadRequest, UploadedFile,
    ValidationError,
};
use serde_json::json;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

struct Fixture {
    dir: TempDir,
    gallery: Arc<SqliteGalleryIndexer>,
    orchestrator: IngestionOrchestrator,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let gallery = Arc::new(SqliteGalleryIndexer::open(&dir.path().join("db/gallery.db")).unwrap());
        let lookup = StaticProjectDirectory::new(HashMap::from([(12, "400_111".to_string())]));
        let storage = StorageResolver::new(
            dir.path().join("uploads"),
            dir.path().join("frontend/public"),
            Some(Arc::new(lookup)),
            Duration::from_millis(200),
        );
        let orchestrator = IngestionOrchestrator::new(
            CategoryRegistry::builtin(),
            storage,
            gallery.clone(),
            IngestionOrchestratorConfig {
                temp_dir: dir.path().join("staging"),
                max_file_size: 10 * 1024 * 1024,
                max_extracted_size: 10 * 1024 * 1024,
                public_url_prefix: "/uploads".to_string(),
            },
        );
        Self {
            dir,
            gallery,
            orchestrator,
        }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }
}

fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, bytes) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn files_under(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return vec![];
    }
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .collect()
}

#[tokio::test]
async fn test_tileset_archive_main_file_is_renamed() {
    let fixture = Fixture::new();

    let fragment = json!({
        "asset": { "version": "1.0" },
        "geometricError": 20,
        "root": { "content": { "uri": "Data/Tile_+0+0.b3dm" } }
    })
    .to_string();
    let production = json!({
        "asset": { "version": "1.0" },
        "geometricError": 800,
        "root": {
            "boundingVolume": { "sphere": [0, 0, 0, 500] },
            "children": [{}, {}]
        }
    })
    .to_string();
    let zip = build_zip(&[
        ("Data/Tile_+0+0.json", fragment.as_bytes()),
        ("Data/Tile_+0+0.b3dm", b"b3dm"),
        ("Production.json", production.as_bytes()),
    ]);

    let request = UploadRequest::new(
        "400_111",
        "frontend_tiles_zip",
        vec![UploadedFile::new("tiles.zip", zip)],
    );
    let result = fixture.orchestrator.ingest(request).await.unwrap();

    assert_eq!(result.state, IngestionState::Done);
    assert_eq!(result.project_code, "400_111");
    assert_eq!(result.indexed, 0);

    let outcome = &result.files[0];
    assert_eq!(outcome.final_name.as_deref(), Some("sezyum_400_111.json"));
    assert_eq!(outcome.renamed, Some(true));

    let report = outcome.extracted.as_ref().unwrap();
    assert_eq!(report.main_file.as_deref(), Some("sezyum_400_111.json"));
    assert_eq!(report.main_file_renamed_from.as_deref(), Some("Production.json"));
    assert_eq!(report.structure.total_files, 3);
    assert!(report.skipped_entries.is_empty());

    let tiles = fixture.path("frontend/public/400_111_project/tiles");
    assert!(tiles.join("sezyum_400_111.json").is_file());
    assert!(!tiles.join("Production.json").exists());
    assert!(tiles.join("Data/Tile_+0+0.json").is_file());
    assert!(tiles.join("Data/Tile_+0+0.b3dm").is_file());

    // The source archive does not outlive the batch
    assert!(files_under(&fixture.path("staging")).is_empty());
    assert!(fixture.gallery.list_project("400_111").unwrap().is_empty());
}

#[tokio::test]
async fn test_repeated_upload_gets_suffixed_name() {
    let fixture = Fixture::new();

    for bytes in [b"first".to_vec(), b"second".to_vec()] {
        let request = UploadRequest::new(
            "400_111",
            "view_360",
            vec![UploadedFile::new("panorama.jpg", bytes)],
        );
        let result = fixture.orchestrator.ingest(request).await.unwrap();
        assert_eq!(result.state, IngestionState::Done);
    }

    let dir = fixture.path("uploads/projects/400_111/view_360");
    assert_eq!(std::fs::read(dir.join("panorama.jpg")).unwrap(), b"first");
    assert_eq!(std::fs::read(dir.join("panorama_2.jpg")).unwrap(), b"second");

    let assets = fixture.gallery.list_album("400_111", "view_360").unwrap();
    let names: Vec<_> = assets.iter().map(|a| a.filename.as_str()).collect();
    assert_eq!(names, vec!["panorama.jpg", "panorama_2.jpg"]);
    assert_eq!(assets[1].url, "/uploads/projects/400_111/view_360/panorama_2.jpg");
    assert_eq!(assets[1].title, "panorama");
}

#[tokio::test]
async fn test_disallowed_type_rejects_batch() {
    let fixture = Fixture::new();

    let request = UploadRequest::new(
        "400_111",
        "drone_photos",
        vec![
            UploadedFile::new("IMG_0001.jpg", b"jpeg".to_vec()),
            UploadedFile::new("setup.exe", b"MZ".to_vec()),
        ],
    );
    let err = fixture.orchestrator.ingest(request).await.unwrap_err();

    assert_eq!(
        err,
        ValidationError::DisallowedExtension {
            filename: "setup.exe".to_string(),
            extension: ".exe".to_string(),
            category: "drone_photos".to_string(),
        }
    );
    assert!(files_under(&fixture.path("uploads")).is_empty());
    assert!(fixture.gallery.list_project("400_111").unwrap().is_empty());
}

#[tokio::test]
async fn test_traversal_entries_never_leave_destination() {
    let fixture = Fixture::new();

    let zip = build_zip(&[
        ("../../../escape.json", b"{}"),
        ("..\\escape2.json", b"{}"),
        ("tileset.json", b"{}"),
    ]);
    let request = UploadRequest::new(
        "400_111",
        "frontend_tiles_zip",
        vec![UploadedFile::new("evil.zip", zip)],
    );
    let result = fixture.orchestrator.ingest(request).await.unwrap();

    let report = result.files[0].extracted.as_ref().unwrap();
    assert_eq!(report.skipped_entries.len(), 2);
    assert_eq!(report.main_file.as_deref(), Some("sezyum_400_111.json"));

    let tiles = fixture.path("frontend/public/400_111_project/tiles");
    for file in files_under(fixture.dir.path()) {
        assert!(
            file.starts_with(&tiles) || file.starts_with(fixture.path("db")),
            "file escaped the destination: {:?}",
            file
        );
    }
}

#[tokio::test]
async fn test_numeric_project_id_resolves_to_code() {
    let fixture = Fixture::new();

    let request = UploadRequest::new(
        ProjectRef::Id(12),
        "frontend_boundary",
        vec![UploadedFile::new("site_outline.geojson", b"{}".to_vec())],
    );
    let result = fixture.orchestrator.ingest(request).await.unwrap();

    assert_eq!(result.project_code, "400_111");
    assert_eq!(result.files[0].final_name.as_deref(), Some("boundary.geojson"));
    assert!(fixture
        .path("frontend/public/400_111_project/boundary/boundary.geojson")
        .is_file());

    // Unknown ids fall back to the id itself
    let request = UploadRequest::new(
        ProjectRef::Id(99),
        "documents",
        vec![UploadedFile::new("report.pdf", b"%PDF".to_vec())],
    );
    let result = fixture.orchestrator.ingest(request).await.unwrap();
    assert_eq!(result.project_code, "99");
    assert!(fixture.path("uploads/projects/99/documents/report.pdf").is_file());
    assert_eq!(fixture.gallery.list_project("99").unwrap().len(), 1);
}
