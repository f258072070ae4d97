//! SQLite store for the gallery index.

use super::models::GalleryAsset;
use super::schema::{GALLERY_SCHEMA_SQL, GALLERY_SCHEMA_VERSION};
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Trait for gallery index operations.
pub trait GalleryIndexer: Send + Sync {
    /// Persist a batch of assets. Returns how many were written.
    fn record(&self, assets: &[GalleryAsset]) -> Result<usize>;

    /// Assets of one album of a project, oldest first.
    fn list_album(&self, project_id: &str, album: &str) -> Result<Vec<GalleryAsset>>;

    /// All assets of a project, oldest first.
    fn list_project(&self, project_id: &str) -> Result<Vec<GalleryAsset>>;

    /// Drop the record of a file removed from disk. Returns whether one existed.
    fn remove(&self, project_id: &str, album: &str, filename: &str) -> Result<bool>;
}

/// Indexer that keeps nothing.
pub struct NoOpGalleryIndexer;

impl GalleryIndexer for NoOpGalleryIndexer {
    fn record(&self, _assets: &[GalleryAsset]) -> Result<usize> {
        Ok(0)
    }

    fn list_album(&self, _project_id: &str, _album: &str) -> Result<Vec<GalleryAsset>> {
        Ok(vec![])
    }

    fn list_project(&self, _project_id: &str) -> Result<Vec<GalleryAsset>> {
        Ok(vec![])
    }

    fn remove(&self, _project_id: &str, _album: &str, _filename: &str) -> Result<bool> {
        Ok(false)
    }
}

/// SQLite implementation of GalleryIndexer.
pub struct SqliteGalleryIndexer {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGalleryIndexer {
    /// Open or create a gallery database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open gallery database: {:?}", path))?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_asset(row: &rusqlite::Row) -> rusqlite::Result<GalleryAsset> {
        Ok(GalleryAsset {
            album: row.get("album")?,
            filename: row.get("filename")?,
            url: row.get("url")?,
            title: row.get("title")?,
            project_id: row.get("project_id")?,
            created_at: row.get("created_at")?,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Gallery database lock poisoned"))
    }
}

/// Create the tables if missing and stamp the schema version.
fn init_schema(conn: &Connection) -> Result<()> {
    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    if db_version > GALLERY_SCHEMA_VERSION as i64 {
        bail!(
            "Gallery database has schema version {}, newer than supported version {}",
            db_version,
            GALLERY_SCHEMA_VERSION
        );
    }
    conn.execute_batch(GALLERY_SCHEMA_SQL)?;
    conn.execute_batch(&format!("PRAGMA user_version = {}", GALLERY_SCHEMA_VERSION))?;
    Ok(())
}

impl GalleryIndexer for SqliteGalleryIndexer {
    fn record(&self, assets: &[GalleryAsset]) -> Result<usize> {
        if assets.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO gallery_assets (album, filename, url, title, project_id, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for asset in assets {
                stmt.execute(params![
                    asset.album,
                    asset.filename,
                    asset.url,
                    asset.title,
                    asset.project_id,
                    asset.created_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(assets.len())
    }

    fn list_album(&self, project_id: &str, album: &str) -> Result<Vec<GalleryAsset>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM gallery_assets WHERE project_id = ?1 AND album = ?2 ORDER BY created_at ASC, id ASC",
        )?;
        let assets = stmt
            .query_map(params![project_id, album], Self::row_to_asset)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(assets)
    }

    fn list_project(&self, project_id: &str) -> Result<Vec<GalleryAsset>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM gallery_assets WHERE project_id = ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let assets = stmt
            .query_map(params![project_id], Self::row_to_asset)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(assets)
    }

    fn remove(&self, project_id: &str, album: &str, filename: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM gallery_assets WHERE project_id = ?1 AND album = ?2 AND filename = ?3",
            params![project_id, album, filename],
        )?;
        Ok(deleted > 0)
    }
}
