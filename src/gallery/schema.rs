//! Database schema for the gallery index.

/// SQL schema for the gallery database.
pub const GALLERY_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS gallery_assets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    album TEXT NOT NULL,
    filename TEXT NOT NULL,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    project_id TEXT NOT NULL,

    -- Unix milliseconds
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_gallery_assets_project_album ON gallery_assets(project_id, album);
"#;

/// Current schema version.
pub const GALLERY_SCHEMA_VERSION: i32 = 1;
