//! Gallery index of ingested assets.
//!
//! Every accepted backend upload becomes one record. Records are written after
//! the files are already on disk and are never rolled back together with them.

mod models;
mod schema;
mod store;

pub use models::GalleryAsset;
pub use schema::{GALLERY_SCHEMA_SQL, GALLERY_SCHEMA_VERSION};
pub use store::{GalleryIndexer, NoOpGalleryIndexer, SqliteGalleryIndexer};
