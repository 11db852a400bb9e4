//! Asset storage (§4.L): filename conventions, sidecar I/O, and the
//! recorded/edited repositories built on top of them. Not to be confused
//! with [`crate::domain::asset`], which defines the `VideoAsset` value type
//! these repositories produce and consume.

pub mod file_ops;
pub mod repository;

pub use repository::{EditedAssetRepository, RecordedAssetRepository};
