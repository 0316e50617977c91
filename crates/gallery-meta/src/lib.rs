//! Collection metadata for the gallery sync engine.
//!
//! The collection keeps one JSON document at the repository root mapping each
//! asset id (its path relative to the root) to the asset's tags and free-form
//! properties.
//!
//! - [`document`]: the parsed document and per-asset comparison
//! - [`store`]: reading and writing the document on disk
//! - [`validation`]: checks a file must pass before it is committed

pub mod document;
pub mod error;
pub mod store;
pub mod validation;

pub use document::{AssetRecord, MetadataDocument, RecordChanges};
pub use error::{Error, Result};
pub use store::{JsonFileStore, MetadataStore, write_atomic};
pub use validation::{AssetValidator, FileAssetValidator, ValidationResult};
