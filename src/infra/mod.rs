//! Adapters behind the application ports and the artifact store.

pub mod artifact_cas;
pub mod blob_store;
pub mod parquet_out;
pub mod warehouse;

pub use artifact_cas::FsArtifactStore;
pub use blob_store::{FsBlobStore, InMemoryBlobStore};
pub use warehouse::SqliteWarehouse;
