//! Narrow interfaces to the external collaborators the pipeline writes to.

pub mod ports;

pub use ports::{BlobStore, BucketTier, RelationalSink};
