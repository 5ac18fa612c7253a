pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod source;
pub mod transform;
pub mod types;

// Storage ports and their adapters
pub mod app;
pub mod infra;
