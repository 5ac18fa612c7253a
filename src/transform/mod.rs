//! Pure record-set transformations: cleaning, feature derivation, dimensional
//! modeling and insight aggregation.

pub mod clean;
pub mod dimensions;
pub mod features;
pub mod insights;

pub use clean::{clean, clean_with_stats, CleaningStats};
pub use dimensions::{model, StarSchema};
pub use features::enrich;
pub use insights::{aggregate, create_churn_insights, InsightRow};
