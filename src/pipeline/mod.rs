// Task graph, artifacts passed between units, and the churn steps

pub mod artifact;
pub mod dag;
pub mod orchestrator;
pub mod steps;

pub use artifact::{Artifact, ArtifactRef, ArtifactStore, InMemoryArtifactStore};
pub use dag::{RunReport, TaskGraph, TaskOutcome, TaskState};
pub use orchestrator::{churn_steps, PipelineOrchestrator};
pub use steps::{PipelineStep, StepContext, StepResult};
