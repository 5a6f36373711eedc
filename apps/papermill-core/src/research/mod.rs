pub mod agents;
pub mod pack;
pub mod pipeline;
pub mod similarity;
pub mod types;

pub use pipeline::{Pipeline, RunError};
pub use types::{RunOutcome, RunRequest};
