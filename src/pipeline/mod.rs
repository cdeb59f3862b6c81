//! Pipeline orchestration for face comparison.

mod metrics;
mod orchestrator;
mod rounds;


pub use metrics::{Metrics, MetricsSnapshot};
pub use orchestrator::{Comparison, Stage};
pub use rounds::{BoundingBox, CandidateFrame, ROTATE_ANGLES};
