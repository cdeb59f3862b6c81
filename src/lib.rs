//! Face Similarity Pipeline
//!
//! Compares two base64-encoded face images by orchestrating three remote
//! services — image rotation, face detection, face encoding — and scoring
//! the distance between the resulting 128-dimension embeddings.
//!
//! # Architecture
//!
//! The pipeline consists of:
//!
//! - **Client**: concurrent round dispatch over a pooled HTTP client, with
//!   per-URL proxy resolution
//! - **Pipeline**: the rotate → detect → encode → score stage sequence,
//!   request-local per comparison
//! - **Scoring**: Euclidean distance and the distance-to-confidence curve
//!
//! # Usage
//!
//! ```no_run
//! use face_similarity::{compare_images, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let score = compare_images(&config, "<base64 1>", "<base64 2>").await?;
//!     println!("{}", score);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod scoring;

pub use client::{DispatchResult, Dispatcher, EndpointRequest, ImageTag};
pub use config::Config;
pub use error::SimilarityError;
pub use pipeline::{Comparison, MetricsSnapshot};
pub use scoring::{distance, distance_to_percentage, EMBEDDING_DIM};

use std::sync::Arc;

/// Run one comparison with the given configuration.
///
/// Builds a dispatcher and a fresh comparison for a single call. Services
/// handling many comparisons should hold one [`Dispatcher`] for connection
/// reuse and create a [`Comparison`] per request instead.
pub async fn compare_images(
    config: &Config,
    image_1: &str,
    image_2: &str,
) -> Result<f64, SimilarityError> {
    let config = Arc::new(config.clone());
    let dispatcher = Dispatcher::new(&config)?;
    let comparison = Comparison::new(dispatcher, config);
    comparison.compare(image_1, image_2).await
}

/// Build a Tokio runtime with the specified configuration.
pub fn build_runtime(worker_threads: Option<usize>) -> anyhow::Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();

    if let Some(threads) = worker_threads {
        builder.worker_threads(threads);
    }

    builder.enable_all();

    Ok(builder.build()?)
}
