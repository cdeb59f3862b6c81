//! The comparison pipeline: rotate → detect → encode → score.
//!
//! ## Stage flow
//!
//! ```text
//! ┌────────┐    ┌────────┐    ┌────────┐    ┌───────┐
//! │ ROTATE │───▶│ DETECT │───▶│ ENCODE │───▶│ SCORE │
//! │ 6 calls│    │ 8 calls│    │ 2 calls│    │ local │
//! └────────┘    └────────┘    └────────┘    └───────┘
//! ```
//!
//! Rounds are strictly sequential: each stage's requests are built from the
//! previous round's results, and a failed round aborts everything after it.
//! Within a round all calls run concurrently on the dispatcher.

use std::sync::Arc;
use std::time::Instant;

use crate::client::Dispatcher;
use crate::config::Config;
use crate::error::SimilarityError;
use crate::pipeline::metrics::Metrics;
use crate::pipeline::rounds::{self, BoundingBox, CandidateFrame};
use crate::scoring;

/// Pipeline stage, in fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Rotate,
    Detect,
    Encode,
    Score,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Rotate => "rotate",
            Self::Detect => "detect",
            Self::Encode => "encode",
            Self::Score => "score",
        })
    }
}

/// One face comparison.
///
/// Holds the comparison's entire working set: endpoint lists, intermediate
/// round results and metrics all live inside one `compare` call and drop
/// with it. Nothing is shared with other in-flight comparisons — the
/// dispatcher passed in carries connection reuse only, never request state.
pub struct Comparison {
    dispatcher: Dispatcher,
    config: Arc<Config>,
    metrics: Arc<Metrics>,
}

impl Comparison {
    /// Create a comparison with a fresh working set.
    pub fn new(dispatcher: Dispatcher, config: Arc<Config>) -> Self {
        Self {
            dispatcher,
            config,
            metrics: Metrics::new(),
        }
    }

    /// Metrics for this comparison.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Compare two base64-encoded images and return the confidence score.
    ///
    /// The score is nominally in [0, 100] but deliberately unclamped; see
    /// [`crate::scoring`]. The first failure at any stage aborts the rest —
    /// no partial output, no retries.
    pub async fn compare(&self, image_1: &str, image_2: &str) -> Result<f64, SimilarityError> {
        let start = Instant::now();

        let frames = self.rotate(image_1, image_2).await?;
        let (box_1, box_2) = self.detect(&frames).await?;
        let (vector_1, vector_2) = self.encode(image_1, box_1, image_2, box_2).await?;
        let score = self.score(&vector_1, &vector_2)?;

        tracing::info!(
            similarity = score,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "comparison complete"
        );
        tracing::debug!("{}", self.metrics.snapshot());

        Ok(score)
    }

    /// ROTATE: request the three rotations of each image, then append the
    /// unrotated originals as 0° candidates.
    async fn rotate(
        &self,
        image_1: &str,
        image_2: &str,
    ) -> Result<Vec<CandidateFrame>, SimilarityError> {
        let start = Instant::now();
        let url = self.config.endpoints.rotate()?;

        let round = rounds::rotate_round(url, image_1, image_2);
        let results = self.dispatch(Stage::Rotate, round).await?;
        let frames = rounds::candidate_frames(url, results, image_1, image_2)?;

        self.metrics.add_stage_time(Stage::Rotate, start.elapsed());
        Ok(frames)
    }

    /// DETECT: one detection call per candidate frame, then first-two-wins
    /// face selection.
    async fn detect(
        &self,
        frames: &[CandidateFrame],
    ) -> Result<(BoundingBox, BoundingBox), SimilarityError> {
        let start = Instant::now();
        let url = self.config.endpoints.detect()?;

        let round = rounds::detect_round(url, frames);
        let results = self.dispatch(Stage::Detect, round).await?;
        let boxes = rounds::select_faces(url, &results)?;

        self.metrics.add_stage_time(Stage::Detect, start.elapsed());
        Ok(boxes)
    }

    /// ENCODE: one embedding per logical image, from the original unrotated
    /// image and its selected bounding box.
    async fn encode(
        &self,
        image_1: &str,
        box_1: BoundingBox,
        image_2: &str,
        box_2: BoundingBox,
    ) -> Result<(Vec<f64>, Vec<f64>), SimilarityError> {
        let start = Instant::now();
        let url = self.config.endpoints.encoding()?;

        let round = rounds::encode_round(url, image_1, box_1, image_2, box_2);
        let results = self.dispatch(Stage::Encode, round).await?;

        // Round order is img_1 then img_2
        let mut results = results.iter();
        let (first, second) = match (results.next(), results.next()) {
            (Some(first), Some(second)) => (first, second),
            _ => {
                return Err(SimilarityError::MalformedResponse {
                    endpoint: url.to_string(),
                    detail: "encode round returned fewer than two results".to_string(),
                })
            }
        };
        let vector_1 = rounds::embedding(url, first)?;
        let vector_2 = rounds::embedding(url, second)?;

        self.metrics.add_stage_time(Stage::Encode, start.elapsed());
        Ok((vector_1, vector_2))
    }

    /// SCORE: distance between the two embeddings as a percentage.
    fn score(&self, vector_1: &[f64], vector_2: &[f64]) -> Result<f64, SimilarityError> {
        let start = Instant::now();
        let distance = scoring::distance(vector_1, vector_2)?;
        let score = scoring::distance_to_percentage(distance);
        self.metrics.add_stage_time(Stage::Score, start.elapsed());
        Ok(score)
    }

    async fn dispatch(
        &self,
        stage: Stage,
        round: Vec<crate::client::EndpointRequest>,
    ) -> Result<Vec<crate::client::DispatchResult>, SimilarityError> {
        tracing::debug!(stage = %stage, requests = round.len(), "dispatching round");
        self.metrics.add_requests(round.len() as u64);
        self.dispatcher.dispatch_all(round).await.map_err(|e| {
            self.metrics.add_failure();
            tracing::debug!(stage = %stage, error = %e, "round failed");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Rotate.to_string(), "rotate");
        assert_eq!(Stage::Detect.to_string(), "detect");
        assert_eq!(Stage::Encode.to_string(), "encode");
        assert_eq!(Stage::Score.to_string(), "score");
    }

    #[tokio::test]
    async fn test_missing_rotate_url_fails_before_any_dispatch() {
        let config = Arc::new(Config::default());
        let comparison = Comparison::new(Dispatcher::new(&config).unwrap(), config);

        match comparison.compare("one", "two").await {
            Err(SimilarityError::ConfigurationMissing { name }) => {
                assert_eq!(name, crate::config::PRE_PROCESS_URL);
            }
            other => panic!("expected ConfigurationMissing, got {:?}", other),
        }
        assert_eq!(comparison.metrics().snapshot().requests_dispatched, 0);
    }
}
