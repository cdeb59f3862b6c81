//! Error taxonomy for the comparison pipeline.
//!
//! Every failure a comparison can hit maps to exactly one variant here, with
//! enough structure (endpoint, status, body) for a boundary layer to build
//! its own response mapping without re-deriving anything.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimilarityError {
    /// A required endpoint URL or the proxy scheme variable is absent.
    #[error("required configuration missing: {name}")]
    ConfigurationMissing { name: String },

    /// The HTTP client could not be constructed.
    #[error("failed to initialize http client: {detail}")]
    ClientInit { detail: String },

    /// A call in the round never produced an HTTP response (connect failure,
    /// timeout, protocol error).
    #[error("failed to reach {endpoint}: {detail}")]
    ConnectionFailed { endpoint: String, detail: String },

    /// A remote service answered with a non-500 error status.
    #[error("{endpoint} returned status {status}: {body}")]
    UpstreamError {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// A remote service answered 500; the whole round is unusable.
    #[error("{endpoint} reported an internal error")]
    ExternalServiceFatal { endpoint: String },

    /// A 200 response whose body does not decode to the stage's shape.
    #[error("malformed response from {endpoint}: {detail}")]
    MalformedResponse { endpoint: String, detail: String },

    /// Fewer than two candidate frames contained a detectable face.
    #[error("no face detected in the images")]
    NoFaceDetected,

    /// The first two detected faces belong to the same source image.
    #[error("detected faces could not be assigned to both images")]
    AmbiguousFaceAssignment,

    /// An embedding vector does not have the expected length.
    #[error("embedding length mismatch: expected {expected}, got {left} and {right}")]
    DimensionMismatch {
        expected: usize,
        left: usize,
        right: usize,
    },
}

impl SimilarityError {
    /// Stable per-kind status code for boundary layers.
    ///
    /// The codes follow the deployment this core integrates with: 428 for
    /// pending configuration, 405 for unreachable collaborators, 424 for a
    /// remote 500, 417 for other upstream statuses, 406 when no face is
    /// found, 403 when faces cannot be assigned to both images.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ConfigurationMissing { .. } => 428,
            Self::ClientInit { .. } => 500,
            Self::ConnectionFailed { .. } => 405,
            Self::UpstreamError { .. } => 417,
            Self::ExternalServiceFatal { .. } => 424,
            Self::MalformedResponse { .. } => 422,
            Self::NoFaceDetected => 406,
            Self::AmbiguousFaceAssignment => 403,
            Self::DimensionMismatch { .. } => 422,
        }
    }
}
