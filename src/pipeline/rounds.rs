//! Round construction and response decoding for each pipeline stage.
//!
//! Every comparison runs three rounds: rotate (6 calls), detect (8 calls,
//! one per candidate frame), encode (2 calls). The builders here produce the
//! requests in their fixed submission order and the decoders turn raw round
//! results back into stage data.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::{DispatchResult, EndpointRequest, ImageTag};
use crate::error::SimilarityError;

/// Angles requested from the rotation service. The 0° variant is the
/// unrotated original and never goes over the network.
pub const ROTATE_ANGLES: [u16; 3] = [90, 180, 270];

/// Face location within a frame. Opaque: produced by the detection service
/// and passed to the encoding service unmodified.
pub type BoundingBox = Value;

/// One base64 frame considered by the detect stage.
#[derive(Debug, Clone)]
pub struct CandidateFrame {
    pub image: String,
    pub tag: ImageTag,
}

#[derive(Debug, Deserialize)]
struct RotateResponse {
    b64_image: String,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    number_of_faces: u64,
    #[serde(default)]
    data: Vec<Detection>,
}

#[derive(Debug, Deserialize)]
struct Detection {
    bounding_box: BoundingBox,
}

#[derive(Debug, Deserialize)]
struct EncodeResponse {
    faces_encoding: Vec<Vec<f64>>,
}

/// Build the rotate round: angle-major over {90, 180, 270}, each angle for
/// image 1 then image 2.
pub fn rotate_round(url: &str, image_1: &str, image_2: &str) -> Vec<EndpointRequest> {
    let mut requests = Vec::with_capacity(ROTATE_ANGLES.len() * 2);
    for angle in ROTATE_ANGLES {
        for (image, tag) in [(image_1, ImageTag::Img1), (image_2, ImageTag::Img2)] {
            requests.push(EndpointRequest {
                url: url.to_string(),
                payload: json!({ "image": image, "angle": angle }),
                tag,
            });
        }
    }
    requests
}

/// Assemble the candidate frames for detection from the rotate round's
/// results, appending the unrotated originals as the 0° candidates.
pub fn candidate_frames(
    endpoint: &str,
    rotated: Vec<DispatchResult>,
    image_1: &str,
    image_2: &str,
) -> Result<Vec<CandidateFrame>, SimilarityError> {
    let mut frames = Vec::with_capacity(rotated.len() + 2);
    for result in rotated {
        let response: RotateResponse = decode(endpoint, &result.body)?;
        frames.push(CandidateFrame {
            image: response.b64_image,
            tag: result.tag,
        });
    }
    frames.push(CandidateFrame {
        image: image_1.to_string(),
        tag: ImageTag::Img1,
    });
    frames.push(CandidateFrame {
        image: image_2.to_string(),
        tag: ImageTag::Img2,
    });
    Ok(frames)
}

/// Build the detect round, one request per candidate frame, tags carried
/// over from the frames.
pub fn detect_round(url: &str, frames: &[CandidateFrame]) -> Vec<EndpointRequest> {
    frames
        .iter()
        .map(|frame| EndpointRequest {
            url: url.to_string(),
            payload: json!({ "image": frame.image, "cropped": false }),
            tag: frame.tag,
        })
        .collect()
}

/// Select one bounding box per logical image from the detect round.
///
/// Scans results in submission order and takes the first two frames that
/// report at least one face — deliberately not an exhaustive best-match
/// search, so a later, better detection for the same image is ignored.
/// Returns the boxes keyed as (image 1, image 2).
pub fn select_faces(
    endpoint: &str,
    results: &[DispatchResult],
) -> Result<(BoundingBox, BoundingBox), SimilarityError> {
    let mut selected: Vec<(BoundingBox, ImageTag)> = Vec::with_capacity(2);
    for result in results {
        let response: DetectResponse = decode(endpoint, &result.body)?;
        if response.number_of_faces == 0 {
            continue;
        }
        let detection = response.data.into_iter().next().ok_or_else(|| {
            SimilarityError::MalformedResponse {
                endpoint: endpoint.to_string(),
                detail: "number_of_faces > 0 but data is empty".to_string(),
            }
        })?;
        selected.push((detection.bounding_box, result.tag));
        if selected.len() == 2 {
            break;
        }
    }

    let second = selected.pop();
    let first = selected.pop();
    match (first, second) {
        (Some((box_a, tag_a)), Some((box_b, tag_b))) => match (tag_a, tag_b) {
            (ImageTag::Img1, ImageTag::Img2) => Ok((box_a, box_b)),
            (ImageTag::Img2, ImageTag::Img1) => Ok((box_b, box_a)),
            _ => Err(SimilarityError::AmbiguousFaceAssignment),
        },
        _ => Err(SimilarityError::NoFaceDetected),
    }
}

/// Build the encode round: the original unrotated image of each logical
/// image, paired with the bounding box its own tag selected in DETECT.
pub fn encode_round(
    url: &str,
    image_1: &str,
    box_1: BoundingBox,
    image_2: &str,
    box_2: BoundingBox,
) -> Vec<EndpointRequest> {
    vec![
        EndpointRequest {
            url: url.to_string(),
            payload: json!({ "b64_image": image_1, "face_locations": box_1 }),
            tag: ImageTag::Img1,
        },
        EndpointRequest {
            url: url.to_string(),
            payload: json!({ "b64_image": image_2, "face_locations": box_2 }),
            tag: ImageTag::Img2,
        },
    ]
}

/// Extract the embedding vector from an encode result: the first element of
/// the `faces_encoding` list.
pub fn embedding(endpoint: &str, result: &DispatchResult) -> Result<Vec<f64>, SimilarityError> {
    let response: EncodeResponse = decode(endpoint, &result.body)?;
    response.faces_encoding.into_iter().next().ok_or_else(|| {
        SimilarityError::MalformedResponse {
            endpoint: endpoint.to_string(),
            detail: "faces_encoding is empty".to_string(),
        }
    })
}

fn decode<T: serde::de::DeserializeOwned>(
    endpoint: &str,
    body: &Value,
) -> Result<T, SimilarityError> {
    serde_json::from_value(body.clone()).map_err(|e| SimilarityError::MalformedResponse {
        endpoint: endpoint.to_string(),
        detail: e.to_string(),
    })
}
