//! Round execution: concurrent dispatch with submission-order aggregation.
//!
//! A round is a batch of requests issued together and resolved as a unit.
//! Every call outcome is captured — success, error status, transport
//! failure — and the batch always runs to completion before aggregation
//! decides whether the round succeeded. Results come back in submission
//! order, not arrival order.

use std::time::{Duration, Instant};

use futures::future::join_all;
use serde_json::Value;

use crate::client::proxy::ProxySelector;
use crate::config::Config;
use crate::error::SimilarityError;

/// Tag correlating a request/response to a logical source image.
///
/// Never used for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageTag {
    Img1,
    Img2,
}

impl std::fmt::Display for ImageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Img1 => "img_1",
            Self::Img2 => "img_2",
        })
    }
}

/// One request of a round.
#[derive(Debug, Clone)]
pub struct EndpointRequest {
    pub url: String,
    pub payload: Value,
    pub tag: ImageTag,
}

/// One completed call of a fully successful round.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub status: u16,
    pub body: Value,
    pub tag: ImageTag,
}

/// Captured outcome of a single call; aggregation decides what it means.
#[derive(Debug)]
enum Outcome {
    /// 200 with a decoded JSON body
    Ok { body: Value },
    /// Any other HTTP status, body kept as raw text
    Http { status: u16, body: String },
    /// No HTTP response at all (connect failure, timeout)
    Transport { detail: String },
    /// 200 whose body is not JSON
    Undecodable { detail: String },
}

#[derive(Debug)]
struct CallOutcome {
    endpoint: String,
    tag: ImageTag,
    outcome: Outcome,
}

/// Executes rounds of concurrent requests on a shared connection pool.
///
/// The dispatcher carries no per-round state; one instance is shared across
/// comparisons for connection reuse only.
#[derive(Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    selector: ProxySelector,
}

impl Dispatcher {
    pub fn new(config: &Config) -> Result<Self, SimilarityError> {
        let selector = ProxySelector::new(&config.proxy);
        let proxy_rule = selector.clone();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.http.connect_timeout_secs))
            .pool_max_idle_per_host(config.http.pool_max_idle_per_host)
            .proxy(reqwest::Proxy::custom(move |url| proxy_rule.proxy_for(url)))
            .build()
            .map_err(|e| SimilarityError::ClientInit {
                detail: e.to_string(),
            })?;
        Ok(Self { client, selector })
    }

    /// Dispatch one round.
    ///
    /// All calls run concurrently, each under its own per-call timeout.
    /// Either the full ordered result sequence comes back or the round fails
    /// as a whole; partial success is never surfaced.
    pub async fn dispatch_all(
        &self,
        requests: Vec<EndpointRequest>,
    ) -> Result<Vec<DispatchResult>, SimilarityError> {
        for request in &requests {
            self.selector.check(&request.url)?;
        }
        let outcomes = join_all(requests.into_iter().map(|r| self.execute(r))).await;
        aggregate(outcomes)
    }

    async fn execute(&self, request: EndpointRequest) -> CallOutcome {
        let EndpointRequest { url, payload, tag } = request;
        let start = Instant::now();
        let outcome = match self.client.post(&url).json(&payload).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                tracing::info!(
                    endpoint = %url,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    status,
                    "request completed"
                );
                if status == 200 {
                    match response.json::<Value>().await {
                        Ok(body) => Outcome::Ok { body },
                        Err(e) => Outcome::Undecodable {
                            detail: e.to_string(),
                        },
                    }
                } else {
                    let body = response.text().await.unwrap_or_default();
                    Outcome::Http { status, body }
                }
            }
            Err(e) => {
                tracing::info!(
                    endpoint = %url,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "request failed"
                );
                Outcome::Transport {
                    detail: e.to_string(),
                }
            }
        };
        CallOutcome {
            endpoint: url,
            tag,
            outcome,
        }
    }
}

/// Aggregate completed outcomes in submission order.
///
/// A 500 anywhere fails the round regardless of what else happened; then any
/// other error status; then transport failures; then undecodable bodies.
fn aggregate(outcomes: Vec<CallOutcome>) -> Result<Vec<DispatchResult>, SimilarityError> {
    for o in &outcomes {
        if let Outcome::Http { status: 500, .. } = o.outcome {
            return Err(SimilarityError::ExternalServiceFatal {
                endpoint: o.endpoint.clone(),
            });
        }
    }
    for o in &outcomes {
        if let Outcome::Http { status, body } = &o.outcome {
            return Err(SimilarityError::UpstreamError {
                endpoint: o.endpoint.clone(),
                status: *status,
                body: body.clone(),
            });
        }
    }
    let mut results = Vec::with_capacity(outcomes.len());
    for o in outcomes {
        match o.outcome {
            Outcome::Ok { body } => results.push(DispatchResult {
                status: 200,
                body,
                tag: o.tag,
            }),
            Outcome::Transport { detail } => {
                return Err(SimilarityError::ConnectionFailed {
                    endpoint: o.endpoint,
                    detail,
                })
            }
            Outcome::Undecodable { detail } => {
                return Err(SimilarityError::MalformedResponse {
                    endpoint: o.endpoint,
                    detail,
                })
            }
            // Handled by the scans above
            Outcome::Http { status, body } => {
                return Err(SimilarityError::UpstreamError {
                    endpoint: o.endpoint,
                    status,
                    body,
                })
            }
        }
    }
    Ok(results)
}
