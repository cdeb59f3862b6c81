//! Dispatcher integration tests against in-process HTTP services.
//!
//! Each test binds a throwaway axum server on an ephemeral loopback port,
//! so the proxy bypass path is exercised and no scheme is required.

use axum::extract::Json;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};

use crate::client::{Dispatcher, EndpointRequest, ImageTag};
use crate::config::Config;
use crate::error::SimilarityError;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn test_router() -> Router {
    Router::new()
        .route(
            "/echo",
            post(|Json(payload): Json<Value>| async move { Json(payload) }),
        )
        .route(
            "/fatal",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route(
            "/missing",
            post(|| async { (StatusCode::NOT_FOUND, "no such route") }),
        )
        .route("/garbage", post(|| async { "not json at all" }))
        .route(
            "/slow",
            post(|| async {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                Json(json!({}))
            }),
        )
}

fn dispatcher() -> Dispatcher {
    Dispatcher::new(&Config::default()).unwrap()
}

fn request(base: &str, route: &str, payload: Value, tag: ImageTag) -> EndpointRequest {
    EndpointRequest {
        url: format!("{}{}", base, route),
        payload,
        tag,
    }
}

#[tokio::test]
async fn test_dispatch_returns_results_in_submission_order() {
    let base = serve(test_router()).await;
    let requests: Vec<_> = (0..6)
        .map(|i| {
            let tag = if i % 2 == 0 {
                ImageTag::Img1
            } else {
                ImageTag::Img2
            };
            request(&base, "/echo", json!({ "seq": i }), tag)
        })
        .collect();

    let results = dispatcher().dispatch_all(requests).await.unwrap();

    assert_eq!(results.len(), 6);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.status, 200);
        assert_eq!(result.body["seq"], i, "result {} out of order", i);
        let expected_tag = if i % 2 == 0 {
            ImageTag::Img1
        } else {
            ImageTag::Img2
        };
        assert_eq!(result.tag, expected_tag);
    }
}

#[tokio::test]
async fn test_single_500_fails_the_whole_round() {
    let base = serve(test_router()).await;
    let requests = vec![
        request(&base, "/echo", json!({"seq": 0}), ImageTag::Img1),
        request(&base, "/fatal", json!({}), ImageTag::Img2),
        request(&base, "/echo", json!({"seq": 2}), ImageTag::Img1),
    ];

    match dispatcher().dispatch_all(requests).await {
        Err(SimilarityError::ExternalServiceFatal { endpoint }) => {
            assert!(endpoint.ends_with("/fatal"));
        }
        other => panic!("expected ExternalServiceFatal, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_200_surfaces_endpoint_status_and_body() {
    let base = serve(test_router()).await;
    let requests = vec![
        request(&base, "/echo", json!({}), ImageTag::Img1),
        request(&base, "/missing", json!({}), ImageTag::Img2),
    ];

    match dispatcher().dispatch_all(requests).await {
        Err(SimilarityError::UpstreamError {
            endpoint,
            status,
            body,
        }) => {
            assert!(endpoint.ends_with("/missing"));
            assert_eq!(status, 404);
            assert_eq!(body, "no such route");
        }
        other => panic!("expected UpstreamError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_undecodable_200_body_is_malformed_response() {
    let base = serve(test_router()).await;
    let requests = vec![request(&base, "/garbage", json!({}), ImageTag::Img1)];

    assert!(matches!(
        dispatcher().dispatch_all(requests).await,
        Err(SimilarityError::MalformedResponse { .. })
    ));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_connection_failed() {
    // Bind then drop a listener so the port is known-dead.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let requests = vec![EndpointRequest {
        url: format!("http://{}/echo", addr),
        payload: json!({}),
        tag: ImageTag::Img1,
    }];

    match dispatcher().dispatch_all(requests).await {
        Err(SimilarityError::ConnectionFailed { endpoint, .. }) => {
            assert!(endpoint.contains(&addr.port().to_string()));
        }
        other => panic!("expected ConnectionFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_per_call_timeout_fails_the_round() {
    let base = serve(test_router()).await;
    let mut config = Config::default();
    config.http.request_timeout_secs = 1;
    let dispatcher = Dispatcher::new(&config).unwrap();

    let requests = vec![
        request(&base, "/echo", json!({}), ImageTag::Img1),
        request(&base, "/slow", json!({}), ImageTag::Img2),
    ];

    match dispatcher.dispatch_all(requests).await {
        Err(SimilarityError::ConnectionFailed { endpoint, .. }) => {
            assert!(endpoint.ends_with("/slow"));
        }
        other => panic!("expected ConnectionFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_loopback_round_without_scheme_fails_before_dispatch() {
    // Host never resolved: the configuration check fires first.
    let requests = vec![EndpointRequest {
        url: "http://faces.internal:9002/image/face-detect".to_string(),
        payload: json!({}),
        tag: ImageTag::Img1,
    }];

    match dispatcher().dispatch_all(requests).await {
        Err(SimilarityError::ConfigurationMissing { name }) => {
            assert_eq!(name, "SCHEMES");
        }
        other => panic!("expected ConfigurationMissing, got {:?}", other),
    }
}
