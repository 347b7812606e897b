//! # Client Integration Tests
//!
//! Runs [`ComputeClient`] and [`LoadGenerator`] against a mock
//! fibonacci-service to verify the failure taxonomy (non-200, undecodable
//! body), the wire shape of outgoing requests, and prompt loop shutdown on
//! cancellation.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use fibonacci_demo::{ComputeClient, JsonSink, LoadGenerator, Logger, TraceEnricher};
use opentelemetry::Context;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_logger() -> Logger {
    Logger::new(Arc::new(TraceEnricher::new(JsonSink::new(io::sink()))))
}

/// A successful exchange returns the decoded result, and the outgoing
/// request carries the JSON body and content type the service expects.
#[tokio::test]
async fn test_call_compute_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/compute"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({"n": 10})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"f": 55})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ComputeClient::new(&server.uri());
    let f = client.call_compute(&Context::new(), 10).await.unwrap();
    assert_eq!(f, 55);
}

/// A 500 from the service surfaces as an error value whose message
/// identifies the non-200 response; no numeric result is produced.
#[tokio::test]
async fn test_call_compute_non_200_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/compute"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = ComputeClient::new(&server.uri());
    let err = client.call_compute(&Context::new(), 10).await.unwrap_err();
    assert!(err.to_string().contains("non-200 response: 500"));
}

/// A 200 with an undecodable body surfaces as a decode error.
#[tokio::test]
async fn test_call_compute_undecodable_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/compute"))
        .respond_with(ResponseTemplate::new(200).set_body_string("definitely not json"))
        .mount(&server)
        .await;

    let client = ComputeClient::new(&server.uri());
    let err = client.call_compute(&Context::new(), 10).await.unwrap_err();
    assert!(err.to_string().contains("couldn't decode"));
}

/// An unreachable service surfaces as a transport error, not a panic.
#[tokio::test]
async fn test_call_compute_transport_failure() {
    // Nothing listens here; reqwest fails at connect time.
    let client = ComputeClient::new("http://127.0.0.1:1");
    let err = client.call_compute(&Context::new(), 10).await.unwrap_err();
    assert!(err.to_string().contains("couldn't call the fibonacci-service"));
}

/// After cancellation the generator stops issuing requests within one
/// iteration's bound instead of waiting out its full sleep.
#[tokio::test]
async fn test_load_generator_stops_on_cancellation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/compute"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"f": 1})))
        .mount(&server)
        .await;

    let generator = LoadGenerator::new(ComputeClient::new(&server.uri()), test_logger());
    let shutdown = CancellationToken::new();

    let handle = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { generator.run(shutdown).await }
    });

    // Let at least one exchange happen, then cancel mid-sleep.
    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("generator should stop within one iteration's bound")
        .expect("generator task should not panic");
}

/// Errors are reported per-iteration; the loop keeps running after a
/// failing exchange until told to stop.
#[tokio::test]
async fn test_load_generator_survives_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/compute"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let generator = LoadGenerator::new(ComputeClient::new(&server.uri()), test_logger());
    let shutdown = CancellationToken::new();

    let handle = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { generator.run(shutdown).await }
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_finished(), "loop must not exit on request errors");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("generator should stop after cancellation")
        .expect("generator task should not panic");
}
