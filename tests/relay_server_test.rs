//! Relay Server Integration Tests
//!
//! Runs the relay on an OS-assigned port in front of a wiremock detection
//! upstream.
//!
//! Test Coverage:
//! - Health check and browser client
//! - Passthrough relay returns the upstream payload unchanged
//! - Envelope relay wraps the upstream reply in a launch report
//! - Error taxonomy: no file, rejected, timeout, unreachable
//! - Job endpoints answer 501

mod common;

use common::{mp4_bytes, video_form, TestRelay};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn upstream() -> MockServer {
    MockServer::start().await
}

fn detection_url(server: &MockServer) -> String {
    format!("{}/beyblade-detection", server.uri())
}

#[tokio::test]
async fn test_health_check_endpoint() {
    let upstream = upstream().await;
    let relay = TestRelay::start(&detection_url(&upstream), 5).await;

    let response = reqwest::get(relay.url("/health")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_index_serves_browser_client() {
    let upstream = upstream().await;
    let relay = TestRelay::start(&detection_url(&upstream), 5).await;

    let response = reqwest::get(relay.url("/")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let body = response.text().await.unwrap();
    assert!(body.contains("/api/beyblade-detection"));
}

#[tokio::test]
async fn test_passthrough_returns_upstream_payload_unchanged() {
    let upstream = upstream().await;
    Mock::given(method("POST"))
        .and(path("/beyblade-detection"))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("filename=\"launch.mp4\""))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(b"annotated-video".to_vec()),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let relay = TestRelay::start(&detection_url(&upstream), 5).await;

    let response = reqwest::Client::new()
        .post(relay.url("/api/beyblade-detection"))
        .multipart(video_form("file", "launch.mp4", mp4_bytes(2048)))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers().get("content-type").unwrap(), "video/mp4");
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"annotated-video");
}

#[tokio::test]
async fn test_missing_file_field_is_400_without_upstream_call() {
    let upstream = upstream().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let relay = TestRelay::start(&detection_url(&upstream), 5).await;

    let response = reqwest::Client::new()
        .post(relay.url("/api/beyblade-detection"))
        .multipart(reqwest::multipart::Form::new().text("note", "no video here"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert_eq!(response.headers().get("x-relay-error").unwrap(), "no-file");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No file provided");
}

#[tokio::test]
async fn test_non_multipart_body_is_400() {
    let upstream = upstream().await;
    let relay = TestRelay::start(&detection_url(&upstream), 5).await;

    let response = reqwest::Client::new()
        .post(relay.url("/api/beyblade-detection"))
        .header("content-type", "application/json")
        .body("{}")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_upstream_rejection_forwards_status() {
    let upstream = upstream().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422))
        .mount(&upstream)
        .await;

    let relay = TestRelay::start(&detection_url(&upstream), 5).await;

    let response = reqwest::Client::new()
        .post(relay.url("/api/beyblade-detection"))
        .multipart(video_form("file", "launch.mp4", mp4_bytes(512)))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 422);
    assert_eq!(response.headers().get("x-relay-error").unwrap(), "rejected");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body["error"],
        "Arena rejected the battle: 422 Unprocessable Entity"
    );
}

#[tokio::test]
async fn test_upstream_timeout_is_408() {
    let upstream = upstream().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(3)))
        .mount(&upstream)
        .await;

    let relay = TestRelay::start(&detection_url(&upstream), 1).await;

    let response = reqwest::Client::new()
        .post(relay.url("/api/beyblade-detection"))
        .multipart(video_form("file", "launch.mp4", mp4_bytes(512)))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 408);
    assert_eq!(response.headers().get("x-relay-error").unwrap(), "timeout");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body["error"],
        "Battle timeout! The arena took too long to respond."
    );
}

#[tokio::test]
async fn test_unreachable_upstream_is_503() {
    // Nothing listens on port 1
    let relay = TestRelay::start("http://127.0.0.1:1/beyblade-detection", 5).await;

    let response = reqwest::Client::new()
        .post(relay.url("/api/beyblade-detection"))
        .multipart(video_form("file", "launch.mp4", mp4_bytes(512)))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 503);
    assert_eq!(
        response.headers().get("x-relay-error").unwrap(),
        "unreachable"
    );
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body["error"],
        "Cannot reach the battle arena! Check your connection."
    );
}

#[tokio::test]
async fn test_envelope_route_reports_launch() {
    let upstream = upstream().await;
    Mock::given(method("POST"))
        .and(path("/beyblade-detection"))
        .and(body_string_contains("name=\"file\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "beyblades": 2,
            "winner": "Pegasus"
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let relay = TestRelay::start(&detection_url(&upstream), 5).await;

    let response = reqwest::Client::new()
        .post(relay.url("/api/upload"))
        .multipart(video_form("video", "battle.mp4", mp4_bytes(1000)))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["filename"], "battle.mp4");
    assert_eq!(body["size"], 1000);
    assert_eq!(body["message"], "Video launched into Beyblade detection arena!");
    assert_eq!(body["detectionResult"]["winner"], "Pegasus");
    assert!(body["jobId"].as_str().unwrap().starts_with("job_"));
}

#[tokio::test]
async fn test_envelope_route_requires_video_field() {
    let upstream = upstream().await;
    let relay = TestRelay::start(&detection_url(&upstream), 5).await;

    let response = reqwest::Client::new()
        .post(relay.url("/api/upload"))
        .multipart(video_form("file", "battle.mp4", mp4_bytes(64)))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_job_endpoints_are_not_implemented() {
    let upstream = upstream().await;
    let relay = TestRelay::start(&detection_url(&upstream), 5).await;
    let client = reqwest::Client::new();

    let process = client
        .post(relay.url("/api/process"))
        .json(&serde_json::json!({ "videoId": "abc" }))
        .send()
        .await
        .unwrap();
    assert_eq!(process.status(), 501);

    let status = client
        .get(relay.url("/api/status/job_1_abcdefghi"))
        .send()
        .await
        .unwrap();
    assert_eq!(status.status(), 501);
    let body: serde_json::Value = status.json().await.unwrap();
    assert_eq!(body["error"], "Job tracking is not implemented");
}

#[tokio::test]
async fn test_unknown_routes() {
    let upstream = upstream().await;
    let relay = TestRelay::start(&detection_url(&upstream), 5).await;
    let client = reqwest::Client::new();

    let missing = client.get(relay.url("/nowhere")).send().await.unwrap();
    assert_eq!(missing.status(), 404);

    let wrong_method = client
        .get(relay.url("/api/beyblade-detection"))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_method.status(), 405);
}
