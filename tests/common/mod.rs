//! Shared helpers for the HTTP-level tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use veo_studio::veo::{Clock, JobClient};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_KEY: &str = "test-key";
pub const SUBMIT_PATH: &str = "/v1beta/models/veo-2.0-generate-001:predictLongRunning";
pub const OPERATION_NAME: &str = "models/veo-2.0-generate-001/operations/op-1";
pub const OPERATION_PATH: &str = "/v1beta/models/veo-2.0-generate-001/operations/op-1";
pub const VIDEO_PATH: &str = "/files/video.mp4";
pub const VIDEO_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42fake-video";

/// Clock that advances instantly and records every sleep.
#[derive(Clone)]
pub struct VirtualClock {
    now: Arc<Mutex<Instant>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        *self.now.lock().unwrap() += duration;
        self.sleeps.lock().unwrap().push(duration);
        std::future::ready(())
    }
}

pub fn client(server: &MockServer, media_dir: &std::path::Path, clock: VirtualClock) -> JobClient<VirtualClock> {
    JobClient::with_base_url(server.uri(), media_dir.to_path_buf())
        .unwrap()
        .with_clock(clock)
}

pub fn pending_operation() -> serde_json::Value {
    serde_json::json!({ "name": OPERATION_NAME })
}

pub fn running_operation() -> serde_json::Value {
    serde_json::json!({ "name": OPERATION_NAME, "done": false })
}

pub fn completed_operation(server: &MockServer) -> serde_json::Value {
    serde_json::json!({
        "name": OPERATION_NAME,
        "done": true,
        "response": {
            "generateVideoResponse": {
                "generatedSamples": [
                    { "video": { "uri": format!("{}{}?alt=media", server.uri(), VIDEO_PATH) } }
                ]
            }
        }
    })
}

pub fn failed_operation(message: &str) -> serde_json::Value {
    serde_json::json!({
        "name": OPERATION_NAME,
        "done": true,
        "error": { "code": 3, "message": message }
    })
}

pub async fn mount_submit(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(pending_operation()))
        .mount(server)
        .await;
}

/// First status check reports the job running, every later one `last`.
pub async fn mount_polls(server: &MockServer, last: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(OPERATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(running_operation()))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(OPERATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(last))
        .mount(server)
        .await;
}

pub async fn mount_video(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(VIDEO_PATH))
        .and(query_param("key", TEST_KEY))
        .and(query_param("alt", "media"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(VIDEO_BYTES),
        )
        .mount(server)
        .await;
}

/// Submit, one running poll, completion and download.
pub async fn mount_successful_job(server: &MockServer) {
    mount_submit(server).await;
    mount_polls(server, completed_operation(server)).await;
    mount_video(server).await;
}
