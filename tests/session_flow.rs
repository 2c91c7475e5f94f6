//! End-to-end session tests against a mock Veo service.
//!
//! Covers the usage ceiling, credential rejection and persisted state.

mod common;

use common::*;
use veo_studio::session::{
    CredentialStore, FileStore, MemoryStore, Notice, QuotaPolicy, Session, SessionError,
    CREDENTIAL_KEY, USAGE_KEY,
};
use veo_studio::veo::{
    AspectRatio, Credential, GenerationRequest, JobError, KeywordClassifier, PollPolicy,
    RejectionKind,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_with_usage(usage: u32) -> MemoryStore {
    let mut store = MemoryStore::new();
    store.save(&Credential::new(TEST_KEY).unwrap()).unwrap();
    store.record_usage(usage).unwrap();
    store
}

fn request(prompt: &str) -> GenerationRequest {
    GenerationRequest::builder(prompt).build().unwrap()
}

#[tokio::test]
async fn test_successful_generation_counts_once() {
    let server = MockServer::start().await;
    let media = tempfile::tempdir().unwrap();
    mount_successful_job(&server).await;

    let client = client(&server, media.path(), VirtualClock::new());
    let mut session = Session::open(store_with_usage(3)).unwrap();
    let mut notices = Vec::new();

    let summary = session
        .generate(&client, &request("a cat"), |n| notices.push(n))
        .await
        .unwrap();

    assert_eq!(summary.usage, 4);
    assert_eq!(summary.remaining, 6);
    assert!(!summary.credential_cleared);
    assert!(notices.is_empty());
    assert_eq!(session.usage(), 4);
    assert_eq!(session.store().entry(USAGE_KEY), Some("4"));
    assert_eq!(session.credential().unwrap().expose(), TEST_KEY);

    let result = session.current_result().unwrap();
    assert_eq!(std::fs::read(result.path()).unwrap(), VIDEO_BYTES);
}

#[tokio::test]
async fn test_generation_failure_leaves_counter_and_key() {
    let server = MockServer::start().await;
    let media = tempfile::tempdir().unwrap();
    mount_submit(&server).await;
    mount_polls(&server, failed_operation("prompt blocked")).await;

    let client = client(&server, media.path(), VirtualClock::new());
    let mut session = Session::open(store_with_usage(3)).unwrap();

    let err = session
        .generate(&client, &request("a cat"), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SessionError::Generation {
            source: JobError::GenerationFailed(_),
            rejection: RejectionKind::Other,
        }
    ));
    assert!(!err.requires_new_credential());
    assert_eq!(session.usage(), 3);
    assert_eq!(session.store().entry(USAGE_KEY), Some("3"));
    assert!(session.credential().is_some());
    assert!(session.current_result().is_none());
}

#[tokio::test]
async fn test_permission_denied_clears_key() {
    let server = MockServer::start().await;
    let media = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": {
                "code": 403,
                "message": "The caller does not have permission",
                "status": "PERMISSION_DENIED"
            }
        })))
        .mount(&server)
        .await;

    let client = client(&server, media.path(), VirtualClock::new());
    let mut session = Session::open(store_with_usage(2)).unwrap();
    let mut notices = Vec::new();

    let err = session
        .generate(&client, &request("a cat"), |n| notices.push(n))
        .await
        .unwrap_err();

    assert!(err.requires_new_credential());
    assert_eq!(
        notices,
        vec![Notice::CredentialRejected(RejectionKind::PermissionDenied)]
    );
    assert!(session.credential().is_none());
    assert_eq!(session.store().entry(CREDENTIAL_KEY), None);
    // Clearing a key does not touch its counter.
    assert_eq!(session.store().entry(USAGE_KEY), Some("2"));
}

#[tokio::test]
async fn test_quota_error_in_operation_clears_key() {
    let server = MockServer::start().await;
    let media = tempfile::tempdir().unwrap();
    mount_submit(&server).await;
    mount_polls(
        &server,
        failed_operation("Quota exceeded for aiplatform.googleapis.com"),
    )
    .await;

    let client = client(&server, media.path(), VirtualClock::new());
    let mut session = Session::open(store_with_usage(0)).unwrap();

    let err = session
        .generate(&client, &request("a cat"), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SessionError::Generation {
            rejection: RejectionKind::QuotaExhausted,
            ..
        }
    ));
    assert!(session.credential().is_none());
}

#[tokio::test]
async fn test_timeout_keeps_key() {
    let server = MockServer::start().await;
    let media = tempfile::tempdir().unwrap();
    mount_submit(&server).await;

    Mock::given(method("GET"))
        .and(path(OPERATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(running_operation()))
        .mount(&server)
        .await;

    // 40 polls at 10s: the error text mentions "400s".
    let client = client(&server, media.path(), VirtualClock::new()).with_poll_policy(PollPolicy {
        max_polls: Some(40),
        ..PollPolicy::default()
    });
    let mut session = Session::open(store_with_usage(5)).unwrap();
    let mut notices = Vec::new();

    let err = session
        .generate(&client, &request("a cat"), |n| notices.push(n))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("400"));
    assert!(matches!(
        err,
        SessionError::Generation {
            source: JobError::Timeout { polls: 40, .. },
            rejection: RejectionKind::Other,
        }
    ));
    assert!(!err.requires_new_credential());
    assert!(notices.is_empty());
    assert_eq!(session.credential().unwrap().expose(), TEST_KEY);
    assert_eq!(session.store().entry(USAGE_KEY), Some("5"));
}

#[tokio::test]
async fn test_download_fault_hides_key_and_keeps_it() {
    let server = MockServer::start().await;
    let media = tempfile::tempdir().unwrap();
    mount_submit(&server).await;

    // Nothing listens on port 1.
    Mock::given(method("GET"))
        .and(path(OPERATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": OPERATION_NAME,
            "done": true,
            "response": {
                "generateVideoResponse": {
                    "generatedSamples": [
                        { "video": { "uri": "http://127.0.0.1:1/files/video.mp4?alt=media" } }
                    ]
                }
            }
        })))
        .mount(&server)
        .await;

    let key = "AIza-quota-403-secret";
    let mut store = MemoryStore::new();
    store.save(&Credential::new(key).unwrap()).unwrap();

    let client = client(&server, media.path(), VirtualClock::new());
    let mut session = Session::open(store).unwrap();

    let err = session
        .generate(&client, &request("a cat"), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SessionError::Generation {
            source: JobError::Transport(_),
            rejection: RejectionKind::Other,
        }
    ));
    assert!(!err.to_string().contains(key));
    assert!(!format!("{:?}", err).contains(key));
    assert_eq!(session.credential().unwrap().expose(), key);
}

#[tokio::test]
async fn test_blank_prompt_leaves_session_untouched() {
    let server = MockServer::start().await;
    let session = Session::open(store_with_usage(4)).unwrap();

    let err = GenerationRequest::builder("  \n ").build().unwrap_err();

    assert!(matches!(err, JobError::InvalidInput(_)));
    assert_eq!(session.usage(), 4);
    assert_eq!(session.store().entry(USAGE_KEY), Some("4"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_exhausted_key_makes_no_call() {
    let server = MockServer::start().await;
    let media = tempfile::tempdir().unwrap();

    let client = client(&server, media.path(), VirtualClock::new());
    let mut session = Session::open(store_with_usage(10)).unwrap();

    let err = session
        .generate(&client, &request("a cat"), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::QuotaExceeded { used: 10, ceiling: 10 }));
    assert!(err.requires_new_credential());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_key_makes_no_call() {
    let server = MockServer::start().await;
    let media = tempfile::tempdir().unwrap();

    let client = client(&server, media.path(), VirtualClock::new());
    let mut session = Session::open(MemoryStore::new()).unwrap();

    let err = session
        .generate(&client, &request("a cat"), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::MissingCredential));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_last_generation_warns_then_clears() {
    let server = MockServer::start().await;
    let media = tempfile::tempdir().unwrap();
    mount_successful_job(&server).await;

    let client = client(&server, media.path(), VirtualClock::new());
    let mut session = Session::open(store_with_usage(9)).unwrap();
    let mut notices = Vec::new();

    let summary = session
        .generate(&client, &request("a cat"), |n| notices.push(n))
        .await
        .unwrap();

    assert_eq!(
        notices,
        vec![
            Notice::LastGeneration { ceiling: 10 },
            Notice::QuotaExhausted { ceiling: 10 },
        ]
    );
    assert_eq!(summary.usage, 10);
    assert_eq!(summary.remaining, 0);
    assert!(summary.credential_cleared);
    assert!(session.credential().is_none());
    assert_eq!(session.store().entry(USAGE_KEY), Some("10"));
    // The video from the last allowed generation is still available.
    assert!(session.current_result().is_some());
}

#[tokio::test]
async fn test_ten_generations_clear_key_exactly_once() {
    let server = MockServer::start().await;
    let media = tempfile::tempdir().unwrap();
    mount_successful_job(&server).await;

    let client = client(&server, media.path(), VirtualClock::new());
    let mut session = Session::open(store_with_usage(0)).unwrap();
    let mut notices = Vec::new();

    for _ in 0..10 {
        session
            .generate(&client, &request("a cat"), |n| notices.push(n))
            .await
            .unwrap();
    }

    let exhausted = notices
        .iter()
        .filter(|n| matches!(n, Notice::QuotaExhausted { .. }))
        .count();
    assert_eq!(exhausted, 1);
    assert_eq!(session.usage(), 10);
    assert!(session.credential().is_none());

    let err = session
        .generate(&client, &request("a cat"), |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::MissingCredential));

    session.save_credential(Credential::new("new-key").unwrap()).unwrap();
    assert_eq!(session.usage(), 0);
}

#[tokio::test]
async fn test_custom_ceiling() {
    let server = MockServer::start().await;
    let media = tempfile::tempdir().unwrap();
    mount_successful_job(&server).await;

    let client = client(&server, media.path(), VirtualClock::new());
    let mut session = Session::open_with(
        store_with_usage(0),
        QuotaPolicy::new(2),
        KeywordClassifier::default(),
    )
    .unwrap();

    let first = session
        .generate(&client, &request("a cat"), |_| {})
        .await
        .unwrap();
    assert_eq!(first.remaining, 1);

    let second = session
        .generate(&client, &request("a cat"), |_| {})
        .await
        .unwrap();
    assert!(second.credential_cleared);
}

#[tokio::test]
async fn test_unsent_settings_are_announced() {
    let server = MockServer::start().await;
    let media = tempfile::tempdir().unwrap();
    mount_successful_job(&server).await;

    let client = client(&server, media.path(), VirtualClock::new());
    let mut session = Session::open(store_with_usage(0)).unwrap();
    let mut notices = Vec::new();

    let request = GenerationRequest::builder("a cat")
        .aspect_ratio(AspectRatio::Tall)
        .sound(true)
        .build()
        .unwrap();
    session
        .generate(&client, &request, |n| notices.push(n))
        .await
        .unwrap();

    assert_eq!(
        notices,
        vec![Notice::SettingsNotTransmitted(vec!["aspect ratio", "sound"])]
    );
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let server = MockServer::start().await;
    let media = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    let state_file = state.path().join("state.toml");
    mount_successful_job(&server).await;

    let client = client(&server, media.path(), VirtualClock::new());
    {
        let mut session = Session::open(FileStore::new(state_file.clone())).unwrap();
        session.save_credential(Credential::new(TEST_KEY).unwrap()).unwrap();
        session
            .generate(&client, &request("a cat"), |_| {})
            .await
            .unwrap();
    }

    let reopened = Session::open(FileStore::new(state_file)).unwrap();
    assert_eq!(reopened.credential().unwrap().expose(), TEST_KEY);
    assert_eq!(reopened.usage(), 1);
}
