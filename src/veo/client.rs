//! JobClient - drives one Veo generation through submit, poll and download.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use super::credential::Credential;
use super::operation::{GenerationJob, JobFailure, JobState, Operation};
use super::request::GenerationRequest;
use super::result::PlayableResult;
use super::retry::{
    calculate_backoff, is_transient_network_error, is_transient_status, DEFAULT_BACKOFF_BASE,
    DEFAULT_BACKOFF_MAX, DEFAULT_TRANSIENT_RETRIES,
};

/// Default base URL for the Gemini API.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// API version segment.
const API_VERSION: &str = "v1beta";

/// Default wait between status queries (10 seconds).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default timeout for a single HTTP request (60 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default connection timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the API key on submit and poll calls.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Time source for the poll loop.
///
/// Production code uses [`TokioClock`]; tests substitute a clock that
/// advances virtually so the loop runs without real delays.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Wall clock backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// How the client waits for an operation to finish.
///
/// `max_wait` and `max_polls` are unset by default: the loop runs until the
/// service reports a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Option<Duration>,
    pub max_polls: Option<u32>,
    pub transient_retries: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
            max_polls: None,
            transient_retries: DEFAULT_TRANSIENT_RETRIES,
        }
    }
}

/// Body of the predictLongRunning call.
#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: Vec<Instance<'a>>,
    parameters: Parameters,
}

#[derive(Debug, Serialize)]
struct Instance<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<InlineImage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineImage {
    bytes_base64_encoded: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Parameters {
    sample_count: u32,
}

impl<'a> PredictRequest<'a> {
    fn from_request(request: &'a GenerationRequest) -> Self {
        let image = request.reference_image().map(|image| InlineImage {
            bytes_base64_encoded: base64::engine::general_purpose::STANDARD.encode(image.bytes()),
            mime_type: image.mime_type().to_string(),
        });
        Self {
            instances: vec![Instance {
                prompt: request.prompt(),
                image,
            }],
            parameters: Parameters { sample_count: 1 },
        }
    }
}

/// Google API error envelope.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Pull a readable message out of an error response body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => match envelope.error.status {
            Some(status) => format!("{} ({})", envelope.error.message, status),
            None => envelope.error.message,
        },
        _ if body.trim().is_empty() => "Unknown error".to_string(),
        _ => body.trim().to_string(),
    }
}

/// Client for the Veo long-running generation API.
///
/// The client holds no credential; each call takes the key to use, so the
/// session can rotate it between generations.
pub struct JobClient<C = TokioClock> {
    base_url: String,
    media_dir: PathBuf,
    poll_policy: PollPolicy,
    clock: C,
    http_client: reqwest::Client,
}

impl JobClient<TokioClock> {
    /// Create a client against the public Gemini endpoint.
    ///
    /// Downloaded videos are written below `media_dir`.
    pub fn new(media_dir: PathBuf) -> Result<Self, JobError> {
        Self::with_base_url(GEMINI_API_BASE_URL.to_string(), media_dir)
    }

    /// Create a client with a custom base URL.
    ///
    /// Useful for testing against a mock server.
    pub fn with_base_url(base_url: String, media_dir: PathBuf) -> Result<Self, JobError> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            media_dir,
            poll_policy: PollPolicy::default(),
            clock: TokioClock,
            http_client,
        })
    }
}

impl<C: Clock> JobClient<C> {
    /// Replace the poll policy.
    pub fn with_poll_policy(mut self, poll_policy: PollPolicy) -> Self {
        self.poll_policy = poll_policy;
        self
    }

    /// Replace the clock used by the poll loop.
    pub fn with_clock<T: Clock>(self, clock: T) -> JobClient<T> {
        JobClient {
            base_url: self.base_url,
            media_dir: self.media_dir,
            poll_policy: self.poll_policy,
            clock,
            http_client: self.http_client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll_policy
    }

    /// Run the whole lifecycle: submit, wait, download.
    ///
    /// The prompt is non-empty by construction of [`GenerationRequest`].
    ///
    /// # Errors
    ///
    /// `JobError::Api` when the service rejects a call,
    /// `JobError::GenerationFailed` when the operation finishes with an error,
    /// `JobError::MissingResult` when it finishes without a video,
    /// `JobError::DownloadFailed` when fetching the video fails,
    /// `JobError::Timeout` when a configured poll bound is hit,
    /// or `JobError::Transport` for network faults.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
    ) -> Result<PlayableResult, JobError> {
        log::info!(
            "Starting video generation with {} (key {})",
            request.model(),
            credential.fingerprint()
        );

        let mut job = self.submit(request, credential).await?;
        log::info!("Generation submitted, operation: {}", job.handle());

        let video_uri = self.wait_for_completion(&mut job, credential).await?;
        log::info!("Generation complete after {} polls", job.polls());

        let dest = self.video_path(job.handle());
        let result = self.download(&video_uri, credential, &dest, job.handle()).await?;
        log::info!(
            "Video downloaded to {:?} ({} bytes)",
            result.path(),
            result.size_bytes()
        );
        Ok(result)
    }

    /// Submit a generation request.
    ///
    /// Aspect ratio, resolution and sound are not part of the call; a warning
    /// is logged when the request sets any of them.
    pub async fn submit(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
    ) -> Result<GenerationJob, JobError> {
        let dropped = request.untransmitted_settings();
        if !dropped.is_empty() {
            log::warn!(
                "Not sent to the generation API: {}",
                dropped.join(", ")
            );
        }

        let url = format!(
            "{}/{}/models/{}:predictLongRunning",
            self.base_url,
            API_VERSION,
            request.model().id()
        );

        let response = self
            .http_client
            .post(&url)
            .header(API_KEY_HEADER, credential.expose())
            .json(&PredictRequest::from_request(request))
            .send()
            .await?;

        let operation = Self::read_operation(response, "Submission").await?;
        if operation.name.is_empty() && !operation.done {
            return Err(JobError::Decode(
                "submission response carried no operation name".to_string(),
            ));
        }
        Ok(GenerationJob::from_submission(operation))
    }

    /// Query the operation once and apply the result to `job`.
    pub async fn poll(&self, job: &mut GenerationJob, credential: &Credential) -> Result<(), JobError> {
        let url = format!("{}/{}/{}", self.base_url, API_VERSION, job.handle());

        let response = self
            .http_client
            .get(&url)
            .header(API_KEY_HEADER, credential.expose())
            .send()
            .await?;

        let operation = Self::read_operation(response, "Status check").await?;
        job.observe(operation);
        Ok(())
    }

    /// Poll until the job reaches a terminal state and return the video URI.
    ///
    /// Polls are strictly sequential with `interval` between them.
    pub async fn wait_for_completion(
        &self,
        job: &mut GenerationJob,
        credential: &Credential,
    ) -> Result<String, JobError> {
        let started = self.clock.now();

        while !job.is_terminal() {
            if let Some(max_polls) = self.poll_policy.max_polls {
                if job.polls() >= max_polls {
                    log::error!("Generation still running after {} polls", job.polls());
                    return Err(JobError::Timeout {
                        polls: job.polls(),
                        elapsed: self.clock.now().saturating_duration_since(started),
                    });
                }
            }
            if let Some(max_wait) = self.poll_policy.max_wait {
                let elapsed = self.clock.now().saturating_duration_since(started);
                if elapsed >= max_wait {
                    log::error!("Generation timed out after {:?}", elapsed);
                    return Err(JobError::Timeout {
                        polls: job.polls(),
                        elapsed,
                    });
                }
            }

            self.clock.sleep(self.poll_policy.interval).await;
            self.poll_with_retry(job, credential).await?;

            match job.state() {
                JobState::Polling => log::debug!("Status: generating (poll {})", job.polls()),
                JobState::Completed { .. } => log::info!("Generation complete!"),
                JobState::Failed(failure) => log::error!("Generation failed: {:?}", failure),
                JobState::Submitted => {}
            }
        }

        match job.state() {
            JobState::Completed { video_uri } => Ok(video_uri.clone()),
            JobState::Failed(JobFailure::Generation(message)) => {
                Err(JobError::GenerationFailed(message.clone()))
            }
            JobState::Failed(JobFailure::MissingResult) => Err(JobError::MissingResult),
            JobState::Failed(JobFailure::Fault(detail)) => Err(JobError::Decode(detail.clone())),
            JobState::Submitted | JobState::Polling => Err(JobError::Decode(
                "operation left the poll loop without finishing".to_string(),
            )),
        }
    }

    async fn poll_with_retry(&self, job: &mut GenerationJob, credential: &Credential) -> Result<(), JobError> {
        let mut attempt = 0u32;
        loop {
            match self.poll(job, credential).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.poll_policy.transient_retries => {
                    let delay = calculate_backoff(attempt, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX);
                    attempt += 1;
                    log::warn!(
                        "Status check failed (attempt {}/{}): {}. Retrying in {:?}...",
                        attempt,
                        self.poll_policy.transient_retries + 1,
                        e,
                        delay
                    );
                    self.clock.sleep(delay).await;
                }
                Err(e) => {
                    job.fault(e.to_string());
                    return Err(e);
                }
            }
        }
    }

    /// Download the video at `uri` to `dest`, passing the key as `key=` query parameter.
    ///
    /// Streams the body to disk. A partial file is removed on failure.
    pub async fn download(
        &self,
        uri: &str,
        credential: &Credential,
        dest: &Path,
        handle: &str,
    ) -> Result<PlayableResult, JobError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self
            .http_client
            .get(uri)
            .query(&[("key", credential.expose())])
            .send()
            .await
            .map_err(redact_url)?;

        if !response.status().is_success() {
            let status = response.status();
            log::error!("Video download failed with status {}", status);
            return Err(JobError::DownloadFailed(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match Self::stream_to_file(response, dest).await {
            Ok(size_bytes) => Ok(PlayableResult::new(
                dest.to_path_buf(),
                size_bytes,
                content_type,
                uri.to_string(),
                handle.to_string(),
            )),
            Err(e) => {
                let _ = tokio::fs::remove_file(dest).await;
                Err(e)
            }
        }
    }

    async fn stream_to_file(response: reqwest::Response, dest: &Path) -> Result<u64, JobError> {
        use futures_util::StreamExt;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(redact_url)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        Ok(written)
    }

    /// Local file name for an operation's video: hash of the handle.
    pub fn video_path(&self, handle: &str) -> PathBuf {
        let digest = Sha256::digest(handle.as_bytes());
        self.media_dir.join(format!("{}.mp4", hex::encode(&digest[..16])))
    }

    async fn read_operation(response: reqwest::Response, what: &str) -> Result<Operation, JobError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            log::warn!("{} rejected with status {}: {}", what, status, message);
            return Err(JobError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| JobError::Decode(format!("{} response could not be parsed: {}", what, e)))
    }
}

/// The download URL carries the key, so its errors drop the URL.
fn redact_url(error: reqwest::Error) -> JobError {
    JobError::Transport(error.without_url())
}

/// Errors from the generation lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API request failed with status {status}: {message}")]
    Api {
        /// HTTP status code of the rejected call
        status: u16,
        /// Provider message, or the raw body when it is not JSON
        message: String,
    },

    #[error("Video generation failed: {0}")]
    GenerationFailed(String),

    #[error("Video generation completed, but no download link was found")]
    MissingResult,

    #[error("Failed to download video file. Status: {0}")]
    DownloadFailed(u16),

    #[error("Generation still running after {polls} polls ({elapsed:?})")]
    Timeout { polls: u32, elapsed: Duration },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    /// Whether retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            JobError::Transport(e) => is_transient_network_error(e),
            JobError::Api { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }

    /// Text reported by the remote service, if this error came from it.
    ///
    /// Locally produced errors (timeouts, transport faults, parse failures)
    /// return `None` and never reflect on the credential.
    pub fn provider_message(&self) -> Option<String> {
        match self {
            JobError::Api { status, message } => Some(format!("{} {}", status, message)),
            JobError::GenerationFailed(message) => Some(message.clone()),
            _ => None,
        }
    }
}
