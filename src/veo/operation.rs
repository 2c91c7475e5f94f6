//! GenerationJob - state of one long-running Veo operation.
//!
//! ```text
//! Submitted --(poll, not done)--> Polling --(done, no error)--> Completed
//!     |                              |
//!     +------(done with error / fault)-----------------------> Failed
//! ```
//!
//! Transitions only move forward. A terminal job ignores further updates.

use serde::Deserialize;

/// Long-running operation as returned by submission and status calls.
#[derive(Debug, Deserialize)]
pub struct Operation {
    /// Operation resource name, e.g. `models/veo-2.0-generate-001/operations/abc`.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationError>,
    #[serde(default)]
    pub response: Option<OperationResult>,
}

/// Error payload of a finished operation.
#[derive(Debug, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: String,
}

/// Response payload of a finished operation.
///
/// The REST API nests samples under `generateVideoResponse`; the SDK shape
/// `generatedVideos` is accepted too.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    #[serde(default)]
    generate_video_response: Option<VideoResponse>,
    #[serde(default)]
    generated_videos: Option<Vec<GeneratedSample>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    #[serde(default)]
    video: Option<VideoRef>,
}

#[derive(Debug, Deserialize)]
struct VideoRef {
    #[serde(default)]
    uri: Option<String>,
}

impl OperationResult {
    /// URI of the first generated video, if any.
    pub fn video_uri(&self) -> Option<&str> {
        let samples = self
            .generate_video_response
            .as_ref()
            .map(|r| r.generated_samples.as_slice())
            .or(self.generated_videos.as_deref())?;
        samples
            .first()
            .and_then(|s| s.video.as_ref())
            .and_then(|v| v.uri.as_deref())
            .filter(|uri| !uri.is_empty())
    }
}

/// Why a job ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobFailure {
    /// The operation finished with an error payload.
    Generation(String),
    /// The operation finished cleanly but carried no video reference.
    MissingResult,
    /// Transport or decode fault while talking to the service.
    Fault(String),
}

/// Current state of a [`GenerationJob`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    Polling,
    Completed { video_uri: String },
    Failed(JobFailure),
}

/// One in-flight or finished generation.
#[derive(Debug)]
pub struct GenerationJob {
    handle: String,
    state: JobState,
    polls: u32,
}

impl GenerationJob {
    /// Create a job from the submission response.
    ///
    /// The service may already report the operation as done.
    pub fn from_submission(operation: Operation) -> Self {
        let mut job = Self {
            handle: operation.name.clone(),
            state: JobState::Submitted,
            polls: 0,
        };
        if operation.done {
            job.resolve(operation);
        }
        job
    }

    /// Operation handle used for status queries.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Number of status queries applied so far.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, JobState::Completed { .. } | JobState::Failed(_))
    }

    /// Apply a status query result.
    pub fn observe(&mut self, operation: Operation) {
        if self.is_terminal() {
            return;
        }
        self.polls += 1;
        if operation.done {
            self.resolve(operation);
        } else {
            self.state = JobState::Polling;
        }
    }

    /// Mark the job failed after a transport or decode fault.
    pub fn fault(&mut self, detail: impl Into<String>) {
        if !self.is_terminal() {
            self.state = JobState::Failed(JobFailure::Fault(detail.into()));
        }
    }

    fn resolve(&mut self, operation: Operation) {
        self.state = if let Some(error) = operation.error {
            let message = if error.message.is_empty() {
                match error.code {
                    Some(code) => format!("error code {}", code),
                    None => "unknown error".to_string(),
                }
            } else {
                error.message
            };
            JobState::Failed(JobFailure::Generation(message))
        } else {
            match operation.response.as_ref().and_then(|r| r.video_uri()) {
                Some(uri) => JobState::Completed {
                    video_uri: uri.to_string(),
                },
                None => JobState::Failed(JobFailure::MissingResult),
            }
        };
    }
}
