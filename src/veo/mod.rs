//! Gemini Veo video generation client.
//!
//! A generation is a long-running operation: the request is submitted, the
//! operation is polled until it is done, and the produced video is downloaded
//! into a local media directory.

mod classify;
mod client;
mod credential;
mod operation;
mod request;
mod result;
mod retry;

pub use classify::{KeywordClassifier, RejectionClassifier, RejectionKind};
pub use client::{
    Clock, JobClient, JobError, PollPolicy, TokioClock, DEFAULT_POLL_INTERVAL,
    GEMINI_API_BASE_URL,
};
pub use credential::{Credential, GEMINI_API_KEY_ENV};
pub use operation::{GenerationJob, JobFailure, JobState, Operation};
pub use request::{
    validate_prompt, AspectRatio, GenerationRequest, GenerationRequestBuilder, Model,
    ReferenceImage, Resolution, SUPPORTED_IMAGE_TYPES,
};
pub use result::{PlayableResult, ResultSlot};
pub use retry::{calculate_backoff, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX};
