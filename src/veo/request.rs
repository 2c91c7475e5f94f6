//! GenerationRequest - the immutable input to one video generation.

use std::fmt;
use std::path::Path;

use super::client::JobError;

/// Media types accepted for the reference image.
pub const SUPPORTED_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp"];

/// Validate a prompt before sending to the API.
///
/// Empty and whitespace-only prompts are rejected.
pub fn validate_prompt(prompt: &str) -> Result<(), JobError> {
    if prompt.trim().is_empty() {
        return Err(JobError::InvalidInput("prompt is empty".to_string()));
    }
    Ok(())
}

/// Video frame orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    /// 16:9
    #[default]
    Wide,
    /// 9:16
    Tall,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Wide => "16:9",
            AspectRatio::Tall => "9:16",
        }
    }
}

/// Target output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    /// 720p
    #[default]
    Standard,
    /// 1080p
    High,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Standard => "720p",
            Resolution::High => "1080p",
        }
    }
}

/// Supported Veo model identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Model {
    #[default]
    Veo2,
    Veo3Preview,
}

impl Model {
    /// Every model the client knows how to address.
    pub const ALL: [Model; 2] = [Model::Veo2, Model::Veo3Preview];

    /// Model identifier as used in the API path.
    pub fn id(&self) -> &'static str {
        match self {
            Model::Veo2 => "veo-2.0-generate-001",
            Model::Veo3Preview => "veo-3.0-generate-preview",
        }
    }

    /// Short display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Model::Veo2 => "VEO 2",
            Model::Veo3Preview => "VEO 3",
        }
    }

    /// Look up a model by its API identifier.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.id() == id)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Reference image sent inline with the prompt.
#[derive(Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    bytes: Vec<u8>,
    mime_type: String,
}

impl ReferenceImage {
    /// Wrap raw image bytes with their declared media type.
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Result<Self, JobError> {
        let mime_type = mime_type.into().to_ascii_lowercase();
        if !SUPPORTED_IMAGE_TYPES.contains(&mime_type.as_str()) {
            return Err(JobError::InvalidInput(format!(
                "unsupported image type '{}', expected one of: {}",
                mime_type,
                SUPPORTED_IMAGE_TYPES.join(", ")
            )));
        }
        if bytes.is_empty() {
            return Err(JobError::InvalidInput("reference image is empty".to_string()));
        }
        Ok(Self { bytes, mime_type })
    }

    /// Read an image from disk, inferring the media type from its extension.
    pub fn from_file(path: &Path) -> Result<Self, JobError> {
        let mime_type = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            _ => {
                return Err(JobError::InvalidInput(format!(
                    "cannot infer image type of '{}' (use .png, .jpg or .webp)",
                    path.display()
                )))
            }
        };
        let bytes = std::fs::read(path)?;
        Self::new(bytes, mime_type)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

impl fmt::Debug for ReferenceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceImage")
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// One video generation request. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
    reference_image: Option<ReferenceImage>,
    aspect_ratio: AspectRatio,
    resolution: Resolution,
    sound: bool,
    model: Model,
}

impl GenerationRequest {
    /// Start building a request for the given prompt.
    pub fn builder(prompt: impl Into<String>) -> GenerationRequestBuilder {
        GenerationRequestBuilder {
            prompt: prompt.into(),
            reference_image: None,
            aspect_ratio: AspectRatio::default(),
            resolution: Resolution::default(),
            sound: false,
            model: Model::default(),
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn reference_image(&self) -> Option<&ReferenceImage> {
        self.reference_image.as_ref()
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn sound(&self) -> bool {
        self.sound
    }

    pub fn model(&self) -> Model {
        self.model
    }

    /// Settings that were chosen but are not carried by the predictLongRunning call.
    ///
    /// Defaults are not reported, only values the caller changed.
    pub fn untransmitted_settings(&self) -> Vec<&'static str> {
        let mut dropped = Vec::new();
        if self.aspect_ratio != AspectRatio::default() {
            dropped.push("aspect ratio");
        }
        if self.resolution != Resolution::default() {
            dropped.push("resolution");
        }
        if self.sound {
            dropped.push("sound");
        }
        dropped
    }
}

/// Builder for [`GenerationRequest`].
#[derive(Debug)]
pub struct GenerationRequestBuilder {
    prompt: String,
    reference_image: Option<ReferenceImage>,
    aspect_ratio: AspectRatio,
    resolution: Resolution,
    sound: bool,
    model: Model,
}

impl GenerationRequestBuilder {
    pub fn reference_image(mut self, image: ReferenceImage) -> Self {
        self.reference_image = Some(image);
        self
    }

    pub fn aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn sound(mut self, sound: bool) -> Self {
        self.sound = sound;
        self
    }

    pub fn model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Finish the request, rejecting an empty prompt.
    pub fn build(self) -> Result<GenerationRequest, JobError> {
        validate_prompt(&self.prompt)?;
        Ok(GenerationRequest {
            prompt: self.prompt,
            reference_image: self.reference_image,
            aspect_ratio: self.aspect_ratio,
            resolution: self.resolution,
            sound: self.sound,
            model: self.model,
        })
    }
}
