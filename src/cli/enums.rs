//! CLI enum types for model, aspect ratio and resolution options.

use clap::ValueEnum;

use veo_studio::veo::{AspectRatio, Model, Resolution};

/// Veo model to generate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ModelChoice {
    #[default]
    #[value(name = "veo2", alias = "veo-2.0-generate-001")]
    Veo2,
    #[value(name = "veo3", alias = "veo-3.0-generate-preview")]
    Veo3,
}

impl From<ModelChoice> for Model {
    fn from(m: ModelChoice) -> Self {
        match m {
            ModelChoice::Veo2 => Model::Veo2,
            ModelChoice::Veo3 => Model::Veo3Preview,
        }
    }
}

/// Frame orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AspectChoice {
    #[default]
    #[value(name = "16:9")]
    Wide,
    #[value(name = "9:16")]
    Tall,
}

impl From<AspectChoice> for AspectRatio {
    fn from(a: AspectChoice) -> Self {
        match a {
            AspectChoice::Wide => AspectRatio::Wide,
            AspectChoice::Tall => AspectRatio::Tall,
        }
    }
}

/// Output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ResolutionChoice {
    #[default]
    #[value(name = "720p")]
    Standard,
    #[value(name = "1080p")]
    High,
}

impl From<ResolutionChoice> for Resolution {
    fn from(r: ResolutionChoice) -> Self {
        match r {
            ResolutionChoice::Standard => Resolution::Standard,
            ResolutionChoice::High => Resolution::High,
        }
    }
}
