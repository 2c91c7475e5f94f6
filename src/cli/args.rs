//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::enums::{AspectChoice, ModelChoice, ResolutionChoice};

/// Generate short videos with Google Veo from the terminal
#[derive(Parser, Debug)]
#[command(name = "veo-studio")]
#[command(version, about = "Generate videos with Google Veo", long_about = None)]
#[command(after_help = "EXAMPLES:
    # Store your API key (or set GEMINI_API_KEY in .env and omit it)
    veo-studio key set AIza...

    # Generate a video
    veo-studio generate \"a cat surfing at sunset\"

    # Animate a reference image with Veo 3
    veo-studio generate \"the statue starts to dance\" --image statue.png --model veo3")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a video from a prompt
    Generate {
        /// Text describing the video
        prompt: String,

        /// Reference image (.png, .jpg or .webp)
        #[arg(long, short)]
        image: Option<PathBuf>,

        /// Aspect ratio (not sent to the API yet)
        #[arg(long, default_value = "16:9")]
        aspect_ratio: AspectChoice,

        /// Resolution (not sent to the API yet)
        #[arg(long, default_value = "720p")]
        resolution: ResolutionChoice,

        /// Generate sound (not sent to the API yet)
        #[arg(long)]
        sound: bool,

        /// Model to use (default from config, else veo2)
        #[arg(long, short)]
        model: Option<ModelChoice>,

        /// Where to save the video (default: ./generated-video-<n>.mp4)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Show API key and usage status
    Status,
    /// List supported models
    Models,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum KeyAction {
    /// Save a new API key and reset the usage counter
    Set {
        /// The key; read from GEMINI_API_KEY when omitted
        key: Option<String>,
    },
    /// Forget the stored API key
    Clear,
    /// Show the fingerprint of the stored API key
    Show,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}
