//! Subcommand handlers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use veo_studio::config::{default_path as get_config_path, Config, DEFAULT_CONFIG_TEMPLATE};
use veo_studio::session::{FileStore, Notice, QuotaPolicy, Session, SessionError};
use veo_studio::veo::{
    Credential, GenerationRequest, JobClient, KeywordClassifier, Model, ReferenceImage,
    GEMINI_API_KEY_ENV,
};

use super::args::{ConfigAction, KeyAction};
use super::enums::{AspectChoice, ModelChoice, ResolutionChoice};

/// Messages shown while waiting for the video.
const LOADING_MESSAGES: &[&str] = &[
    "Warming up the model...",
    "Reading your prompt and reference image...",
    "Drafting the first frames...",
    "This can take a few minutes, please be patient.",
    "Stitching scenes together...",
    "Rendering the final video...",
    "Almost there...",
];

/// How often a loading message is printed.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(15);

/// Options of the generate subcommand.
pub struct GenerateOptions {
    pub prompt: String,
    pub image: Option<PathBuf>,
    pub aspect_ratio: AspectChoice,
    pub resolution: ResolutionChoice,
    pub sound: bool,
    pub model: Option<ModelChoice>,
    pub output: Option<PathBuf>,
}

type FileSession = Session<FileStore, KeywordClassifier>;

fn open_session(config: &Config) -> Result<FileSession, String> {
    let store = FileStore::new(config.storage.state_file());
    Session::open_with(
        store,
        QuotaPolicy::new(config.quota.ceiling),
        KeywordClassifier::default(),
    )
    .map_err(|e| format!("Failed to open session: {}", e))
}

fn resolve_model(choice: Option<ModelChoice>, config: &Config) -> Result<Model, String> {
    if let Some(choice) = choice {
        return Ok(choice.into());
    }
    match config.api.model.as_deref() {
        Some(id) => Model::from_id(id).ok_or_else(|| {
            format!(
                "Unknown model '{}' in config. Run 'veo-studio models' to list supported models.",
                id
            )
        }),
        None => Ok(Model::default()),
    }
}

fn print_notice(notice: &Notice) {
    match notice {
        Notice::LastGeneration { ceiling } => println!(
            "Warning: this is generation {} of {}. After it you will need a new API key.",
            ceiling, ceiling
        ),
        Notice::QuotaExhausted { ceiling } => println!(
            "You have reached the limit of {} generations. Run 'veo-studio key set' with a new API key to continue.",
            ceiling
        ),
        Notice::CredentialRejected(kind) => println!(
            "The API key was rejected ({:?}) and has been removed.",
            kind
        ),
        Notice::SettingsNotTransmitted(settings) => println!(
            "Note: {} cannot be sent to the Veo API yet and will be ignored.",
            settings.join(", ")
        ),
    }
}

/// First free default output name: `generated-video-{n}.mp4`, then
/// `generated-video-{n}-1.mp4`, `-2` and so on.
fn default_output_path(dir: &Path, usage: u32) -> PathBuf {
    let first = dir.join(format!("generated-video-{}.mp4", usage));
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|i| dir.join(format!("generated-video-{}-{}.mp4", usage, i)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

/// Run the generate subcommand.
pub fn run_generate(config: &Config, options: GenerateOptions) -> Result<(), String> {
    let mut session = open_session(config)?;

    let mut builder = GenerationRequest::builder(options.prompt)
        .aspect_ratio(options.aspect_ratio.into())
        .resolution(options.resolution.into())
        .sound(options.sound)
        .model(resolve_model(options.model, config)?);
    if let Some(path) = &options.image {
        let image = ReferenceImage::from_file(path)
            .map_err(|e| format!("Failed to load reference image: {}", e))?;
        builder = builder.reference_image(image);
    }
    let request = builder.build().map_err(|e| e.to_string())?;

    let client = JobClient::with_base_url(config.api.base_url.clone(), config.storage.media_dir())
        .map_err(|e| format!("Failed to create client: {}", e))?
        .with_poll_policy(config.polling.poll_policy());

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to create async runtime: {}", e))?;

    println!("Generating video with {} for: \"{}\"", request.model().display_name(), request.prompt());
    println!();

    let outcome = rt.block_on(async {
        let generation = session.generate(&client, &request, |notice| print_notice(&notice));
        tokio::pin!(generation);

        let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
        let mut shown = 0usize;
        loop {
            tokio::select! {
                outcome = &mut generation => break Some(outcome),
                _ = ticker.tick() => {
                    println!("  {}", LOADING_MESSAGES[shown % LOADING_MESSAGES.len()]);
                    shown += 1;
                }
                _ = tokio::signal::ctrl_c() => break None,
            }
        }
    });

    let summary = match outcome {
        None => {
            return Err("Interrupted. The remote job may still be running; it will not be downloaded.".to_string())
        }
        Some(Ok(summary)) => summary,
        Some(Err(e)) => return Err(describe_failure(&e)),
    };

    let result = session
        .take_result()
        .ok_or_else(|| "Generation finished but no video was kept".to_string())?;
    let dest = options
        .output
        .unwrap_or_else(|| default_output_path(Path::new("."), summary.usage));
    let kept = result.path().to_path_buf();
    let saved = result.persist(&dest).map_err(|e| {
        format!(
            "Failed to save video to {}: {}\nThe video is still available at {}",
            dest.display(),
            e,
            kept.display()
        )
    })?;

    println!();
    println!("Video ready!");
    println!("  Path: {}", saved.display());
    if !summary.credential_cleared {
        println!(
            "  Generations left for this key: {} of {}",
            summary.remaining,
            session.policy().ceiling()
        );
    }
    Ok(())
}

/// Turn a session error into the message shown to the user.
fn describe_failure(error: &SessionError) -> String {
    if matches!(error, SessionError::MissingCredential) {
        format!("{}\n\nRun 'veo-studio key set' to store your Gemini API key.", error)
    } else if error.requires_new_credential() {
        format!(
            "{}\n\nThe API key is invalid or has reached its limit. Run 'veo-studio key set' with a new key.",
            error
        )
    } else {
        format!("{}\n\nYour prompt was not used up; run the same command again to retry.", error)
    }
}

/// Handle key subcommand actions.
pub fn handle_key_action(config: &Config, action: KeyAction) -> Result<(), String> {
    let mut session = open_session(config)?;
    match action {
        KeyAction::Set { key } => {
            let credential = match key {
                Some(value) => Credential::new(value).map_err(|e| e.to_string())?,
                None => Credential::from_env().ok_or_else(|| {
                    format!(
                        "No key given and {} is not set.\n\n\
                        Pass the key directly:\n    veo-studio key set <KEY>\n\n\
                        Or add it to a .env file:\n    echo '{}=your-api-key-here' >> .env",
                        GEMINI_API_KEY_ENV, GEMINI_API_KEY_ENV
                    )
                })?,
            };
            let fingerprint = credential.fingerprint();
            session
                .save_credential(credential)
                .map_err(|e| format!("Failed to save API key: {}", e))?;
            println!("Saved API key {}. Usage counter reset to 0.", fingerprint);
        }
        KeyAction::Clear => {
            session
                .clear_credential()
                .map_err(|e| format!("Failed to clear API key: {}", e))?;
            println!("API key removed.");
        }
        KeyAction::Show => match session.credential() {
            Some(credential) => println!("API key: {}", credential.fingerprint()),
            None => println!("No API key stored."),
        },
    }
    Ok(())
}

/// Print credential and usage status.
pub fn show_status(config: &Config) -> Result<(), String> {
    let session = open_session(config)?;
    let ceiling = session.policy().ceiling();
    match session.credential() {
        Some(credential) => {
            println!("API key: {}", credential.fingerprint());
            println!("Generations used: {}/{}", session.usage(), ceiling);
            println!("Generations left: {}", session.policy().remaining(session.usage()));
        }
        None => {
            println!("API key: not set");
            println!("Run 'veo-studio key set' to store one.");
        }
    }
    println!("State file: {}", session.store().path().display());
    Ok(())
}

/// List supported models.
pub fn list_models() {
    println!("Available models:");
    for model in Model::ALL {
        let marker = if model == Model::default() { " (default)" } else { "" };
        println!("  {:<8} {}{}", model.display_name(), model.id(), marker);
    }
}

/// Handle config subcommand actions.
pub fn handle_config_action(config: &Config, config_path: Option<&Path>, action: ConfigAction) -> Result<(), String> {
    let config_path = config_path.map(PathBuf::from).unwrap_or_else(get_config_path);
    match action {
        ConfigAction::Show => {
            println!("Current configuration:");
            println!("  API base URL: {}", config.api.base_url);
            println!(
                "  Model: {}",
                config.api.model.as_deref().unwrap_or(Model::default().id())
            );
            println!("  Poll interval: {}s", config.polling.interval_secs);
            match config.polling.max_wait_secs {
                Some(secs) => println!("  Max wait: {}s", secs),
                None => println!("  Max wait: none"),
            }
            println!("  Transient retries: {}", config.polling.transient_retries);
            println!("  Generation limit per key: {}", config.quota.ceiling);
            println!("  State file: {}", config.storage.state_file().display());
            println!("  Media dir: {}", config.storage.media_dir().display());
            println!();

            if config_path.exists() {
                println!("Config file: {} (exists)", config_path.display());
            } else {
                println!("Config file: {} (not found)", config_path.display());
            }
        }
        ConfigAction::Init => {
            if config_path.exists() {
                return Err(format!(
                    "Config file already exists: {}\nUse 'veo-studio config show' to view current settings.",
                    config_path.display()
                ));
            }

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Error creating config directory: {}", e))?;
            }

            std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)
                .map_err(|e| format!("Error writing config file: {}", e))?;

            println!("Created config file: {}", config_path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use veo_studio::veo::{JobError, RejectionKind};

    #[test]
    fn test_resolve_model_prefers_flag() {
        let mut config = Config::default();
        config.api.model = Some("veo-2.0-generate-001".to_string());
        assert_eq!(
            resolve_model(Some(ModelChoice::Veo3), &config).unwrap(),
            Model::Veo3Preview
        );
    }

    #[test]
    fn test_resolve_model_from_config_and_default() {
        let mut config = Config::default();
        assert_eq!(resolve_model(None, &config).unwrap(), Model::Veo2);

        config.api.model = Some("veo-3.0-generate-preview".to_string());
        assert_eq!(resolve_model(None, &config).unwrap(), Model::Veo3Preview);

        config.api.model = Some("veo-9".to_string());
        assert!(resolve_model(None, &config).is_err());
    }

    #[test]
    fn test_describe_failure_distinguishes_credential_problems() {
        let rejected = SessionError::Generation {
            source: JobError::Api {
                status: 403,
                message: "permission denied".to_string(),
            },
            rejection: RejectionKind::PermissionDenied,
        };
        assert!(describe_failure(&rejected).contains("key set"));

        let generic = SessionError::Generation {
            source: JobError::MissingResult,
            rejection: RejectionKind::Other,
        };
        assert!(describe_failure(&generic).contains("run the same command again"));
    }

    #[test]
    fn test_default_output_path_skips_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            default_output_path(dir.path(), 1),
            dir.path().join("generated-video-1.mp4")
        );

        std::fs::write(dir.path().join("generated-video-1.mp4"), b"v").unwrap();
        std::fs::write(dir.path().join("generated-video-1-1.mp4"), b"v").unwrap();
        assert_eq!(
            default_output_path(dir.path(), 1),
            dir.path().join("generated-video-1-2.mp4")
        );
    }

    #[test]
    fn test_config_init_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("veo").join("config.toml");

        handle_config_action(&Config::default(), Some(path.as_path()), ConfigAction::Init).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG_TEMPLATE);

        let again = handle_config_action(&Config::default(), Some(path.as_path()), ConfigAction::Init);
        assert!(again.is_err());
    }
}
