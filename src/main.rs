mod cli;

use clap::Parser;
use cli::{Args, Command, GenerateOptions};
use tracing_subscriber::EnvFilter;
use veo_studio::config::Config;

/// Install the log subscriber. `RUST_LOG` overrides the default `warn` level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    // dotenv::dotenv() returns Err if .env doesn't exist, which is fine
    let _ = dotenv::dotenv();
    init_logging();

    let args = Args::parse();

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match args.command {
        Command::Generate {
            prompt,
            image,
            aspect_ratio,
            resolution,
            sound,
            model,
            output,
        } => cli::run_generate(
            &config,
            GenerateOptions {
                prompt,
                image,
                aspect_ratio,
                resolution,
                sound,
                model,
                output,
            },
        ),
        Command::Key { action } => cli::handle_key_action(&config, action),
        Command::Status => cli::show_status(&config),
        Command::Models => {
            cli::list_models();
            Ok(())
        }
        Command::Config { action } => {
            cli::handle_config_action(&config, args.config.as_deref(), action)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
