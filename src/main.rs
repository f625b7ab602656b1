use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;
use voxclip::app::{run_file_command, run_record_command, run_remote_command};
use voxclip::audio::capture::list_devices;
use voxclip::cli::{Cli, Commands, ConfigAction};
use voxclip::config::Config;
use voxclip::diagnostics::check_dependencies;
use voxclip::error::AcquireError;
use voxclip::output::print_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    if let Err(e) = run(cli).await {
        if let Some(acquire) = e.downcast_ref::<AcquireError>() {
            print_error(acquire);
            std::process::exit(1);
        }
        return Err(e);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Record {
            seconds,
            device,
            output,
        } => {
            let config = load_config(cli.config.as_deref())?;
            run_record_command(config, seconds, device, output, cli.quiet).await?;
        }
        Commands::File { path, kind, output } => {
            let config = load_config(cli.config.as_deref())?;
            run_file_command(config, path, kind, output, cli.quiet).await?;
        }
        Commands::Remote { url, output } => {
            let config = load_config(cli.config.as_deref())?;
            run_remote_command(config, url, output, cli.quiet).await?;
        }
        Commands::Devices => {
            list_audio_devices()?;
        }
        Commands::Check => {
            let config = load_config(cli.config.as_deref())?;
            check_dependencies(&config).await;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "voxclip",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins; otherwise `-q` → error, default warn, `-v` → info,
/// `-vv` → debug.
fn init_tracing(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("voxclip={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/voxclip/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path())?,
    };

    Ok(config.with_env_overrides())
}

/// List available audio input devices.
fn list_audio_devices() -> Result<()> {
    let devices = list_devices()?;

    if devices.is_empty() {
        eprintln!("No audio input devices found");
        std::process::exit(1);
    }

    println!("Available audio input devices:");
    for (idx, device) in devices.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }

    Ok(())
}

/// Handle configuration commands.
fn handle_config_command(
    action: ConfigAction,
    custom_path: Option<&std::path::Path>,
) -> Result<()> {
    let config_path = custom_path
        .map(std::path::PathBuf::from)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Show => {
            let config = Config::load_or_default(&config_path)?.with_env_overrides();
            print!("{}", config.to_redacted_toml()?);
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                eprintln!(
                    "{} {} already exists (use --force to overwrite)",
                    "⚠".yellow(),
                    config_path.display()
                );
                std::process::exit(1);
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let contents = toml::to_string_pretty(&Config::default())?;
            std::fs::write(&config_path, contents)
                .with_context(|| format!("Failed to write {}", config_path.display()))?;
            println!("{} Wrote {}", "✓".green(), config_path.display());
        }
    }
    Ok(())
}
