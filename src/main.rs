use clap::Parser;
use log::{error, info, warn};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use webmon::cli::Cli;
use webmon::config::SAMPLE_CONFIG;
use webmon::mailer::Mailer;
use webmon::{Config, Error};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(default_level));

    if cli.generate_config {
        print!("{SAMPLE_CONFIG}");
        return ExitCode::SUCCESS;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            error!("Failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    if cli.test_mail {
        return send_test_mail(&config).await;
    }

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    match webmon::run(config, token).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Reads the file named on the command line, or the default config file.
/// Only an explicitly named file is required to exist.
fn load_config(cli: &Cli) -> Result<Config, Error> {
    if let Some(path) = &cli.config {
        info!("Loading configuration from {}", path.display());
        return Config::load(path);
    }
    match Config::default_path() {
        Some(path) if path.exists() => {
            info!("Loading configuration from {}", path.display());
            Config::load(path)
        }
        _ => {
            warn!("No configuration file found, using defaults");
            Ok(Config::default())
        }
    }
}

async fn send_test_mail(config: &Config) -> ExitCode {
    let Some(mailer) = Mailer::from_settings(&config.mail) else {
        error!("Mail is not configured");
        return ExitCode::FAILURE;
    };
    let body = "This is a test message from webmon.".to_string();
    match mailer.send("webmon test message", body).await {
        Ok(()) => {
            info!("Test mail sent");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("Error sending test mail: {err}");
            ExitCode::FAILURE
        }
    }
}
