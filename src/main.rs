//! RSA CLI entry point.

use clap::Parser;

use rsa_engine::cli::{handle_error, Cli, Commands};
use rsa_engine::infrastructure::config::{ConfigLoader, Settings};
use rsa_engine::infrastructure::logging::LoggerImpl;

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    match cli.config {
        Some(ref path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(err) => std::process::exit(handle_error(&err, cli.json)),
    };

    // Keep the guard alive so file logs are flushed on exit
    let _logger = match LoggerImpl::init(&settings.logging) {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("warning: logging disabled: {err:#}");
            None
        }
    };

    let result = match cli.command {
        Commands::Run(args) => rsa_engine::cli::commands::run::execute(args, settings, cli.json).await,
    };

    if let Err(err) = result {
        std::process::exit(handle_error(&err, cli.json));
    }
}
