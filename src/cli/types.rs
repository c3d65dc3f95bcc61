//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::run::RunArgs;

#[derive(Parser, Debug)]
#[command(name = "rsa")]
#[command(about = "Recursive self-aggregation over a model CLI", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Settings file (defaults to .rsa/config.yaml and .rsa/local.yaml)
    #[arg(short, long, global = true, env = "RSA_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a question by recursive self-aggregation
    Run(RunArgs),
}
