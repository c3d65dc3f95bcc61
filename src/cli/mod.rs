//! Command-line interface for the `rsa` binary.

pub mod commands;
pub mod output;
pub mod types;

use console::style;

use crate::domain::errors::RsaError;
use crate::infrastructure::config::LoaderError;

pub use types::{Cli, Commands};

/// Process exit code for a successful run.
pub const EXIT_SUCCESS: i32 = 0;
/// Any failure without a more specific code.
pub const EXIT_FAILURE: i32 = 1;
/// Invalid configuration or arguments.
pub const EXIT_CONFIG: i32 = 2;
/// The run was cancelled (128 + SIGINT).
pub const EXIT_ABORTED: i32 = 130;

/// Map an error to the process exit code.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(rsa) = err.downcast_ref::<RsaError>() {
        return match rsa {
            RsaError::Config(_) => EXIT_CONFIG,
            RsaError::Aborted => EXIT_ABORTED,
            RsaError::Call(_) | RsaError::Timeout { .. } => EXIT_FAILURE,
        };
    }
    if err.downcast_ref::<LoaderError>().is_some() {
        return EXIT_CONFIG;
    }
    EXIT_FAILURE
}

/// Report `err` and return the exit code to use.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) -> i32 {
    let code = exit_code(err);
    if json_mode {
        let kind = err
            .downcast_ref::<RsaError>()
            .map_or("error", RsaError::kind);
        let body = serde_json::json!({
            "error": {
                "kind": kind,
                "message": format!("{err:#}"),
                "exit_code": code,
            }
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", style("error:").red().bold());
    }
    code
}
