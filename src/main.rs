use std::process::ExitCode;

use capsule_allocator::AllocationError;
use capsule_allocator::config::ServerConfig;
use capsule_allocator::data::AllocationInput;
use capsule_allocator::{server, solver};
use log::error;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid input in {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("could not encode output: {0}")]
    Encode(serde_json::Error),

    #[error(transparent)]
    Solve(#[from] AllocationError),
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match std::env::args().nth(1) {
        Some(path) => match solve_file(&path) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{e}");
                ExitCode::FAILURE
            }
        },
        None => match server::run_server(&ServerConfig::from_env()).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Server stopped: {e}");
                ExitCode::FAILURE
            }
        },
    }
}

/// Solves the problem in `path` and renders the solutions as JSON.
fn solve_file(path: &str) -> Result<String, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_string(),
        source,
    })?;
    let input: AllocationInput = serde_json::from_str(&text).map_err(|source| CliError::Parse {
        path: path.to_string(),
        source,
    })?;
    let output = solver::solve(&input)?;
    serde_json::to_string_pretty(&output).map_err(CliError::Encode)
}
