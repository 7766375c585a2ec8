use clap::{Parser, Subcommand, ValueEnum};
use orapatch_engine::config::constants::{FAILURE_PREFIX, FAILURE_RC};
use orapatch_engine::{Credential, Function, PatchEngine, RunRequest, RunResponse};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "orapatch", version, about = "Patch orchestration for Oracle software homes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one patch request read from a JSON or TOML file
    Run {
        /// Request file (.json or .toml)
        request: PathBuf,
        /// Override the requested function
        #[arg(long)]
        function: Option<String>,
        /// Append the run log to this file
        #[arg(long)]
        log_file: Option<PathBuf>,
        /// Log every command and its output
        #[arg(long)]
        debug: bool,
        /// Only run prerequisite checks
        #[arg(long)]
        only_prereq: bool,
    },
    /// Write a session boundary marker to the run log
    Session {
        #[arg(value_enum)]
        marker: SessionMarker,
        #[arg(long)]
        log_file: Option<PathBuf>,
        #[arg(long)]
        debug: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SessionMarker {
    Start,
    End,
}

const PASSWORD_VAR: &str = "ORAPATCH_ROOT_PASSWORD";

fn load_request(path: &Path) -> Result<RunRequest, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let request: RunRequest = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };
    Ok(request)
}

fn load_failure(path: &Path, err: &dyn std::error::Error) -> RunResponse {
    RunResponse {
        changed: false,
        msg: format!(
            "{}cannot read request {}: {}",
            FAILURE_PREFIX,
            path.display(),
            err
        ),
        failed: true,
        rc: FAILURE_RC,
    }
}

fn build_request(cli: Cli) -> Result<RunRequest, RunResponse> {
    match cli.command {
        Commands::Run {
            request,
            function,
            log_file,
            debug,
            only_prereq,
        } => {
            let mut req = load_request(&request).map_err(|e| load_failure(&request, e.as_ref()))?;
            if let Some(function) = function {
                req.function = function;
            }
            if log_file.is_some() {
                req.log_file = log_file;
            }
            req.debug |= debug;
            req.only_prereq |= only_prereq;
            if req.root_password.is_none() {
                req.root_password = std::env::var(PASSWORD_VAR).ok().map(Credential::new);
            }
            Ok(req)
        }
        Commands::Session {
            marker,
            log_file,
            debug,
        } => {
            let function = match marker {
                SessionMarker::Start => Function::StartLoggerSession,
                SessionMarker::End => Function::EndLoggerSession,
            };
            Ok(RunRequest {
                log_file,
                debug,
                ..RunRequest::new(function)
            })
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let response = match build_request(cli) {
        Ok(request) => {
            let level = if request.debug { "debug" } else { "info" };
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
                .init();
            log::debug!("running {}", request.function);
            PatchEngine::default().run(&request)
        }
        Err(response) => response,
    };

    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: cannot render response: {}", e),
    }

    if response.failed {
        ExitCode::from(u8::try_from(response.rc).unwrap_or(1))
    } else {
        ExitCode::SUCCESS
    }
}
