#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )
)]
// exec-gate-cli/src/main.rs
// ============================================================================
// Module: Exec Gate CLI Entry Point
// Description: Command dispatcher for the gate server and audit utilities.
// Purpose: Provide a safe, localized CLI for serving and offline verification.
// Dependencies: clap, exec-gate-core, exec-gate-http, thiserror, tokio
// ============================================================================

//! ## Overview
//! The Exec Gate CLI starts the HTTP gate and offers offline helpers: audit
//! chain verification and profile file checking. Server configuration comes
//! from the environment; the bind address may be overridden on the command
//! line.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use exec_gate_core::ExecutionProfile;
use exec_gate_core::core::verify_chain;
use exec_gate_core::hash_bytes;
use exec_gate_core::read_records;
use exec_gate_http::GateHttpConfig;
use exec_gate_http::GateServer;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "exec-gate", disable_help_subcommand = true, arg_required_else_help = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gate server.
    Serve(ServeCommand),
    /// Audit log utilities.
    Audit {
        /// Selected audit subcommand.
        #[command(subcommand)]
        command: AuditCommand,
    },
    /// Profile file utilities.
    Profile {
        /// Selected profile subcommand.
        #[command(subcommand)]
        command: ProfileCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Bind address override (defaults to EXEC_GATE_BIND or 127.0.0.1:8080).
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

/// Audit subcommands.
#[derive(Subcommand, Debug)]
enum AuditCommand {
    /// Verify the hash chain of an audit log file.
    Verify(AuditVerifyCommand),
}

/// Arguments for audit verification.
#[derive(Args, Debug)]
struct AuditVerifyCommand {
    /// Path to the audit log file.
    #[arg(long, value_name = "PATH")]
    path: PathBuf,
}

/// Profile subcommands.
#[derive(Subcommand, Debug)]
enum ProfileCommand {
    /// Parse and validate a profile file, reporting its reference digest.
    Check(ProfileCheckCommand),
}

/// Arguments for profile checking.
#[derive(Args, Debug)]
struct ProfileCheckCommand {
    /// Path to the profile JSON file.
    #[arg(long, value_name = "PATH")]
    path: PathBuf,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI execution errors surfaced to the operator.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration resolution failed.
    #[error("{0}")]
    Config(String),
    /// Server startup or serving failed.
    #[error("{0}")]
    Serve(String),
    /// Audit verification failed.
    #[error("{0}")]
    Audit(String),
    /// Profile checking failed.
    #[error("{0}")]
    Profile(String),
    /// Writing CLI output failed.
    #[error("output write failed: {0}")]
    Output(String),
}

/// Result alias for CLI commands.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            let _ = write_stderr_line(&err.to_string());
            ExitCode::FAILURE
        }
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(&command).await,
        Commands::Audit {
            command: AuditCommand::Verify(command),
        } => command_audit_verify(&command),
        Commands::Profile {
            command: ProfileCommand::Check(command),
        } => command_profile_check(&command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Starts the HTTP gate server.
async fn command_serve(command: &ServeCommand) -> CliResult<ExitCode> {
    let mut config =
        GateHttpConfig::from_env().map_err(|err| CliError::Config(err.to_string()))?;
    if let Some(bind) = &command.bind {
        config = GateHttpConfig::build(
            bind,
            config.profiles_root,
            config.audit_log_path,
            config.max_body_bytes,
        )
        .map_err(|err| CliError::Config(err.to_string()))?;
    }
    let bind = config.bind;
    let server = GateServer::from_config(config).map_err(|err| CliError::Serve(err.to_string()))?;
    write_stderr_line(&format!("exec-gate listening on {bind}"))?;
    server.serve().await.map_err(|err| CliError::Serve(err.to_string()))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Audit Command
// ============================================================================

/// Verifies the hash chain of an audit log file.
fn command_audit_verify(command: &AuditVerifyCommand) -> CliResult<ExitCode> {
    let records =
        read_records(&command.path).map_err(|err| CliError::Audit(err.to_string()))?;
    verify_chain(&records).map_err(|err| CliError::Audit(err.to_string()))?;
    write_stdout_line(&format!("audit chain ok: {} records", records.len()))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Profile Command
// ============================================================================

/// Parses and validates a profile file.
fn command_profile_check(command: &ProfileCheckCommand) -> CliResult<ExitCode> {
    let bytes = std::fs::read(&command.path)
        .map_err(|err| CliError::Profile(format!("profile read failed: {err}")))?;
    let profile: ExecutionProfile = serde_json::from_slice(&bytes)
        .map_err(|err| CliError::Profile(format!("profile json invalid: {err}")))?;
    profile.validate().map_err(|err| CliError::Profile(err.to_string()))?;
    let digest = hash_bytes(&bytes);
    write_stdout_line(&format!(
        "profile ok: {}/{} permits={} profile_ref_hash={digest}",
        profile.profile_id,
        profile.profile_version,
        profile.allowed_tools.len()
    ))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}").map_err(|err| CliError::Output(err.to_string()))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> CliResult<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}").map_err(|err| CliError::Output(err.to_string()))
}
