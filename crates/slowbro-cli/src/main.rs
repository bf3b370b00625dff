// crates/slowbro-cli/src/main.rs
// ============================================================================
// Module: Slowbro CLI Entry Point
// Description: Command dispatcher for serving and one-shot diagnostics.
// Purpose: Run the HTTP adapter or a single diagnostic from the terminal.
// Dependencies: clap, slowbro-config, slowbro-core, slowbro-server, tokio
// ============================================================================

//! ## Overview
//! `slowbro serve` runs the HTTP adapter, `slowbro run` performs one
//! diagnostic and prints the digest, and `slowbro config validate` checks a
//! configuration file. Failures print a single line to stderr and exit with
//! a failure code.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use slowbro_cli::wiring::RdsDiagnosticianFactory;
use slowbro_cli::wiring::network_exposed;
use slowbro_config::SlowbroConfig;
use slowbro_core::Diagnostician;
use slowbro_core::OrchestratorError;
use slowbro_core::cancel_pair;
use slowbro_server::DiagnosticianFactory;
use slowbro_server::ServerSettings;
use slowbro_server::SlowbroServer;
use slowbro_server::TuneForm;
use slowbro_server::server::bind;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "slowbro", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP diagnostic server.
    Serve(ServeCommand),
    /// Run one diagnostic and print the digest.
    Run(RunCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `serve`.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Path to the configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `run`.
#[derive(Args, Debug)]
struct RunCommand {
    /// Instance identifier.
    #[arg(long, value_name = "ID")]
    instance: String,
    /// Named credentials profile.
    #[arg(long, value_name = "PROFILE")]
    profile: Option<String>,
    /// Region name.
    #[arg(long, value_name = "REGION")]
    region: Option<String>,
    /// Sample window in seconds.
    #[arg(long, value_name = "SECONDS")]
    sample_seconds: u64,
    /// Slow-query logging state to restore afterwards.
    #[arg(long, value_name = "on|off", default_value = "off")]
    slow_query_log: String,
    /// Threshold in seconds to restore afterwards.
    #[arg(long, value_name = "SECONDS", default_value = "10")]
    long_query_time: String,
    /// Log destination to restore afterwards.
    #[arg(long, value_name = "FILE|TABLE|NONE", default_value = "FILE")]
    log_output: String,
    /// Path to the configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Path to the configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying the single line printed to stderr.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Run(command) => command_run(command).await,
        Commands::Config {
            command: ConfigCommand::Validate(command),
        } => command_config_validate(&command),
    }
}

/// Loads configuration from an optional explicit path.
fn load_config(path: Option<&std::path::Path>) -> CliResult<SlowbroConfig> {
    SlowbroConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let settings =
        ServerSettings::from_config(&config).map_err(|err| CliError::new(err.to_string()))?;
    if network_exposed(settings.bind) {
        write_stderr_line(&format!(
            "warning: {} accepts connections from other hosts; requests can modify database \
             parameter groups",
            settings.bind
        ))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }
    let audit = config
        .audit
        .build_sink()
        .map_err(|err| CliError::new(format!("config load failed: {err}")))?;
    let factory = RdsDiagnosticianFactory::from_config(&config, Arc::clone(&audit))
        .map_err(|err| CliError::new(format!("serve init failed: {err}")))?;
    let server = SlowbroServer::new(settings, Arc::new(factory), audit)
        .map_err(|err| CliError::new(format!("serve init failed: {err}")))?;
    let listener =
        bind(server.settings().bind).await.map_err(|err| CliError::new(err.to_string()))?;
    write_stderr_line(&format!("slowbro listening on {}", server.settings().bind))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server
        .serve_listener(listener, interrupted())
        .await
        .map_err(|err| CliError::new(format!("serve failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Executes the `run` command.
async fn command_run(command: RunCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let form = TuneForm {
        identifier: command.instance,
        profile: command.profile,
        region: command.region,
        slow_query_toggle: command.slow_query_log,
        log_type: command.log_output,
        sample_time: command.sample_seconds,
        long_query_time: command.long_query_time,
    };
    let job = form
        .into_job(config.orchestrator.max_sample_seconds)
        .map_err(|err| CliError::new(format!("invalid run arguments: {err}")))?;
    let audit = config
        .audit
        .build_sink()
        .map_err(|err| CliError::new(format!("config load failed: {err}")))?;
    let factory = RdsDiagnosticianFactory::from_config(&config, audit)
        .map_err(|err| CliError::new(format!("run init failed: {err}")))?;
    let diagnostician = factory.diagnostician(&job.context).await;

    let (handle, signal) = cancel_pair();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });
    let result = diagnostician.diagnose(&job, &signal).await;
    interrupt.abort();

    match result {
        Ok(report) => {
            write_stdout(&report.digest)
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
        Err(OrchestratorError::RevertIncomplete {
            digest,
            revert,
        }) => {
            write_stdout(&digest).map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Err(CliError::new(format!("diagnostic produced but {revert}")))
        }
        Err(err) => Err(CliError::new(err.to_string())),
    }
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Executes the `config validate` command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    load_config(command.config.as_deref())?;
    write_stdout("configuration is valid\n")
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes text to stdout without adding a newline.
fn write_stdout(text: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
