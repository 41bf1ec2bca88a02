//! # cmx CLI entry point
//!
//! Parses command-line arguments, initializes logging, and dispatches to
//! subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use cmx_cli::list::{run_list, ListArgs};
use cmx_cli::run::{run_run, RunArgs};
use cmx_cli::EXIT_CONFIGURATION;
use cmx_runner::CancelToken;

/// Compliance matrix harness.
///
/// Compiles a declarative configuration module once per supported
/// platform, checks each resulting catalog, and reports which platforms
/// the module actually supports.
#[derive(Parser, Debug)]
#[command(name = "cmx", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile and check the module for every matrix entry.
    Run(RunArgs),

    /// Print the resolved fact matrix without compiling.
    List(ListArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    tracing::debug!("cmx {} starting", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("cannot start async runtime: {e}");
            return ExitCode::from(EXIT_CONFIGURATION);
        }
    };

    match runtime.block_on(dispatch(cli.command)) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(EXIT_CONFIGURATION)
        }
    }
}

async fn dispatch(command: Commands) -> anyhow::Result<u8> {
    match command {
        Commands::Run(args) => {
            let cancel = CancelToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, cancelling run");
                    on_interrupt.cancel();
                }
            });
            run_run(&args, &cancel).await
        }
        Commands::List(args) => run_list(&args),
    }
}

/// Log to stderr so stdout carries only the report. `RUST_LOG` applies
/// when no `-v` flag is given.
fn init_tracing(verbose: u8, format: LogFormat) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
