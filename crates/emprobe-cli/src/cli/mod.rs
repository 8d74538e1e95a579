mod commands;

use clap::Parser;
use emprobe_core::domain::ProbeError;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run_from_env() -> i32 {
    match parse_and_dispatch(std::env::args().collect()) {
        Ok(code) => code,
        Err(error) => {
            let probe_error = error.as_probe_error();
            eprintln!("{}", probe_error.diagnostic_line());
            probe_error.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "emprobe", about = "Field-probe post-processing tools")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Evaluate a mode-match template on its sensor plane
    Template(commands::TemplateArgs),
    /// Summarize a structured frequency-domain container
    Spectrum(commands::SpectrumArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Template(args) => commands::run_template_command(args),
        CliCommand::Spectrum(args) => commands::run_spectrum_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Probe(ProbeError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ProbeError> for CliError {
    fn from(error: ProbeError) -> Self {
        Self::Probe(error)
    }
}

impl CliError {
    fn as_probe_error(&self) -> ProbeError {
        match self {
            Self::Usage(message) => ProbeError::input_validation("INPUT.CLI_USAGE", message.trim()),
            Self::Probe(error) => error.clone(),
            Self::Internal(error) => ProbeError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
