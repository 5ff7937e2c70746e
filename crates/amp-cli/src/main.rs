//! Amp model command-line interface.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;

mod commands;
mod logging;
mod wav;

/// Neural amp model export and inspection tool
#[derive(Debug, Parser)]
#[command(name = "amp")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Log format (json or text)
    #[arg(long, default_value = "text", global = true)]
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Json,
    Text,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Initialize a model from an architecture spec and write its
    /// weight document
    Export {
        /// Architecture spec (JSON with model_type, norm constants,
        /// and parameters)
        spec: PathBuf,

        /// Output document path
        #[arg(short, long)]
        output: PathBuf,

        /// Optional meta_data JSON file to embed in the document
        #[arg(long)]
        meta: Option<PathBuf>,
    },

    /// Summarize a weight document
    Info {
        /// Document path
        document: PathBuf,
    },

    /// Rebuild a document's model and check the round trip
    Verify {
        /// Document path
        document: PathBuf,
    },

    /// Run a document's model over a mono WAV file
    Process {
        /// Document path
        document: PathBuf,

        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = match cli.log_format {
        LogFormatArg::Json => logging::LogFormat::Json,
        LogFormatArg::Text => logging::LogFormat::Text,
    };
    logging::init_logging(&cli.log_level, format);

    info!(version = env!("CARGO_PKG_VERSION"), "starting amp CLI");

    match cli.command {
        Commands::Export { spec, output, meta } => {
            commands::export::run(&spec, &output, meta.as_deref()).context("export failed")?;
        }
        Commands::Info { document } => {
            commands::info::run(&document).context("info failed")?;
        }
        Commands::Verify { document } => {
            commands::verify::run(&document).context("verification failed")?;
        }
        Commands::Process {
            document,
            input,
            output,
        } => {
            commands::process::run(&document, &input, &output).context("processing failed")?;
        }
    }

    Ok(())
}
