//! `langc` - command-line driver for the localization pipeline.

use clap::{Parser, Subcommand};
use darkdelve_langc::LangError;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "langc", about = "Compile YAML language sources into the host's JSON tree")]
struct Cli {
    /// Directory of YAML language sources.
    #[arg(long, global = true, default_value = "lang/src")]
    src: PathBuf,

    /// Generated JSON tree.
    #[arg(long, global = true, default_value = "lang/en.json")]
    out: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile the sources once.
    Compile,
    /// Remove the generated tree.
    Clean,
    /// Recompile whenever the sources change.
    Watch {
        /// Poll period in milliseconds.
        #[arg(long, default_value_t = 500)]
        period_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), LangError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Compile => {
            darkdelve_langc::compile(&cli.src, &cli.out).await?;
        }
        Command::Clean => {
            darkdelve_langc::clean(&cli.out).await?;
        }
        Command::Watch { period_ms } => {
            darkdelve_langc::watch(&cli.src, &cli.out, Duration::from_millis(period_ms)).await?;
        }
    }
    Ok(())
}
