//! `matesv` main executable: a structural-variant breakpoint caller for
//! mate-pair / Nextera-style discordant read pairs (spec §1).

pub mod call;
pub mod cluster;
pub mod common;
pub mod config;
pub mod decode;
pub mod emit;
pub mod err;
pub mod fragment_size;
pub mod mask;
pub mod model;
pub mod output;
pub mod postpass;

use clap::{Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap, in the style of the teacher's nested
/// `Commands`/`Args` structs.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Structural-variant breakpoint caller for mate-pair / Nextera discordant pairs",
    long_about = "Clusters discordant mate-pair read pairs into putative INS/DEL/INV/ITX/CTX \
                   structural-variant breakpoints."
)]
struct Cli {
    /// Commonly used arguments.
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run.
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Cluster discordant read pairs into structural-variant calls.
    Call(call::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in
    // `cli.common` (spec §9 "Logging"; SPEC_FULL §2 ambient logging).
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    let term = Term::stderr();
    tracing::subscriber::with_default(collector, || {
        match &cli.command {
            Commands::Call(args) => call::run(&cli.common, args)?,
        }
        Ok::<(), anyhow::Error>(())
    })?;
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}
