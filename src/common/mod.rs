//! Common functionality shared across the `matesv` CLI.

use byte_unit::Byte;
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

pub mod io;

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program.
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Helper to print the current memory resident set size via `tracing`
/// (spec §5: "Memory peaks with the number of live clusters").
pub fn trace_rss_now() {
    let Ok(me) = procfs::process::Process::myself() else {
        return;
    };
    let page_size = procfs::page_size();
    if let Ok(stat) = me.stat() {
        tracing::debug!(
            "RSS now: {}",
            Byte::from_bytes((stat.rss * page_size) as u128).get_appropriate_unit(true)
        );
    }
}

/// The version of the `matesv` package.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn trace_rss_now_smoke() {
        super::trace_rss_now();
    }
}
