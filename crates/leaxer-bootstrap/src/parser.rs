//! Root CLI parser, mirroring `gglib_cli::parser::Cli`'s shape: global
//! options plus a subcommand enum.

use clap::Parser;

use crate::commands::Commands;

/// Development/smoke-test command-line surface for the Leaxer execution
/// substrate (§2.1). Not a product surface: a future HTTP/WebSocket
/// adapter would call the same `AppContext`/`JobQueue` methods the
/// handlers here call.
#[derive(Parser)]
#[command(name = "leaxer")]
#[command(about = "Run and inspect the Leaxer job queue and model servers")]
pub struct Cli {
    /// Enable verbose/debug logging (equivalent to `RUST_LOG=debug`).
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn verbose_flag_parses() {
        use clap::Parser as _;
        let cli = Cli::parse_from(["leaxer", "-v", "paths"]);
        assert!(cli.verbose);
    }
}
