//! PyForge CLI entrypoint.
//!
//! Parses arguments, wires up the console reporter and runs the build
//! pipeline, mapping the first fatal error to a non-zero exit code.

use clap::Parser;
use pyforge::cli::Cli;
use pyforge::pipeline;
use pyforge::report::{ConsoleReporter, Reporter};

fn main() {
    let cli = Cli::parse();
    let emoji = cli.emoji_enabled();
    let mut reporter = if cli.quiet {
        ConsoleReporter::stderr_quiet(emoji)
    } else {
        ConsoleReporter::stderr(cli.verbosity, emoji)
    };

    let request = cli.build_request();
    let exit_code = match pipeline::run(&request, &mut reporter) {
        Ok(_) => 0,
        Err(err) => {
            reporter.error(&err.to_string());
            1
        }
    };
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
