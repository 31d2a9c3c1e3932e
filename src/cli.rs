//! CLI argument definitions for PyForge.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::pipeline::BuildRequest;
use camino::Utf8PathBuf;
use clap::Parser;
use std::env;

/// Environment variable toggling emoji decoration when no flag is given.
const EMOJI_ENV: &str = "PYFORGE_EMOJI";

/// Compile a Python entry point into a standalone native executable.
#[derive(Parser, Debug)]
#[command(name = "pyforge")]
#[command(version, about)]
#[command(long_about = concat!(
    "Compile a Python entry point into a standalone native executable.\n\n",
    "PyForge resolves the transitive import closure of the entry module, ",
    "compiles it and the standard library to bytecode in a single archive, ",
    "generates C glue that embeds the interpreter, and links a native ",
    "executable that runs without a systemwide Python installation.\n\n",
    "The entry point names a module and a function within it, separated by ",
    "a colon. The module must be importable in the environment the chosen ",
    "interpreter sees.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Build an executable from app/main.py's run() function:\n",
    "    $ pyforge app.main:run\n\n",
    "  Build with a specific interpreter and executable name:\n",
    "    $ pyforge --python python3.12 --name mytool app.main:run\n\n",
    "  Build into a different directory, verbosely:\n",
    "    $ pyforge -b target/pyforge -v app.main:run\n",
))]
pub struct Cli {
    /// Entry point to embed, as <dotted.module.path>:<function>.
    #[arg(value_name = "ENTRY")]
    pub entry: String,

    /// Interpreter executable to probe and compile with.
    #[arg(long, value_name = "EXE", default_value = "python3")]
    pub python: String,

    /// Directory for intermediate and final build artifacts.
    #[arg(short = 'b', long, value_name = "DIR", default_value = "build")]
    pub build_dir: Utf8PathBuf,

    /// Executable name [default: first segment of the entry module].
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// C compiler executable [default: $CC, then cc].
    #[arg(long, value_name = "EXE")]
    pub cc: Option<String>,

    /// Increase output verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (warnings and errors still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,

    /// Decorate severity markers with emoji.
    #[arg(long, overrides_with = "no_emoji")]
    pub emoji: bool,

    /// Never decorate severity markers with emoji.
    #[arg(long, overrides_with = "emoji")]
    pub no_emoji: bool,
}

impl Cli {
    /// Whether console output should carry emoji decoration.
    ///
    /// Explicit flags win, then the `PYFORGE_EMOJI` environment variable;
    /// otherwise emoji defaults on only for macOS terminals.
    #[must_use]
    pub fn emoji_enabled(&self) -> bool {
        if self.emoji {
            return true;
        }
        if self.no_emoji {
            return false;
        }
        match env::var(EMOJI_ENV) {
            Ok(value) => matches!(value.as_str(), "1" | "true" | "on" | "yes"),
            Err(_) => cfg!(target_os = "macos"),
        }
    }

    /// Convert parsed arguments into a pipeline request.
    #[must_use]
    pub fn build_request(&self) -> BuildRequest {
        BuildRequest {
            entry: self.entry.clone(),
            python: self.python.clone(),
            build_dir: self.build_dir.clone(),
            program_name: self.name.clone(),
            compiler: self.cc.clone(),
        }
    }
}
