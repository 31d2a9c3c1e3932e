//! Error types for the PyForge pipeline.
//!
//! This module defines semantic error variants for everything that aborts a
//! build. Per-module failures during resolution or packaging are deliberately
//! *not* represented here: they are recoverable diagnostics, collected and
//! surfaced as a post-run warning list (see [`crate::packager::ModuleDiagnostic`]
//! and the bad-module set on [`crate::graph::ModuleGraph`]).

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that abort a PyForge build.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// The entry-point specifier could not be parsed.
    #[error("invalid entry point {spec:?}: {reason}")]
    InvalidEntryPoint {
        /// The specifier as given on the command line.
        spec: String,
        /// Description of what is wrong with it.
        reason: String,
    },

    /// The entry script could not be read or parsed.
    #[error("cannot read entry script {path}: {reason}")]
    EntryScript {
        /// Path to the entry script.
        path: Utf8PathBuf,
        /// Description of the read or parse failure.
        reason: String,
    },

    /// The entry import path is not importable in the authoring environment.
    #[error("{import_path} is not importable")]
    EntryNotImportable {
        /// The dotted import path that failed the static precheck.
        import_path: String,
    },

    /// Probing the host interpreter for its build configuration failed.
    #[error("failed to probe interpreter {python}: {reason}")]
    InterpreterProbe {
        /// The interpreter executable that was probed.
        python: String,
        /// Description of the probe failure.
        reason: String,
    },

    /// The system C compiler was not found.
    #[error("C compiler {compiler} is not available: {reason}")]
    CompilerUnavailable {
        /// The compiler executable that was looked up.
        compiler: String,
        /// Description of why it could not be invoked.
        reason: String,
    },

    /// The runtime shared library could not be located on the host.
    #[error("runtime shared library not found; searched: {searched}")]
    RuntimeLibraryNotFound {
        /// The candidate paths that were tried, comma separated.
        searched: String,
    },

    /// An external tool (compiler or linker) returned failure.
    ///
    /// The tool's own diagnostics are carried verbatim and are never
    /// interpreted or retried.
    #[error("{tool} invocation failed:\n{diagnostics}")]
    ToolInvocation {
        /// The tool that failed.
        tool: String,
        /// The tool's stderr, unmodified.
        diagnostics: String,
    },

    /// Archive compaction failed.
    #[error("archive compaction failed: {reason}")]
    Archive {
        /// Description of the compaction failure.
        reason: String,
    },

    /// Staging a file into the build tree failed.
    #[error("staging failed: {reason}")]
    Staging {
        /// Description of the staging failure.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`ForgeError`].
pub type Result<T> = std::result::Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_invocation_surfaces_diagnostics_verbatim() {
        let err = ForgeError::ToolInvocation {
            tool: "cc".to_owned(),
            diagnostics: "entry_point.c:3: error: expected ';'".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("cc invocation failed"));
        assert!(msg.contains("entry_point.c:3: error: expected ';'"));
    }

    #[test]
    fn entry_not_importable_names_the_import_path() {
        let err = ForgeError::EntryNotImportable {
            import_path: "doesnotexist".to_owned(),
        };
        assert!(err.to_string().contains("doesnotexist"));
    }

    #[test]
    fn compiler_unavailable_names_the_compiler() {
        let err = ForgeError::CompilerUnavailable {
            compiler: "cc".to_owned(),
            reason: "No such file or directory".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("cc"));
        assert!(msg.contains("No such file"));
    }

    #[test]
    fn io_errors_convert_via_from() {
        let io = std::io::Error::other("disk full");
        let err = ForgeError::from(io);
        assert!(err.to_string().contains("disk full"));
    }
}
