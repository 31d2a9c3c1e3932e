//! Build context: directory layout and the per-build identifier.

use crate::error::Result;
use crate::module_name::EntryPoint;
use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;

/// Fixed prefix of every build identifier.
///
/// The generated glue is loaded as an ordinary importable unit, so its name
/// must not collide with any real module; the prefix plus a cryptographic
/// digest of the import path makes a collision vanishingly unlikely.
const BUILD_ID_PREFIX: &str = "pyforge_";

/// Deterministic per-build identifier derived from the entry import path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildId(String);

impl BuildId {
    /// Derive the identifier for a dotted import path.
    ///
    /// A pure function: identical paths yield identical identifiers.
    #[must_use]
    pub fn derive(import_path: &str) -> Self {
        let digest = Sha256::digest(import_path.as_bytes());
        Self(format!("{BUILD_ID_PREFIX}{digest:x}"))
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Paths and identity for one build.
///
/// Directories are created lazily and idempotently by
/// [`BuildContext::ensure_layout`]; the staging tree is additionally purged
/// by the packager at the start of every run.
#[derive(Debug, Clone)]
pub struct BuildContext {
    build_dir: Utf8PathBuf,
    program_name: String,
    entry: EntryPoint,
    build_id: BuildId,
}

impl BuildContext {
    /// Create a context for `entry` under `build_dir`.
    ///
    /// `program_name` defaults to the first segment of the entry module.
    #[must_use]
    pub fn new(build_dir: Utf8PathBuf, entry: EntryPoint, program_name: Option<String>) -> Self {
        let program_name = program_name.unwrap_or_else(|| entry.module.head().to_owned());
        let build_id = BuildId::derive(&entry.module.as_dotted());
        Self {
            build_dir,
            program_name,
            entry,
            build_id,
        }
    }

    /// The build root.
    #[must_use]
    pub fn build_dir(&self) -> &Utf8Path {
        &self.build_dir
    }

    /// Generated C sources live here.
    #[must_use]
    pub fn src_dir(&self) -> Utf8PathBuf {
        self.build_dir.join("src")
    }

    /// The distribution directory holding the final executable.
    #[must_use]
    pub fn dist_dir(&self) -> Utf8PathBuf {
        self.build_dir.join("dist")
    }

    /// Bundled runtime library and archive directory.
    #[must_use]
    pub fn dist_lib_dir(&self) -> Utf8PathBuf {
        self.dist_dir().join("lib")
    }

    /// Copied native extension binaries.
    #[must_use]
    pub fn dynload_dir(&self) -> Utf8PathBuf {
        self.dist_lib_dir().join("lib-dynload")
    }

    /// Staging tree used for bytecode compilation before compaction.
    #[must_use]
    pub fn staging_dir(&self) -> Utf8PathBuf {
        self.build_dir.join("libs")
    }

    /// Path of the compacted archive.
    #[must_use]
    pub fn archive_path(&self) -> Utf8PathBuf {
        self.dist_lib_dir().join("pylib.zip")
    }

    /// Path of the generated glue translation unit.
    #[must_use]
    pub fn entry_point_source(&self) -> Utf8PathBuf {
        self.src_dir().join("entry_point.c")
    }

    /// Path of the generated native main unit.
    #[must_use]
    pub fn program_source(&self) -> Utf8PathBuf {
        self.src_dir().join(format!("{}.c", self.program_name))
    }

    /// Path of the final linked executable.
    #[must_use]
    pub fn executable_path(&self) -> Utf8PathBuf {
        self.dist_dir().join(&self.program_name)
    }

    /// The program name.
    #[must_use]
    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    /// The parsed entry point.
    #[must_use]
    pub fn entry(&self) -> &EntryPoint {
        &self.entry
    }

    /// The per-build identifier.
    #[must_use]
    pub fn build_id(&self) -> &BuildId {
        &self.build_id
    }

    /// Create the directory layout. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [
            self.src_dir(),
            self.dist_lib_dir(),
            self.dynload_dir(),
            self.staging_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}
