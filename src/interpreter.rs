//! Host interpreter probe and platform naming facts.
//!
//! PyForge never hardcodes the layout of the host Python installation.
//! [`HostInterpreter::probe`] shells out to the interpreter once, asking it
//! to describe its own build configuration as JSON: standard-library paths,
//! header directories, shared-library location and the extension-module
//! suffix. Shared-library *naming* is a compile-time fact of the host
//! platform family and lives here as `const fn`s.

use crate::command::{CommandRunner, SystemCommandRunner};
use crate::error::{ForgeError, Result};
use crate::module_name::ModuleName;
use camino::Utf8PathBuf;
use serde::Deserialize;
use std::collections::BTreeSet;

/// Platform-specific shared-library filename suffix (including the dot).
#[must_use]
pub const fn shared_library_suffix() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        ".dylib"
    }
    #[cfg(target_os = "windows")]
    {
        ".dll"
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        ".so"
    }
}

/// Platform-specific shared-library filename prefix.
#[must_use]
pub const fn shared_library_prefix() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        ""
    }
    #[cfg(not(target_os = "windows"))]
    {
        "lib"
    }
}

/// Compose a shared-library filename from a link name.
///
/// `python3.12` becomes `libpython3.12.so` on Linux, `libpython3.12.dylib`
/// on macOS and `python3.12.dll` on Windows.
#[must_use]
pub fn library_filename(link_name: &str) -> String {
    format!(
        "{}{link_name}{}",
        shared_library_prefix(),
        shared_library_suffix()
    )
}

/// Recover the link name from a shared-library filename.
///
/// Tolerates versioned suffixes such as `libpython3.12.so.1.0`.
#[must_use]
pub fn link_name_from_filename(filename: &str) -> String {
    let prefix = shared_library_prefix();
    let stripped = filename.strip_prefix(prefix).unwrap_or(filename);
    // Truncate at the first known library suffix; also accept `.a` so a
    // static LDLIBRARY still yields a usable -l name.
    for suffix in [shared_library_suffix(), ".so", ".dylib", ".dll", ".a"] {
        if let Some(pos) = stripped.find(suffix) {
            return stripped[..pos].to_owned();
        }
    }
    stripped.to_owned()
}

/// Python snippet asking the interpreter to describe its build configuration.
const PROBE_SCRIPT: &str = r#"import json, sys, sysconfig
print(json.dumps({
    "version": "%d.%d" % sys.version_info[:2],
    "stdlib": sysconfig.get_path("stdlib"),
    "platstdlib": sysconfig.get_path("platstdlib"),
    "include": sysconfig.get_path("include"),
    "platinclude": sysconfig.get_path("platinclude"),
    "libdir": sysconfig.get_config_var("LIBDIR") or "",
    "ldlibrary": sysconfig.get_config_var("LDLIBRARY") or "",
    "ext_suffix": sysconfig.get_config_var("EXT_SUFFIX") or ".so",
    "base_prefix": sys.base_prefix,
    "builtins": list(sys.builtin_module_names)}))
"#;

/// Python snippet performing the cheap static importability check.
///
/// Uses `find_spec` so the target module is located, not executed.
const FIND_SPEC_SCRIPT: &str = r#"import importlib.util, sys
spec = importlib.util.find_spec(sys.argv[1])
if spec is None or spec.origin in (None, "builtin", "frozen"):
    sys.exit(1)
print(spec.origin)
"#;

/// Python snippet compiling one source file to bytecode at an explicit path.
const PY_COMPILE_SCRIPT: &str = r#"import py_compile, sys
py_compile.compile(sys.argv[1], cfile=sys.argv[2], doraise=True)
"#;

/// Raw JSON shape emitted by [`PROBE_SCRIPT`].
#[derive(Debug, Deserialize)]
struct RawFacts {
    version: String,
    stdlib: String,
    platstdlib: String,
    include: String,
    platinclude: String,
    libdir: String,
    ldlibrary: String,
    ext_suffix: String,
    base_prefix: String,
    builtins: Vec<String>,
}

/// Outcome of a single bytecode compilation.
///
/// Compilation failure is recoverable (the module is skipped with a
/// warning), so it is a value, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    /// Bytecode was written to the requested path.
    Compiled,
    /// The interpreter rejected the source; carries its diagnostics.
    Failed(String),
}

/// The probed host interpreter and its build configuration.
#[derive(Debug, Clone)]
pub struct HostInterpreter {
    python: String,
    version: String,
    stdlib: Utf8PathBuf,
    platstdlib: Utf8PathBuf,
    include: Utf8PathBuf,
    platinclude: Utf8PathBuf,
    libdir: Option<Utf8PathBuf>,
    ldlibrary: String,
    ext_suffix: String,
    base_prefix: Utf8PathBuf,
    builtins: BTreeSet<String>,
}

impl HostInterpreter {
    /// Probe the given interpreter executable.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::InterpreterProbe`] if the interpreter cannot be
    /// invoked or its answer cannot be parsed.
    pub fn probe(python: &str) -> Result<Self> {
        Self::probe_with(python, &SystemCommandRunner)
    }

    /// Probe the given interpreter through an explicit command runner.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::InterpreterProbe`] if the interpreter cannot be
    /// invoked or its answer cannot be parsed.
    pub fn probe_with(python: &str, runner: &dyn CommandRunner) -> Result<Self> {
        let output = runner
            .run(python, &["-c".to_owned(), PROBE_SCRIPT.to_owned()])
            .map_err(|e| ForgeError::InterpreterProbe {
                python: python.to_owned(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(ForgeError::InterpreterProbe {
                python: python.to_owned(),
                reason: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        let raw: RawFacts =
            serde_json::from_slice(&output.stdout).map_err(|e| ForgeError::InterpreterProbe {
                python: python.to_owned(),
                reason: format!("unparsable probe output: {e}"),
            })?;
        Ok(Self::from_raw(python, raw))
    }

    fn from_raw(python: &str, raw: RawFacts) -> Self {
        let libdir = if raw.libdir.is_empty() {
            None
        } else {
            Some(Utf8PathBuf::from(raw.libdir))
        };
        Self {
            python: python.to_owned(),
            version: raw.version,
            stdlib: Utf8PathBuf::from(raw.stdlib),
            platstdlib: Utf8PathBuf::from(raw.platstdlib),
            include: Utf8PathBuf::from(raw.include),
            platinclude: Utf8PathBuf::from(raw.platinclude),
            libdir,
            ldlibrary: raw.ldlibrary,
            ext_suffix: raw.ext_suffix,
            base_prefix: Utf8PathBuf::from(raw.base_prefix),
            builtins: raw.builtins.into_iter().collect(),
        }
    }

    /// The interpreter executable this probe describes.
    #[must_use]
    pub fn python(&self) -> &str {
        &self.python
    }

    /// `major.minor` version string, e.g. `3.12`.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Standard-library directory.
    #[must_use]
    pub fn stdlib_dir(&self) -> &Utf8PathBuf {
        &self.stdlib
    }

    /// Platform-specific standard-library directory.
    #[must_use]
    pub fn platstdlib_dir(&self) -> &Utf8PathBuf {
        &self.platstdlib
    }

    /// Directory holding the standard library's extension binaries.
    #[must_use]
    pub fn dynload_dir(&self) -> Utf8PathBuf {
        self.platstdlib.join("lib-dynload")
    }

    /// Header search paths, generic then platform-specific.
    #[must_use]
    pub fn include_dirs(&self) -> [&Utf8PathBuf; 2] {
        [&self.include, &self.platinclude]
    }

    /// Extension-module filename suffix, e.g. `.cpython-312-x86_64-linux-gnu.so`.
    #[must_use]
    pub fn ext_suffix(&self) -> &str {
        &self.ext_suffix
    }

    /// Whether `name` is compiled into the interpreter.
    #[must_use]
    pub fn is_builtin(&self, name: &ModuleName) -> bool {
        self.builtins.contains(&name.as_dotted())
    }

    /// Link name of the runtime library, derived from `LDLIBRARY`.
    #[must_use]
    pub fn runtime_link_name(&self) -> String {
        if self.ldlibrary.is_empty() {
            format!("python{}", self.version)
        } else {
            link_name_from_filename(&self.ldlibrary)
        }
    }

    /// Candidate locations for the runtime shared library, in preference
    /// order.
    ///
    /// `LIBDIR` comes first. Virtualenvs mangle the reported paths without
    /// exposing the real shared object, so `<base_prefix>/lib` variants
    /// follow as fallbacks.
    #[must_use]
    pub fn runtime_library_candidates(&self) -> Vec<Utf8PathBuf> {
        let default_filename = library_filename(&format!("python{}", self.version));
        let mut filenames = Vec::new();
        if !self.ldlibrary.is_empty() {
            filenames.push(self.ldlibrary.clone());
        }
        if !filenames.contains(&default_filename) {
            filenames.push(default_filename);
        }

        let mut dirs = Vec::new();
        if let Some(libdir) = &self.libdir {
            dirs.push(libdir.clone());
        }
        let base_lib = self.base_prefix.join("lib");
        if !dirs.contains(&base_lib) {
            dirs.push(base_lib);
        }

        let mut candidates = Vec::new();
        for dir in &dirs {
            for filename in &filenames {
                candidates.push(dir.join(filename));
            }
        }
        candidates
    }

    /// Locate the origin of `module` via `find_spec`, without executing it.
    ///
    /// This is the static precheck for the entry import path: it runs in the
    /// authoring environment and writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::EntryNotImportable`] if the module cannot be
    /// located, or [`ForgeError::InterpreterProbe`] if the interpreter
    /// cannot be invoked.
    pub fn resolve_entry_origin(&self, module: &ModuleName) -> Result<Utf8PathBuf> {
        self.resolve_entry_origin_with(module, &SystemCommandRunner)
    }

    /// Locate the origin of `module` through an explicit command runner.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::resolve_entry_origin`].
    pub fn resolve_entry_origin_with(
        &self,
        module: &ModuleName,
        runner: &dyn CommandRunner,
    ) -> Result<Utf8PathBuf> {
        let output = runner
            .run(
                &self.python,
                &[
                    "-c".to_owned(),
                    FIND_SPEC_SCRIPT.to_owned(),
                    module.as_dotted(),
                ],
            )
            .map_err(|e| ForgeError::InterpreterProbe {
                python: self.python.clone(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(ForgeError::EntryNotImportable {
                import_path: module.as_dotted(),
            });
        }
        let origin = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if origin.is_empty() {
            return Err(ForgeError::EntryNotImportable {
                import_path: module.as_dotted(),
            });
        }
        Ok(Utf8PathBuf::from(origin))
    }

    /// Compile `source` to bytecode at `dest` using the probed interpreter.
    ///
    /// # Errors
    ///
    /// Returns an error only when the interpreter cannot be invoked at all;
    /// a source file the interpreter rejects yields
    /// [`CompileOutcome::Failed`].
    pub fn compile_bytecode(
        &self,
        source: &camino::Utf8Path,
        dest: &camino::Utf8Path,
    ) -> Result<CompileOutcome> {
        self.compile_bytecode_with(source, dest, &SystemCommandRunner)
    }

    fn compile_bytecode_with(
        &self,
        source: &camino::Utf8Path,
        dest: &camino::Utf8Path,
        runner: &dyn CommandRunner,
    ) -> Result<CompileOutcome> {
        let output = runner.run(
            &self.python,
            &[
                "-c".to_owned(),
                PY_COMPILE_SCRIPT.to_owned(),
                source.to_string(),
                dest.to_string(),
            ],
        )?;
        if output.status.success() {
            Ok(CompileOutcome::Compiled)
        } else {
            Ok(CompileOutcome::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            ))
        }
    }

    /// Build an interpreter description directly from facts, for tests.
    #[cfg(test)]
    pub(crate) fn from_test_facts(facts: TestFacts) -> Self {
        Self {
            python: facts.python,
            version: facts.version,
            stdlib: facts.stdlib,
            platstdlib: facts.platstdlib,
            include: facts.include,
            platinclude: facts.platinclude,
            libdir: facts.libdir,
            ldlibrary: facts.ldlibrary,
            ext_suffix: facts.ext_suffix,
            base_prefix: facts.base_prefix,
            builtins: facts.builtins,
        }
    }
}

/// Plain-struct facts for constructing a [`HostInterpreter`] in tests.
#[cfg(test)]
pub(crate) struct TestFacts {
    pub python: String,
    pub version: String,
    pub stdlib: Utf8PathBuf,
    pub platstdlib: Utf8PathBuf,
    pub include: Utf8PathBuf,
    pub platinclude: Utf8PathBuf,
    pub libdir: Option<Utf8PathBuf>,
    pub ldlibrary: String,
    pub ext_suffix: String,
    pub base_prefix: Utf8PathBuf,
    pub builtins: BTreeSet<String>,
}

#[cfg(test)]
impl Default for TestFacts {
    fn default() -> Self {
        Self {
            python: "python3".to_owned(),
            version: "3.12".to_owned(),
            stdlib: Utf8PathBuf::from("/usr/lib/python3.12"),
            platstdlib: Utf8PathBuf::from("/usr/lib/python3.12"),
            include: Utf8PathBuf::from("/usr/include/python3.12"),
            platinclude: Utf8PathBuf::from("/usr/include/python3.12"),
            libdir: Some(Utf8PathBuf::from("/usr/lib")),
            ldlibrary: "libpython3.12.so".to_owned(),
            ext_suffix: ".cpython-312-x86_64-linux-gnu.so".to_owned(),
            base_prefix: Utf8PathBuf::from("/usr"),
            builtins: ["sys", "builtins", "_thread", "marshal", "posix"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}
