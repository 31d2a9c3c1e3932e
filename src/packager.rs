//! Standard-library and application packaging.
//!
//! Packaging stages everything under `<build>/libs/`, compiling source to
//! bytecode and copying the rest, then compacts the staging tree into the
//! distribution archive. The staging tree is purged at the start of every
//! run — no incremental state crosses invocations. A module that fails to
//! compile is skipped with a diagnostic; packaging of the rest continues.

use crate::archive::Archive;
use crate::context::BuildContext;
use crate::error::{ForgeError, Result};
use crate::graph::{ModuleGraph, ModuleKind};
use crate::interpreter::{shared_library_suffix, CompileOutcome, HostInterpreter};
use crate::module_name::ModuleName;
use crate::report::Reporter;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fs;

/// Standard-library subtrees excluded from packaging.
pub const STDLIB_EXCLUDES: &[&str] = &["test", "lib2to3", "idlelib", "site-packages"];

/// A recoverable per-module packaging failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDiagnostic {
    /// Dotted name of the affected module.
    pub module: String,
    /// Description of the failure.
    pub reason: String,
}

/// Compiles one source file to bytecode.
///
/// [`HostInterpreter`] is the production implementation; tests substitute a
/// fake so packaging logic runs without a real interpreter.
pub trait BytecodeCompiler {
    /// Compile `source` to bytecode at `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the compiler cannot be invoked at all.
    fn compile(&self, source: &Utf8Path, dest: &Utf8Path) -> Result<CompileOutcome>;
}

impl BytecodeCompiler for HostInterpreter {
    fn compile(&self, source: &Utf8Path, dest: &Utf8Path) -> Result<CompileOutcome> {
        self.compile_bytecode(source, dest)
    }
}

/// Relative archive path for a module's bytecode.
///
/// A package root always materialises as `<package>/__init__.pyc`, never as
/// `<package>.pyc`.
#[must_use]
pub fn bytecode_member_path(name: &ModuleName, is_package: bool) -> Utf8PathBuf {
    let mut path = Utf8PathBuf::new();
    if is_package {
        for segment in name.segments() {
            path.push(segment);
        }
        path.push("__init__.pyc");
    } else if let Some((last, parents)) = name.segments().split_last() {
        for segment in parents {
            path.push(segment);
        }
        path.push(format!("{last}.pyc"));
    }
    path
}

/// Stages and compacts the standard library and application modules.
pub struct Packager<'a> {
    ctx: &'a BuildContext,
    interp: &'a HostInterpreter,
    compiler: &'a dyn BytecodeCompiler,
}

impl<'a> Packager<'a> {
    /// Create a packager compiling bytecode through the probed interpreter.
    #[must_use]
    pub fn new(ctx: &'a BuildContext, interp: &'a HostInterpreter) -> Self {
        Self {
            ctx,
            interp,
            compiler: interp,
        }
    }

    /// Create a packager with an explicit bytecode compiler.
    #[must_use]
    pub fn with_compiler(
        ctx: &'a BuildContext,
        interp: &'a HostInterpreter,
        compiler: &'a dyn BytecodeCompiler,
    ) -> Self {
        Self {
            ctx,
            interp,
            compiler,
        }
    }

    /// Purge any stale staging tree and (re)create the build layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the stale tree cannot be removed or the layout
    /// cannot be created.
    pub fn prepare(&self) -> Result<()> {
        let staging = self.ctx.staging_dir();
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        self.ctx.ensure_layout()
    }

    /// Stage and compact the host's standard library.
    ///
    /// Source files compile to bytecode in place in the staging tree; a file
    /// the interpreter rejects is skipped with a warning. Pre-compiled
    /// artifacts and plain resources copy verbatim; extension binaries
    /// relocate into the distribution's `lib-dynload` directory. The staged
    /// tree compacts into the distribution archive before application
    /// packaging begins.
    ///
    /// # Errors
    ///
    /// Returns an error if the library tree cannot be read or the archive
    /// cannot be written.
    pub fn package_standard_library(&self, reporter: &mut dyn Reporter) -> Result<Archive> {
        let stdlib = self.interp.stdlib_dir().clone();
        reporter.info(&format!("Staging standard library from {stdlib}"));
        self.stage_stdlib_dir(&stdlib, &stdlib, reporter)?;

        if self.interp.platstdlib_dir() != &stdlib {
            let platstdlib = self.interp.platstdlib_dir().clone();
            self.stage_stdlib_dir(&platstdlib, &platstdlib, reporter)?;
        }

        let archive = Archive::from_staging_tree(&self.ctx.staging_dir())?;
        archive.write_zip(&self.ctx.archive_path())?;
        reporter.info(&format!(
            "Packaged {} standard-library members",
            archive.len()
        ));
        Ok(archive)
    }

    /// Stage application modules from the graph and compact the combined
    /// archive.
    ///
    /// Standard-library source already staged by
    /// [`Self::package_standard_library`] is skipped; extension binaries
    /// copy into `lib-dynload`; no-artifact modules produce nothing.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure; per-module compile failures are
    /// returned as diagnostics, not errors.
    pub fn package_application(
        &self,
        graph: &ModuleGraph,
        reporter: &mut dyn Reporter,
    ) -> Result<(Archive, Vec<ModuleDiagnostic>)> {
        let mut diagnostics = Vec::new();

        for record in graph.modules().values() {
            match record.kind {
                ModuleKind::NoArtifact => {}
                ModuleKind::ExtensionBinary => {
                    if let Some(origin) = &record.origin {
                        self.copy_extension(origin)?;
                    }
                }
                ModuleKind::PureSource => {
                    if self.is_stdlib_origin(record.origin.as_deref()) {
                        continue;
                    }
                    if let Some(origin) = &record.origin {
                        let dest = self
                            .ctx
                            .staging_dir()
                            .join(bytecode_member_path(&record.name, record.is_package));
                        self.compile_into(origin, &dest, &record.name, &mut diagnostics, reporter)?;
                    }
                }
                ModuleKind::CompiledBytecode => {
                    if self.is_stdlib_origin(record.origin.as_deref()) {
                        continue;
                    }
                    if let Some(origin) = &record.origin {
                        let dest = self
                            .ctx
                            .staging_dir()
                            .join(bytecode_member_path(&record.name, record.is_package));
                        copy_into(origin, &dest)?;
                    }
                }
            }
        }

        let archive = Archive::from_staging_tree(&self.ctx.staging_dir())?;
        archive.write_zip(&self.ctx.archive_path())?;
        reporter.info(&format!(
            "Packaged application archive with {} members",
            archive.len()
        ));
        Ok((archive, diagnostics))
    }

    /// Recursively stage one standard-library directory.
    fn stage_stdlib_dir(
        &self,
        root: &Utf8Path,
        dir: &Utf8Path,
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        for entry in dir.read_dir_utf8()? {
            let entry = entry?;
            let path = entry.path();
            let file_name = entry.file_name();

            if path.is_dir() {
                if file_name == "__pycache__" || file_name == "lib-dynload" {
                    continue;
                }
                if dir == root && STDLIB_EXCLUDES.contains(&file_name) {
                    continue;
                }
                self.stage_stdlib_dir(root, path, reporter)?;
                continue;
            }

            let relative = path.strip_prefix(root).map_err(|_| ForgeError::Staging {
                reason: format!("{path} escapes library root {root}"),
            })?;

            if file_name.ends_with(".py") {
                let mut dest = self.ctx.staging_dir().join(relative);
                dest.set_extension("pyc");
                match self.compile_file(path, &dest)? {
                    CompileOutcome::Compiled => debug!("compiled {relative}"),
                    CompileOutcome::Failed(diag) => {
                        reporter.warning(&format!("skipping {relative}: {diag}"));
                    }
                }
            } else if file_name.ends_with(".pyc") {
                copy_into(path, &self.ctx.staging_dir().join(relative))?;
            } else if self.is_extension_binary(file_name) {
                self.copy_extension(path)?;
            } else {
                copy_into(path, &self.ctx.staging_dir().join(relative))?;
            }
        }
        Ok(())
    }

    /// Compile an application module into the staging tree, downgrading
    /// failure to a diagnostic.
    fn compile_into(
        &self,
        origin: &Utf8Path,
        dest: &Utf8Path,
        name: &ModuleName,
        diagnostics: &mut Vec<ModuleDiagnostic>,
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        debug!("compiling {name} to {dest}");
        match self.compile_file(origin, dest)? {
            CompileOutcome::Compiled => Ok(()),
            CompileOutcome::Failed(diag) => {
                reporter.warning(&format!("skipping {name}: {diag}"));
                diagnostics.push(ModuleDiagnostic {
                    module: name.as_dotted(),
                    reason: diag,
                });
                Ok(())
            }
        }
    }

    fn compile_file(&self, source: &Utf8Path, dest: &Utf8Path) -> Result<CompileOutcome> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        self.compiler.compile(source, dest)
    }

    /// Copy an extension binary into the distribution's native-extension
    /// directory. Extension binaries are never compiled.
    fn copy_extension(&self, origin: &Utf8Path) -> Result<()> {
        let file_name = origin.file_name().ok_or_else(|| ForgeError::Staging {
            reason: format!("extension binary {origin} has no file name"),
        })?;
        copy_into(origin, &self.ctx.dynload_dir().join(file_name))
    }

    fn is_extension_binary(&self, file_name: &str) -> bool {
        file_name.ends_with(self.interp.ext_suffix())
            || file_name.ends_with(shared_library_suffix())
    }

    fn is_stdlib_origin(&self, origin: Option<&Utf8Path>) -> bool {
        origin.is_some_and(|p| {
            p.starts_with(self.interp.stdlib_dir()) || p.starts_with(self.interp.platstdlib_dir())
        })
    }
}

/// Copy one file, creating parent directories as needed.
fn copy_into(source: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, dest).map_err(|e| ForgeError::Staging {
        reason: format!("failed to copy {source} to {dest}: {e}"),
    })?;
    Ok(())
}

#[cfg(test)]
#[path = "packager_tests.rs"]
mod tests;
