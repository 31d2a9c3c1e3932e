//! Native compilation and linking.
//!
//! Drives the system C compiler over the generated translation units and
//! links the final executable against the host runtime library. Tool
//! diagnostics are never interpreted: a non-zero exit surfaces the tool's
//! stderr verbatim and aborts the build. The runtime shared library is
//! copied next to the archive so the executable resolves it through the
//! relative rpath recorded at link time.

use crate::command::{CommandRunner, SystemCommandRunner};
use crate::context::BuildContext;
use crate::error::{ForgeError, Result};
use crate::interpreter::HostInterpreter;
use crate::report::Reporter;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::env;
use std::fs;

/// Relative rpath recorded in the executable; the runtime library is staged
/// under `lib/` in the distribution directory.
const RUNTIME_RPATH: &str = "./lib";

/// Environment variable overriding the compiler executable.
const COMPILER_ENV: &str = "CC";

/// Default compiler executable when [`COMPILER_ENV`] is unset.
const DEFAULT_COMPILER: &str = "cc";

/// The system C toolchain for one build.
pub struct NativeToolchain<'a> {
    ctx: &'a BuildContext,
    interp: &'a HostInterpreter,
    compiler: String,
    runner: &'a dyn CommandRunner,
}

impl<'a> NativeToolchain<'a> {
    /// Create a toolchain via the system runner.
    ///
    /// The compiler is the explicit override when given, else `$CC`, else
    /// the platform default.
    #[must_use]
    pub fn new(
        ctx: &'a BuildContext,
        interp: &'a HostInterpreter,
        compiler_override: Option<&str>,
    ) -> Self {
        let compiler = compiler_override
            .map(str::to_owned)
            .or_else(|| env::var(COMPILER_ENV).ok())
            .unwrap_or_else(|| DEFAULT_COMPILER.to_owned());
        Self {
            ctx,
            interp,
            compiler,
            runner: &SystemCommandRunner,
        }
    }

    /// Create a toolchain with an explicit compiler and command runner.
    #[must_use]
    pub fn with_runner(
        ctx: &'a BuildContext,
        interp: &'a HostInterpreter,
        compiler: String,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            ctx,
            interp,
            compiler,
            runner,
        }
    }

    /// The compiler executable in use.
    #[must_use]
    pub fn compiler(&self) -> &str {
        &self.compiler
    }

    /// Confirm the compiler can be invoked at all.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::CompilerUnavailable`] if it cannot.
    pub fn check_compiler(&self) -> Result<()> {
        let output = self
            .runner
            .run(&self.compiler, &["--version".to_owned()])
            .map_err(|e| ForgeError::CompilerUnavailable {
                compiler: self.compiler.clone(),
                reason: e.to_string(),
            })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ForgeError::CompilerUnavailable {
                compiler: self.compiler.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }

    /// Locate the runtime shared library on the host.
    ///
    /// Tries the interpreter's candidate paths in preference order.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::RuntimeLibraryNotFound`] naming every candidate
    /// tried.
    pub fn locate_runtime_library(&self) -> Result<Utf8PathBuf> {
        let candidates = self.interp.runtime_library_candidates();
        for candidate in &candidates {
            if candidate.is_file() {
                return Ok(candidate.clone());
            }
        }
        Err(ForgeError::RuntimeLibraryNotFound {
            searched: candidates
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Copy the runtime shared library into the distribution's `lib/`
    /// directory and return the staged path.
    ///
    /// # Errors
    ///
    /// Returns an error if the library cannot be located or copied.
    pub fn stage_runtime_library(&self) -> Result<Utf8PathBuf> {
        let library = self.locate_runtime_library()?;
        let file_name = library.file_name().ok_or_else(|| ForgeError::Staging {
            reason: format!("runtime library {library} has no file name"),
        })?;
        let dest = self.ctx.dist_lib_dir().join(file_name);
        fs::create_dir_all(self.ctx.dist_lib_dir())?;
        fs::copy(&library, &dest)?;
        Ok(dest)
    }

    /// Compile one translation unit to an object file next to it.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::ToolInvocation`] carrying the compiler's
    /// diagnostics verbatim if compilation fails.
    pub fn compile_object(&self, source: &Utf8Path) -> Result<Utf8PathBuf> {
        let mut object = source.to_owned();
        object.set_extension("o");

        let mut args = vec!["-c".to_owned(), source.to_string()];
        for include in self.interp.include_dirs() {
            args.push(format!("-I{include}"));
        }
        args.push("-O2".to_owned());
        args.push("-o".to_owned());
        args.push(object.to_string());

        debug!("compiling {source}");
        self.invoke(&args)?;
        Ok(object)
    }

    /// Link object files against the staged runtime library.
    ///
    /// `library` is the copy staged by [`Self::stage_runtime_library`]; the
    /// library search path points at its directory, so the linked SONAME and
    /// the shipped file stay in lockstep. The recorded rpath is relative so
    /// the distribution directory stays relocatable as a unit.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::ToolInvocation`] carrying the linker's
    /// diagnostics verbatim if linking fails.
    pub fn link_executable(
        &self,
        objects: &[Utf8PathBuf],
        library: &Utf8Path,
    ) -> Result<Utf8PathBuf> {
        let executable = self.ctx.executable_path();

        let mut args: Vec<String> = objects.iter().map(Utf8PathBuf::to_string).collect();
        if let Some(libdir) = library.parent() {
            args.push(format!("-L{libdir}"));
        }
        args.push(format!("-l{}", self.interp.runtime_link_name()));
        args.push(format!("-Wl,-rpath,{RUNTIME_RPATH}"));
        args.push("-o".to_owned());
        args.push(executable.to_string());

        debug!("linking {executable}");
        self.invoke(&args)?;
        Ok(executable)
    }

    /// Compile both generated units, stage the runtime library and link.
    ///
    /// # Errors
    ///
    /// Propagates the first failing stage.
    pub fn build(&self, reporter: &mut dyn Reporter) -> Result<Utf8PathBuf> {
        self.check_compiler()?;

        reporter.info(&format!("Compiling with {}", self.compiler));
        let glue = self.compile_object(&self.ctx.entry_point_source())?;
        let program = self.compile_object(&self.ctx.program_source())?;

        let staged = self.stage_runtime_library()?;
        reporter.info(&format!("Bundled runtime library at {staged}"));

        let executable = self.link_executable(&[glue, program], &staged)?;
        reporter.info(&format!("Linked {executable}"));
        Ok(executable)
    }

    /// Run the compiler with `args`, mapping failure to a tool error.
    fn invoke(&self, args: &[String]) -> Result<()> {
        let output = self
            .runner
            .run(&self.compiler, args)
            .map_err(|e| ForgeError::CompilerUnavailable {
                compiler: self.compiler.clone(),
                reason: e.to_string(),
            })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ForgeError::ToolInvocation {
                tool: self.compiler.clone(),
                diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

#[cfg(test)]
#[path = "native_tests.rs"]
mod tests;
