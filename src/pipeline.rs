//! The sequential build pipeline.
//!
//! One invocation runs the stages in a fixed order: probe the host
//! interpreter, precheck the entry import path, resolve the module graph,
//! package the standard library and the application, generate the embedding
//! glue and drive the native toolchain. Each stage consumes the previous
//! stage's output; the first fatal error aborts the run. Recoverable
//! per-module failures are collected along the way and surfaced as a
//! warning list once the executable exists.

use crate::command::{CommandRunner, SystemCommandRunner};
use crate::context::BuildContext;
use crate::embed::EmbedGenerator;
use crate::error::{ForgeError, Result};
use crate::graph::GraphBuilder;
use crate::interpreter::HostInterpreter;
use crate::module_name::{EntryPoint, ModuleName};
use crate::native::NativeToolchain;
use crate::packager::{ModuleDiagnostic, Packager};
use crate::report::Reporter;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;

/// Everything a build invocation needs.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Entry-point specifier, `<dotted.module.path>:<function>`.
    pub entry: String,
    /// Interpreter executable to probe and compile with.
    pub python: String,
    /// Build root; all intermediate and final artifacts live below it.
    pub build_dir: Utf8PathBuf,
    /// Executable name override; defaults to the entry module's first
    /// segment.
    pub program_name: Option<String>,
    /// C compiler override; defaults to `$CC`, then `cc`.
    pub compiler: Option<String>,
}

/// Result of a completed build.
#[derive(Debug)]
pub struct BuildOutcome {
    /// Path of the linked executable.
    pub executable: Utf8PathBuf,
    /// Import targets that could not be resolved, with reasons.
    pub bad_modules: BTreeMap<String, String>,
    /// Modules skipped during packaging, with reasons.
    pub skipped: Vec<ModuleDiagnostic>,
}

/// Run the full pipeline for `request`.
///
/// # Errors
///
/// Returns the first fatal error of any stage: an invalid entry point, a
/// failed interpreter probe, an entry that is not importable, a packaging
/// or archive failure, or a tool failure.
pub fn run(request: &BuildRequest, reporter: &mut dyn Reporter) -> Result<BuildOutcome> {
    run_with(request, reporter, &SystemCommandRunner)
}

/// Run the full pipeline with an explicit command runner for the probe and
/// precheck stages.
///
/// # Errors
///
/// Same conditions as [`run`].
pub fn run_with(
    request: &BuildRequest,
    reporter: &mut dyn Reporter,
    runner: &dyn CommandRunner,
) -> Result<BuildOutcome> {
    let entry = EntryPoint::parse(&request.entry)?;

    reporter.info(&format!("Probing {}", request.python));
    let interp = HostInterpreter::probe_with(&request.python, runner)?;
    reporter.debug(&format!(
        "Interpreter {} at {}",
        interp.version(),
        interp.stdlib_dir()
    ));

    let origin = interp.resolve_entry_origin_with(&entry.module, runner)?;
    reporter.debug(&format!("Entry module resolves to {origin}"));
    let app_root = application_root(&origin, &entry.module)?;

    let ctx = BuildContext::new(
        request.build_dir.clone(),
        entry,
        request.program_name.clone(),
    );
    let packager = Packager::new(&ctx, &interp);
    packager.prepare()?;

    reporter.info(&format!("Resolving imports of {}", ctx.entry().module));
    let graph = GraphBuilder::new(&interp, app_root).resolve(&origin, &ctx.entry().module)?;
    reporter.info(&format!("Resolved {} modules", graph.len()));

    packager.package_standard_library(reporter)?;
    let (_archive, skipped) = packager.package_application(&graph, reporter)?;

    EmbedGenerator::new(&ctx).write_sources()?;
    let executable =
        NativeToolchain::new(&ctx, &interp, request.compiler.as_deref()).build(reporter)?;

    let outcome = BuildOutcome {
        executable,
        bad_modules: graph.bad_modules().clone(),
        skipped,
    };
    emit_summary(&outcome, reporter);
    Ok(outcome)
}

/// Derive the application root directory from the entry module's origin.
///
/// The origin sits `len(segments)` directories below the root, one more
/// when the entry is a package's `__init__.py`.
fn application_root(origin: &Utf8Path, module: &ModuleName) -> Result<Utf8PathBuf> {
    let pops = if origin.file_name() == Some("__init__.py") {
        module.len() + 1
    } else {
        module.len()
    };
    let mut root = origin.to_owned();
    for _ in 0..pops {
        if !root.pop() {
            return Err(ForgeError::EntryScript {
                path: origin.to_owned(),
                reason: format!("cannot derive application root for module {module}"),
            });
        }
    }
    Ok(root)
}

/// Emit the post-build warning list and the closing success line.
fn emit_summary(outcome: &BuildOutcome, reporter: &mut dyn Reporter) {
    for (name, reason) in &outcome.bad_modules {
        reporter.warning(&format!("unresolved import {name}: {reason}"));
    }
    for diagnostic in &outcome.skipped {
        reporter.warning(&format!(
            "module {} omitted: {}",
            diagnostic.module, diagnostic.reason
        ));
    }
    reporter.success(&format!("Built {}", outcome.executable));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::test_support::{output_with_stderr, output_with_stdout};
    use crate::command::MockCommandRunner;
    use crate::report::{BufferReporter, Severity};
    use rstest::rstest;
    use tempfile::TempDir;

    const PROBE_JSON: &str = r#"{
        "version": "3.12",
        "stdlib": "/usr/lib/python3.12",
        "platstdlib": "/usr/lib/python3.12",
        "include": "/usr/include/python3.12",
        "platinclude": "/usr/include/python3.12",
        "libdir": "/usr/lib",
        "ldlibrary": "libpython3.12.so",
        "ext_suffix": ".cpython-312-x86_64-linux-gnu.so",
        "base_prefix": "/usr",
        "builtins": ["sys", "builtins"]
    }"#;

    fn request_for(entry: &str, build_dir: Utf8PathBuf) -> BuildRequest {
        BuildRequest {
            entry: entry.to_owned(),
            python: "python3".to_owned(),
            build_dir,
            program_name: None,
            compiler: None,
        }
    }

    #[test]
    fn failed_precheck_aborts_before_any_file_is_written() {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 temp path");
        let request = request_for("doesnotexist:run", root.join("build"));

        // First invocation answers the probe; the second is the importability
        // check, which fails.
        let mut runner = MockCommandRunner::new();
        let mut calls = 0;
        runner.expect_run().times(2).returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Ok(output_with_stdout(PROBE_JSON))
            } else {
                Ok(output_with_stderr(
                    1,
                    "ModuleNotFoundError: No module named 'doesnotexist'",
                ))
            }
        });

        let mut reporter = BufferReporter::new();
        let err = run_with(&request, &mut reporter, &runner).expect_err("precheck fails");
        assert!(matches!(err, ForgeError::EntryNotImportable { .. }));
        assert!(!root.join("build/src").exists());
        assert!(!root.join("build").exists());
    }

    #[test]
    fn invalid_entry_specifier_aborts_before_the_probe() {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 temp path");
        let request = request_for("no-colon-here", root.join("build"));

        let mut runner = MockCommandRunner::new();
        runner.expect_run().times(0);

        let mut reporter = BufferReporter::new();
        let err = run_with(&request, &mut reporter, &runner).expect_err("parse fails");
        assert!(matches!(err, ForgeError::InvalidEntryPoint { .. }));
        assert!(!root.join("build").exists());
    }

    #[rstest]
    #[case::top_level("/work/main.py", "main", "/work")]
    #[case::nested_module("/work/app/main.py", "app.main", "/work")]
    #[case::deep_module("/work/app/sub/tool.py", "app.sub.tool", "/work")]
    #[case::package_entry("/work/app/__init__.py", "app", "/work")]
    #[case::nested_package_entry("/work/app/sub/__init__.py", "app.sub", "/work")]
    fn application_root_walks_up_per_segment(
        #[case] origin: &str,
        #[case] module: &str,
        #[case] expected: &str,
    ) {
        let module = ModuleName::parse(module).expect("module name");
        let root = application_root(Utf8Path::new(origin), &module).expect("root derived");
        assert_eq!(root.as_str(), expected);
    }

    #[test]
    fn application_root_refuses_an_origin_that_is_too_shallow() {
        let module = ModuleName::parse("a.b.c.d").expect("module name");
        let err = application_root(Utf8Path::new("/x.py"), &module).expect_err("too shallow");
        assert!(matches!(err, ForgeError::EntryScript { .. }));
    }

    #[test]
    fn summary_warns_per_failure_then_reports_success() {
        let outcome = BuildOutcome {
            executable: Utf8PathBuf::from("/work/build/dist/app"),
            bad_modules: [("nowhere".to_owned(), "no module named nowhere".to_owned())]
                .into_iter()
                .collect(),
            skipped: vec![ModuleDiagnostic {
                module: "broken".to_owned(),
                reason: "SyntaxError: invalid syntax".to_owned(),
            }],
        };
        let mut reporter = BufferReporter::new();
        emit_summary(&outcome, &mut reporter);

        let warnings = reporter.messages_at(Severity::Warning);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("nowhere"));
        assert!(warnings[1].contains("broken"));
        let successes = reporter.messages_at(Severity::Success);
        assert_eq!(successes, vec!["Built /work/build/dist/app"]);
    }

    #[test]
    fn clean_outcome_emits_no_warnings() {
        let outcome = BuildOutcome {
            executable: Utf8PathBuf::from("/work/build/dist/app"),
            bad_modules: BTreeMap::new(),
            skipped: Vec::new(),
        };
        let mut reporter = BufferReporter::new();
        emit_summary(&outcome, &mut reporter);
        assert!(reporter.messages_at(Severity::Warning).is_empty());
    }
}
