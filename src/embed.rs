//! Generation of the C embedding glue.
//!
//! Two translation units are generated per build. The glue unit owns the
//! interpreter lifecycle: it configures an isolated runtime whose module
//! search path is the bundled archive plus the extension directory, hands
//! over `argv`, and runs a bootstrap snippet that imports the entry module
//! and calls the entry function. The program unit is a minimal `main` that
//! delegates to the glue through a symbol named after the build identifier,
//! so two differently-named builds can never collide at link time.
//!
//! Search paths are relative to the distribution directory, matching the
//! relative rpath the linker stage records.

use crate::context::BuildContext;
use crate::error::Result;
use std::fmt::Write as _;
use std::fs;

/// Archive path the embedded runtime imports from, relative to the
/// distribution directory.
const ARCHIVE_SEARCH_PATH: &str = "lib/pylib.zip";

/// Extension-binary path the embedded runtime loads from, relative to the
/// distribution directory.
const DYNLOAD_SEARCH_PATH: &str = "lib/lib-dynload";

/// Qualifier block for the glue symbol's declaration. The Windows linking
/// convention wants an explicit `__declspec(dllexport)` on exported symbols;
/// everywhere else plain external linkage suffices.
const EXPORT_QUALIFIER: &str = r"#if defined(_MSC_VER)
#define PYFORGE_EXPORT __declspec(dllexport)
#else
#define PYFORGE_EXPORT extern
#endif";

/// Generates the glue and program translation units for one build.
pub struct EmbedGenerator<'a> {
    ctx: &'a BuildContext,
}

impl<'a> EmbedGenerator<'a> {
    /// Create a generator for `ctx`.
    #[must_use]
    pub fn new(ctx: &'a BuildContext) -> Self {
        Self { ctx }
    }

    /// The exported glue symbol, derived from the build identifier.
    #[must_use]
    pub fn glue_symbol(&self) -> String {
        format!("{}_run", self.ctx.build_id())
    }

    /// The bootstrap snippet the embedded runtime executes at startup.
    ///
    /// Registers a sentinel module under the build identifier so a running
    /// program can be recognised as this exact build, then imports the entry
    /// module and exits with the entry function's return value.
    #[must_use]
    pub fn bootstrap_snippet(&self) -> String {
        let entry = self.ctx.entry();
        let build_id = self.ctx.build_id();
        format!(
            "import importlib, sys, types\n\
             sys.modules['{build_id}'] = types.ModuleType('{build_id}')\n\
             target = importlib.import_module('{module}')\n\
             sys.exit(target.{function}())\n",
            module = entry.module.as_dotted(),
            function = entry.function,
        )
    }

    /// Render the glue translation unit.
    #[must_use]
    pub fn entry_point_unit(&self) -> String {
        let symbol = self.glue_symbol();
        let bootstrap = c_string_literal(&self.bootstrap_snippet());
        let mut unit = String::new();
        let _ = write!(
            unit,
            r#"#include <Python.h>

{EXPORT_QUALIFIER}

static const char bootstrap[] =
{bootstrap};

PYFORGE_EXPORT int
{symbol}(int argc, char **argv)
{{
    PyStatus status;
    PyConfig config;

    PyConfig_InitIsolatedConfig(&config);

    config.module_search_paths_set = 1;
    status = PyWideStringList_Append(&config.module_search_paths,
                                     L"{ARCHIVE_SEARCH_PATH}");
    if (PyStatus_Exception(status)) {{
        goto fail;
    }}
    status = PyWideStringList_Append(&config.module_search_paths,
                                     L"{DYNLOAD_SEARCH_PATH}");
    if (PyStatus_Exception(status)) {{
        goto fail;
    }}

    status = PyConfig_SetBytesArgv(&config, argc, argv);
    if (PyStatus_Exception(status)) {{
        goto fail;
    }}

    status = PyConfig_SetBytesString(&config.run_command, bootstrap);
    if (PyStatus_Exception(status)) {{
        goto fail;
    }}

    status = Py_InitializeFromConfig(&config);
    if (PyStatus_Exception(status)) {{
        goto fail;
    }}
    PyConfig_Clear(&config);

    return Py_RunMain();

fail:
    PyConfig_Clear(&config);
    if (PyStatus_IsExit(status)) {{
        return status.exitcode;
    }}
    Py_ExitStatusException(status);
}}
"#
        );
        unit
    }

    /// Render the program translation unit holding `main`.
    #[must_use]
    pub fn program_unit(&self) -> String {
        let symbol = self.glue_symbol();
        format!(
            r#"{EXPORT_QUALIFIER}

PYFORGE_EXPORT int {symbol}(int argc, char **argv);

int
main(int argc, char **argv)
{{
    return {symbol}(argc, argv);
}}
"#
        )
    }

    /// Write both translation units under the build's source directory.
    ///
    /// # Errors
    ///
    /// Returns an error if a source file cannot be written.
    pub fn write_sources(&self) -> Result<()> {
        fs::create_dir_all(self.ctx.src_dir())?;
        fs::write(self.ctx.entry_point_source(), self.entry_point_unit())?;
        fs::write(self.ctx.program_source(), self.program_unit())?;
        Ok(())
    }
}

/// Render text as an indented C string literal, one source line per literal
/// line, newlines escaped.
fn c_string_literal(text: &str) -> String {
    let mut rendered = Vec::new();
    for line in text.split_inclusive('\n') {
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, "\\n"),
            None => (line, ""),
        };
        let escaped = body.replace('\\', "\\\\").replace('"', "\\\"");
        rendered.push(format!("    \"{escaped}{newline}\""));
    }
    if rendered.is_empty() {
        rendered.push("    \"\"".to_owned());
    }
    rendered.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module_name::EntryPoint;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn context_for(spec: &str) -> BuildContext {
        let entry = EntryPoint::parse(spec).expect("valid entry");
        BuildContext::new(Utf8PathBuf::from("/work/build"), entry, None)
    }

    #[test]
    fn glue_symbol_carries_the_build_identifier() {
        let ctx = context_for("app.main:run");
        let generator = EmbedGenerator::new(&ctx);
        let symbol = generator.glue_symbol();
        assert!(symbol.starts_with(ctx.build_id().as_str()));
        assert!(symbol.ends_with("_run"));
    }

    #[test]
    fn bootstrap_imports_the_entry_module_and_calls_the_function() {
        let ctx = context_for("app.main:serve");
        let snippet = EmbedGenerator::new(&ctx).bootstrap_snippet();
        assert!(snippet.contains("importlib.import_module('app.main')"));
        assert!(snippet.contains("sys.exit(target.serve())"));
    }

    #[test]
    fn bootstrap_registers_the_sentinel_module() {
        let ctx = context_for("app.main:run");
        let snippet = EmbedGenerator::new(&ctx).bootstrap_snippet();
        assert!(snippet.contains(&format!("sys.modules['{}']", ctx.build_id())));
    }

    #[test]
    fn glue_unit_configures_the_bundled_search_paths() {
        let ctx = context_for("app.main:run");
        let unit = EmbedGenerator::new(&ctx).entry_point_unit();
        assert!(unit.contains("L\"lib/pylib.zip\""));
        assert!(unit.contains("L\"lib/lib-dynload\""));
        assert!(unit.contains("PyConfig_InitIsolatedConfig"));
        assert!(unit.contains("Py_RunMain"));
    }

    #[test]
    fn program_unit_delegates_main_to_the_glue_symbol() {
        let ctx = context_for("app.main:run");
        let generator = EmbedGenerator::new(&ctx);
        let unit = generator.program_unit();
        assert!(unit.contains(&format!("PYFORGE_EXPORT int {}", generator.glue_symbol())));
        assert!(unit.contains("main(int argc, char **argv)"));
    }

    #[test]
    fn glue_symbol_declarations_are_qualified_per_platform() {
        let ctx = context_for("app.main:run");
        let generator = EmbedGenerator::new(&ctx);
        for unit in [generator.entry_point_unit(), generator.program_unit()] {
            assert!(unit.contains("#if defined(_MSC_VER)"));
            assert!(unit.contains("__declspec(dllexport)"));
            assert!(unit.contains("#define PYFORGE_EXPORT extern"));
        }
    }

    #[test]
    fn generation_is_deterministic_for_the_same_entry() {
        let ctx = context_for("app.main:run");
        let first = EmbedGenerator::new(&ctx).entry_point_unit();
        let second = EmbedGenerator::new(&ctx).entry_point_unit();
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_entry_modules_yield_distinct_symbols() {
        let first = context_for("app.main:run");
        let second = context_for("app.cli:run");
        assert_ne!(
            EmbedGenerator::new(&first).glue_symbol(),
            EmbedGenerator::new(&second).glue_symbol()
        );
    }

    #[test]
    fn write_sources_creates_both_units() {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 temp path");
        let entry = EntryPoint::parse("app.main:run").expect("valid entry");
        let ctx = BuildContext::new(root.join("build"), entry, None);

        EmbedGenerator::new(&ctx).write_sources().expect("written");
        assert!(ctx.entry_point_source().is_file());
        assert!(ctx.program_source().is_file());
        let glue = fs::read_to_string(ctx.entry_point_source()).expect("read glue");
        assert!(glue.contains("Py_InitializeFromConfig"));
    }

    #[test]
    fn c_literal_escapes_quotes_and_newlines() {
        let rendered = c_string_literal("say \"hi\"\nbye\n");
        assert!(rendered.contains("say \\\"hi\\\"\\n"));
        assert!(rendered.contains("\"bye\\n\""));
    }
}
