//! Tests for module-graph resolution over synthetic package trees.

use super::*;
use crate::interpreter::TestFacts;
use rstest::{fixture, rstest};
use std::collections::BTreeSet;
use tempfile::TempDir;

const EXT_SUFFIX: &str = ".cpython-312-x86_64-linux-gnu.so";

/// A synthetic application tree plus an interpreter probed against it.
struct Workbench {
    _temp: TempDir,
    root: Utf8PathBuf,
    interp: HostInterpreter,
}

impl Workbench {
    fn new() -> Self {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 temp path");
        let app = root.join("app");
        let stdlib = root.join("stdlib");
        fs::create_dir_all(&app).expect("app dir");
        fs::create_dir_all(&stdlib).expect("stdlib dir");

        let facts = TestFacts {
            stdlib: stdlib.clone(),
            platstdlib: stdlib,
            ext_suffix: EXT_SUFFIX.to_owned(),
            ..TestFacts::default()
        };
        Self {
            _temp: temp,
            root,
            interp: HostInterpreter::from_test_facts(facts),
        }
    }

    fn app_root(&self) -> Utf8PathBuf {
        self.root.join("app")
    }

    fn write(&self, relative: &str, contents: &str) -> Utf8PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent dirs");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    fn resolve(&self, entry_relative: &str, entry_module: &str) -> ModuleGraph {
        let entry = self.root.join(entry_relative);
        let module = ModuleName::parse(entry_module).expect("entry module name");
        GraphBuilder::new(&self.interp, self.app_root())
            .resolve(&entry, &module)
            .expect("resolution succeeds")
    }

    fn module_names(graph: &ModuleGraph) -> BTreeSet<String> {
        graph.modules().keys().map(ModuleName::as_dotted).collect()
    }
}

#[fixture]
fn bench() -> Workbench {
    Workbench::new()
}

#[rstest]
fn entry_module_appears_in_the_graph(bench: Workbench) {
    bench.write("app/main.py", "x = 1\n");
    let graph = bench.resolve("app/main.py", "main");
    assert!(graph.get(&ModuleName::parse("main").expect("name")).is_some());
    assert!(graph.bad_modules().is_empty());
}

#[rstest]
fn transitive_imports_are_followed(bench: Workbench) {
    bench.write("app/main.py", "import helper\n");
    bench.write("app/helper.py", "import util\n");
    bench.write("app/util.py", "\n");
    let graph = bench.resolve("app/main.py", "main");
    let names = Workbench::module_names(&graph);
    assert!(names.contains("helper"));
    assert!(names.contains("util"));
}

#[rstest]
fn cyclic_imports_terminate(bench: Workbench) {
    bench.write("app/main.py", "import alpha\n");
    bench.write("app/alpha.py", "import beta\n");
    bench.write("app/beta.py", "import alpha\n");
    let graph = bench.resolve("app/main.py", "main");
    let names = Workbench::module_names(&graph);
    assert!(names.contains("alpha"));
    assert!(names.contains("beta"));
    assert!(graph.bad_modules().is_empty());
}

#[rstest]
fn each_module_appears_exactly_once(bench: Workbench) {
    bench.write("app/main.py", "import shared\nimport other\n");
    bench.write("app/other.py", "import shared\n");
    bench.write("app/shared.py", "\n");
    let graph = bench.resolve("app/main.py", "main");
    // BTreeMap keys are unique by construction; confirm the count matches
    // the distinct set.
    assert_eq!(graph.len(), Workbench::module_names(&graph).len());
}

#[rstest]
fn re_resolution_is_deterministic(bench: Workbench) {
    bench.write("app/main.py", "import helper\nimport missing_dep\n");
    bench.write("app/helper.py", "from pkg import tool\n");
    bench.write("app/pkg/__init__.py", "\n");
    bench.write("app/pkg/tool.py", "\n");
    let first = bench.resolve("app/main.py", "main");
    let second = bench.resolve("app/main.py", "main");
    assert_eq!(
        Workbench::module_names(&first),
        Workbench::module_names(&second)
    );
    assert_eq!(first.bad_modules(), second.bad_modules());
}

#[rstest]
fn missing_dependency_is_recorded_once_and_does_not_abort(bench: Workbench) {
    bench.write("app/main.py", "import nowhere\nimport helper\n");
    bench.write("app/helper.py", "import nowhere\n");
    let graph = bench.resolve("app/main.py", "main");
    assert!(Workbench::module_names(&graph).contains("helper"));
    assert_eq!(graph.bad_modules().len(), 1);
    let reason = graph.bad_modules().get("nowhere").expect("recorded");
    assert!(reason.contains("no module named nowhere"));
}

#[rstest]
fn dotted_import_pulls_in_ancestor_packages(bench: Workbench) {
    bench.write("app/main.py", "import pkg.sub.leaf\n");
    bench.write("app/pkg/__init__.py", "\n");
    bench.write("app/pkg/sub/__init__.py", "\n");
    bench.write("app/pkg/sub/leaf.py", "\n");
    let graph = bench.resolve("app/main.py", "main");
    let names = Workbench::module_names(&graph);
    assert!(names.contains("pkg"));
    assert!(names.contains("pkg.sub"));
    assert!(names.contains("pkg.sub.leaf"));
}

#[rstest]
fn package_roots_are_flagged(bench: Workbench) {
    bench.write("app/main.py", "import pkg\n");
    bench.write("app/pkg/__init__.py", "\n");
    let graph = bench.resolve("app/main.py", "main");
    let record = graph
        .get(&ModuleName::parse("pkg").expect("name"))
        .expect("resolved");
    assert!(record.is_package);
    assert_eq!(record.kind, ModuleKind::PureSource);
    assert!(record
        .origin
        .as_ref()
        .is_some_and(|p| p.ends_with("__init__.py")));
}

#[rstest]
fn relative_imports_resolve_against_the_package(bench: Workbench) {
    bench.write("app/pkg/__init__.py", "\n");
    bench.write("app/pkg/main.py", "from . import sibling\nfrom .sibling import thing\n");
    bench.write("app/pkg/sibling.py", "\n");
    let graph = bench.resolve("app/pkg/main.py", "pkg.main");
    assert!(Workbench::module_names(&graph).contains("pkg.sibling"));
    assert!(graph.bad_modules().is_empty());
}

#[rstest]
fn relative_import_beyond_top_level_is_bad(bench: Workbench) {
    bench.write("app/pkg/__init__.py", "\n");
    bench.write("app/pkg/main.py", "from ...far import away\n");
    let graph = bench.resolve("app/pkg/main.py", "pkg.main");
    let (name, reason) = graph
        .bad_modules()
        .iter()
        .next()
        .expect("one bad module");
    assert_eq!(name, "...far");
    assert!(reason.contains("beyond top-level"));
}

#[rstest]
fn builtins_are_no_artifact(bench: Workbench) {
    bench.write("app/main.py", "import sys\n");
    let graph = bench.resolve("app/main.py", "main");
    let record = graph
        .get(&ModuleName::parse("sys").expect("name"))
        .expect("resolved");
    assert_eq!(record.kind, ModuleKind::NoArtifact);
    assert!(record.origin.is_none());
}

#[rstest]
fn extension_binaries_are_classified_not_compiled(bench: Workbench) {
    bench.write("app/main.py", "import fastmath\n");
    bench.write(&format!("app/fastmath{EXT_SUFFIX}"), "\u{7f}ELF");
    let graph = bench.resolve("app/main.py", "main");
    let record = graph
        .get(&ModuleName::parse("fastmath").expect("name"))
        .expect("resolved");
    assert_eq!(record.kind, ModuleKind::ExtensionBinary);
}

#[rstest]
fn precompiled_bytecode_is_classified(bench: Workbench) {
    bench.write("app/main.py", "import frozen\n");
    bench.write("app/frozen.pyc", "fake bytecode");
    let graph = bench.resolve("app/main.py", "main");
    let record = graph
        .get(&ModuleName::parse("frozen").expect("name"))
        .expect("resolved");
    assert_eq!(record.kind, ModuleKind::CompiledBytecode);
}

#[rstest]
fn source_wins_over_bytecode_and_extension(bench: Workbench) {
    bench.write("app/main.py", "import both\n");
    bench.write("app/both.py", "\n");
    bench.write("app/both.pyc", "fake bytecode");
    let graph = bench.resolve("app/main.py", "main");
    let record = graph
        .get(&ModuleName::parse("both").expect("name"))
        .expect("resolved");
    assert_eq!(record.kind, ModuleKind::PureSource);
}

#[rstest]
fn namespace_package_is_no_artifact(bench: Workbench) {
    bench.write("app/main.py", "import bare\n");
    fs::create_dir_all(bench.root.join("app/bare")).expect("namespace dir");
    let graph = bench.resolve("app/main.py", "main");
    let record = graph
        .get(&ModuleName::parse("bare").expect("name"))
        .expect("resolved");
    assert_eq!(record.kind, ModuleKind::NoArtifact);
    assert!(record.is_package);
}

#[rstest]
fn stdlib_modules_resolve_after_application_paths(bench: Workbench) {
    bench.write("app/main.py", "import textwrap\n");
    bench.write("stdlib/textwrap.py", "\n");
    let graph = bench.resolve("app/main.py", "main");
    let record = graph
        .get(&ModuleName::parse("textwrap").expect("name"))
        .expect("resolved");
    assert!(record
        .origin
        .as_ref()
        .is_some_and(|p| p.as_str().contains("stdlib")));
}

#[rstest]
fn application_module_shadows_stdlib(bench: Workbench) {
    bench.write("app/main.py", "import textwrap\n");
    bench.write("app/textwrap.py", "\n");
    bench.write("stdlib/textwrap.py", "\n");
    let graph = bench.resolve("app/main.py", "main");
    let record = graph
        .get(&ModuleName::parse("textwrap").expect("name"))
        .expect("resolved");
    assert!(record
        .origin
        .as_ref()
        .is_some_and(|p| p.as_str().contains("app")));
}

#[rstest]
fn from_import_of_attribute_is_not_an_error(bench: Workbench) {
    bench.write("app/main.py", "from helper import just_a_function\n");
    bench.write("app/helper.py", "def just_a_function():\n    pass\n");
    let graph = bench.resolve("app/main.py", "main");
    assert!(graph.bad_modules().is_empty());
    assert!(Workbench::module_names(&graph).contains("helper"));
}

#[rstest]
fn unreadable_entry_script_is_fatal(bench: Workbench) {
    let entry = bench.root.join("app/main.py");
    let module = ModuleName::parse("main").expect("name");
    let err = GraphBuilder::new(&bench.interp, bench.app_root())
        .resolve(&entry, &module)
        .expect_err("missing entry script");
    assert!(matches!(err, ForgeError::EntryScript { .. }));
}
