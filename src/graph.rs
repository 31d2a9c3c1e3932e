//! Static module-graph resolution.
//!
//! [`GraphBuilder::resolve`] computes the transitive import closure of an
//! entry script as an explicit worklist over module names: cycle handling
//! and the bad-module set are state, not call-stack behaviour. Resolution is
//! best-effort — a single dependency that cannot be located is recorded with
//! a reason and never aborts the walk. Search order follows the runtime's
//! convention: application root first, then the standard library, then the
//! extension directory.

use crate::error::{ForgeError, Result};
use crate::imports::{scan_imports, ImportStmt};
use crate::interpreter::{shared_library_suffix, HostInterpreter};
use crate::module_name::ModuleName;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;

/// How a resolved module materialises on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// A `.py` source file; compiled to bytecode during packaging.
    PureSource,
    /// A pre-compiled `.pyc`; copied verbatim.
    CompiledBytecode,
    /// A native extension module; copied verbatim, never compiled.
    ExtensionBinary,
    /// No on-disk artifact: a builtin or a namespace package.
    NoArtifact,
}

/// One resolved module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    /// Dotted module name.
    pub name: ModuleName,
    /// Artifact classification.
    pub kind: ModuleKind,
    /// Origin path; absent for [`ModuleKind::NoArtifact`].
    pub origin: Option<Utf8PathBuf>,
    /// Whether this module is a package root.
    pub is_package: bool,
}

/// The resolved import closure of an entry script.
///
/// Immutable once built; recomputed fresh on every invocation.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: BTreeMap<ModuleName, ModuleRecord>,
    bad_modules: BTreeMap<String, String>,
}

impl ModuleGraph {
    /// All resolved modules, keyed by name.
    #[must_use]
    pub fn modules(&self) -> &BTreeMap<ModuleName, ModuleRecord> {
        &self.modules
    }

    /// Look up one module.
    #[must_use]
    pub fn get(&self, name: &ModuleName) -> Option<&ModuleRecord> {
        self.modules.get(name)
    }

    /// Modules whose resolution failed, with reasons.
    #[must_use]
    pub fn bad_modules(&self) -> &BTreeMap<String, String> {
        &self.bad_modules
    }

    /// Number of resolved modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the graph is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Outcome of locating one module name on the search path.
enum Located {
    Module(ModuleRecord),
    Namespace,
    Missing(String),
}

/// A queued resolution request.
///
/// Tentative items come from `from x import y` where `y` may be an
/// attribute rather than a submodule; their absence is not an error.
struct WorkItem {
    name: ModuleName,
    tentative: bool,
}

/// Resolves the import closure of an entry script.
pub struct GraphBuilder<'a> {
    interp: &'a HostInterpreter,
    search_paths: Vec<Utf8PathBuf>,
}

impl<'a> GraphBuilder<'a> {
    /// Create a builder searching `app_root` first, then the interpreter's
    /// standard-library and extension directories.
    #[must_use]
    pub fn new(interp: &'a HostInterpreter, app_root: Utf8PathBuf) -> Self {
        let mut search_paths = vec![app_root, interp.stdlib_dir().clone()];
        if interp.platstdlib_dir() != interp.stdlib_dir() {
            search_paths.push(interp.platstdlib_dir().clone());
        }
        search_paths.push(interp.dynload_dir());
        Self {
            interp,
            search_paths,
        }
    }

    /// Resolve the transitive import closure of `entry_script`.
    ///
    /// `entry_module` is the dotted name under which the script will be
    /// imported; it seeds the graph and anchors relative imports.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::EntryScript`] if the entry script cannot be
    /// read. Failures of individual dependencies never error; they are
    /// recorded in the graph's bad-module set.
    pub fn resolve(
        &self,
        entry_script: &Utf8Path,
        entry_module: &ModuleName,
    ) -> Result<ModuleGraph> {
        let source = fs::read_to_string(entry_script).map_err(|e| ForgeError::EntryScript {
            path: entry_script.to_owned(),
            reason: e.to_string(),
        })?;

        let mut graph = ModuleGraph::default();
        let mut visited: BTreeSet<ModuleName> = BTreeSet::new();
        let mut queue: VecDeque<WorkItem> = VecDeque::new();

        let entry_is_package = entry_script.file_name() == Some("__init__.py");
        let entry_package = if entry_is_package {
            Some(entry_module.clone())
        } else {
            entry_module.parent()
        };
        visited.insert(entry_module.clone());
        graph.modules.insert(
            entry_module.clone(),
            ModuleRecord {
                name: entry_module.clone(),
                kind: ModuleKind::PureSource,
                origin: Some(entry_script.to_owned()),
                is_package: entry_is_package,
            },
        );
        for ancestor in entry_module.ancestors() {
            queue.push_back(WorkItem {
                name: ancestor,
                tentative: false,
            });
        }
        enqueue_imports(
            &scan_imports(&source),
            entry_package.as_ref(),
            &mut queue,
            &mut graph.bad_modules,
        );

        while let Some(item) = queue.pop_front() {
            if !visited.insert(item.name.clone()) {
                continue;
            }

            if self.interp.is_builtin(&item.name) {
                graph.modules.insert(
                    item.name.clone(),
                    ModuleRecord {
                        name: item.name,
                        kind: ModuleKind::NoArtifact,
                        origin: None,
                        is_package: false,
                    },
                );
                continue;
            }

            match self.locate(&item.name) {
                Located::Module(record) => {
                    if record.kind == ModuleKind::PureSource {
                        self.scan_module(&record, &mut queue, &mut graph.bad_modules);
                    }
                    graph.modules.insert(item.name, record);
                }
                Located::Namespace => {
                    graph.modules.insert(
                        item.name.clone(),
                        ModuleRecord {
                            name: item.name,
                            kind: ModuleKind::NoArtifact,
                            origin: None,
                            is_package: true,
                        },
                    );
                }
                Located::Missing(reason) => {
                    if !item.tentative {
                        graph
                            .bad_modules
                            .entry(item.name.as_dotted())
                            .or_insert(reason);
                    }
                }
            }
        }

        Ok(graph)
    }

    /// Scan a resolved source module and enqueue its imports.
    ///
    /// An unreadable dependency source is a recoverable failure: the module
    /// itself stays in the graph, its imports are simply unknown.
    fn scan_module(
        &self,
        record: &ModuleRecord,
        queue: &mut VecDeque<WorkItem>,
        bad: &mut BTreeMap<String, String>,
    ) {
        let Some(origin) = &record.origin else {
            return;
        };
        let source = match fs::read_to_string(origin) {
            Ok(source) => source,
            Err(e) => {
                bad.entry(record.name.as_dotted())
                    .or_insert_with(|| format!("unreadable source: {e}"));
                return;
            }
        };
        let package = if record.is_package {
            Some(record.name.clone())
        } else {
            record.name.parent()
        };
        enqueue_imports(&scan_imports(&source), package.as_ref(), queue, bad);
    }

    /// Locate one module name on the search path.
    fn locate(&self, name: &ModuleName) -> Located {
        let ext_suffix = self.interp.ext_suffix();
        let mut saw_namespace = false;

        for root in &self.search_paths {
            let mut dir = root.clone();
            for segment in &name.segments()[..name.len() - 1] {
                dir.push(segment);
            }
            let last = name.last();

            let package_dir = dir.join(last);
            let candidates = [
                (package_dir.join("__init__.py"), ModuleKind::PureSource, true),
                (
                    package_dir.join("__init__.pyc"),
                    ModuleKind::CompiledBytecode,
                    true,
                ),
                (dir.join(format!("{last}.py")), ModuleKind::PureSource, false),
                (
                    dir.join(format!("{last}.pyc")),
                    ModuleKind::CompiledBytecode,
                    false,
                ),
                (
                    dir.join(format!("{last}{ext_suffix}")),
                    ModuleKind::ExtensionBinary,
                    false,
                ),
                (
                    dir.join(format!("{last}{}", shared_library_suffix())),
                    ModuleKind::ExtensionBinary,
                    false,
                ),
            ];
            for (path, kind, is_package) in candidates {
                if path.is_file() {
                    return Located::Module(ModuleRecord {
                        name: name.clone(),
                        kind,
                        origin: Some(path),
                        is_package,
                    });
                }
            }
            if package_dir.is_dir() {
                saw_namespace = true;
            }
        }

        if saw_namespace {
            Located::Namespace
        } else {
            Located::Missing(format!("no module named {name}"))
        }
    }
}

/// Enqueue the targets of scanned import statements.
fn enqueue_imports(
    statements: &[ImportStmt],
    package: Option<&ModuleName>,
    queue: &mut VecDeque<WorkItem>,
    bad: &mut BTreeMap<String, String>,
) {
    for stmt in statements {
        let base = match resolve_base(stmt, package) {
            Ok(Some(base)) => base,
            Ok(None) => continue,
            Err(reason) => {
                bad.entry(relative_display(stmt)).or_insert(reason);
                continue;
            }
        };

        for ancestor in base.ancestors() {
            queue.push_back(WorkItem {
                name: ancestor,
                tentative: false,
            });
        }
        queue.push_back(WorkItem {
            name: base.clone(),
            tentative: false,
        });
        // `from base import name`: `name` may be a submodule or a plain
        // attribute, so its absence is not recorded.
        for imported in &stmt.names {
            if let Some(candidate) = ModuleName::from_segments(&[imported.as_str()]) {
                queue.push_back(WorkItem {
                    name: base.join(candidate.segments()),
                    tentative: true,
                });
            }
        }
    }
}

/// Compute the absolute base module of a statement.
///
/// Relative imports anchor to `package` per the usual dot semantics: one
/// dot names the current package, each additional dot walks one level up.
fn resolve_base(
    stmt: &ImportStmt,
    package: Option<&ModuleName>,
) -> std::result::Result<Option<ModuleName>, String> {
    if stmt.levels == 0 {
        return Ok(stmt.module.as_deref().and_then(ModuleName::parse));
    }

    let Some(package) = package else {
        return Err("attempted relative import with no known parent package".to_owned());
    };
    let strip = (stmt.levels - 1) as usize;
    let base = if strip == 0 {
        package.clone()
    } else {
        package
            .strip_last(strip)
            .ok_or_else(|| "attempted relative import beyond top-level package".to_owned())?
    };
    match &stmt.module {
        Some(tail) => match ModuleName::parse(tail) {
            Some(tail) => Ok(Some(base.join(tail.segments()))),
            None => Ok(None),
        },
        None => Ok(Some(base)),
    }
}

/// Display form of a relative import that could not be anchored.
fn relative_display(stmt: &ImportStmt) -> String {
    format!(
        "{}{}",
        ".".repeat(stmt.levels as usize),
        stmt.module.as_deref().unwrap_or_default()
    )
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
