//! PyForge: compile a Python entry point into a standalone executable.
//!
//! The library is organised as a sequential pipeline over one build
//! directory:
//!
//! - [`interpreter`] probes the host interpreter for its build configuration
//!   and performs the static entry-point precheck.
//! - [`imports`] and [`graph`] resolve the transitive import closure of the
//!   entry module.
//! - [`packager`] and [`archive`] compile and stage bytecode, relocate
//!   extension binaries and compact the distribution archive.
//! - [`embed`] generates the C glue embedding the interpreter.
//! - [`native`] drives the system C compiler and linker.
//! - [`pipeline`] runs the stages in order and collects per-module
//!   diagnostics.
//!
//! [`cli`], [`report`] and [`error`] carry the outer surface: argument
//! parsing, leveled console reporting and the fatal-error taxonomy.

pub mod archive;
pub mod cli;
pub mod command;
pub mod context;
pub mod embed;
pub mod error;
pub mod graph;
pub mod imports;
pub mod interpreter;
pub mod module_name;
pub mod native;
pub mod packager;
pub mod pipeline;
pub mod report;
