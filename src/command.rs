//! External command execution seam.
//!
//! Every external tool invocation (interpreter probe, bytecode compilation,
//! C compiler, linker) goes through [`CommandRunner`] so tests can substitute
//! a mock and exercise the surrounding logic without side effects.

use std::io;
use std::process::{Command, Output};

/// Abstraction for running external commands synchronously.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    /// Run `program` with `args`, blocking until it exits.
    fn run(&self, program: &str, args: &[String]) -> io::Result<Output>;
}

/// Runner backed by [`std::process::Command`].
#[derive(Debug, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<Output> {
        Command::new(program).args(args).output()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Helpers for fabricating command outputs in tests.

    use std::process::{ExitStatus, Output};

    #[cfg(unix)]
    pub fn exit_status(code: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;

        ExitStatus::from_raw(code << 8)
    }

    #[cfg(windows)]
    pub fn exit_status(code: i32) -> ExitStatus {
        use std::os::windows::process::ExitStatusExt;

        ExitStatus::from_raw(code as u32)
    }

    /// A successful `Output` with the given stdout.
    pub fn output_with_stdout(stdout: &str) -> Output {
        Output {
            status: exit_status(0),
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
        }
    }

    /// A failed `Output` with the given exit code and stderr.
    pub fn output_with_stderr(code: i32, stderr: &str) -> Output {
        Output {
            status: exit_status(code),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }
}
