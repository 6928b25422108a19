//! External command invocation.
//!
//! The build toolchain, the hugepage setup script, and the benchmark
//! binaries are all opaque commands behind [`ProcessRunner`], so tests can
//! substitute a fake runner without touching the real toolchain.

use std::process::{Command, Stdio};

use anyhow::{anyhow, Result};

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit_code: i32,
    /// Combined stdout and stderr text.
    pub output: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

pub trait ProcessRunner {
    /// Runs the command to completion, capturing its combined output.
    /// Errors only when the process cannot be launched; a nonzero exit is
    /// a normal `ProcessOutput`.
    fn run(&mut self, program: &str, args: &[String]) -> Result<ProcessOutput>;
}

/// Real subprocess execution, waited on synchronously. No timeout is
/// enforced: a hang in the external binary blocks the whole sweep.
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&mut self, program: &str, args: &[String]) -> Result<ProcessOutput> {
        let out = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| anyhow!("failed to launch {}: {}", program, e))?;
        let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&out.stderr));
        Ok(ProcessOutput {
            exit_code: out.status.code().unwrap_or(-1),
            output: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_runner_reports_exit_code_and_output() {
        let mut runner = SystemRunner;
        let out = runner
            .run("sh", &["-c".to_string(), "echo hello; exit 3".to_string()])
            .expect("launch");
        assert_eq!(out.exit_code, 3);
        assert!(out.output.contains("hello"));
        assert!(!out.success());
    }

    #[test]
    fn system_runner_errors_when_the_program_is_missing() {
        let mut runner = SystemRunner;
        assert!(runner.run("/nonexistent/ccsweep-test-binary", &[]).is_err());
    }
}
