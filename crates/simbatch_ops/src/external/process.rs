//! Running one external command.
//!
//! Spawning and the exit status check are separate steps, each failing with
//! its own [`ExternalError`] variant.

use crate::error::ExternalError;
use std::process::{Command, ExitStatus};
use tracing::{debug, warn};

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// The command line that ran.
    pub command: String,
    /// Exit status.
    pub status: ExitStatus,
    /// Standard output, lossily decoded as UTF-8.
    pub stdout: String,
    /// Standard error, lossily decoded as UTF-8.
    pub stderr: String,
}

/// Runs `argv` to completion and captures its output.
///
/// Blocks until the process exits. There is no timeout.
///
/// # Errors
///
/// Returns [`ExternalError::EmptyCommand`] for an empty `argv` and
/// [`ExternalError::Spawn`] if the process cannot be started.
pub fn run(argv: &[String]) -> Result<CommandOutput, ExternalError> {
    let (program, args) = argv.split_first().ok_or(ExternalError::EmptyCommand)?;
    let command = argv.join(" ");
    debug!(command = %command, "Spawning external command");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ExternalError::Spawn {
            command: command.clone(),
            source,
        })?;

    Ok(CommandOutput {
        command,
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

impl CommandOutput {
    /// Passes the output through if the command succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalError::NonZeroExit`] with the captured output
    /// otherwise.
    pub fn check_status(self) -> Result<Self, ExternalError> {
        if self.status.success() {
            return Ok(self);
        }
        warn!(
            command = %self.command,
            code = ?self.status.code(),
            "External command failed"
        );
        Err(ExternalError::NonZeroExit {
            command: self.command,
            code: self.status.code(),
            stdout: self.stdout,
            stderr: self.stderr,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn captures_stdout() {
        let output = run(&argv(&["echo", "hello", "world"])).unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, "hello world\n");
        assert_eq!(output.command, "echo hello world");
    }

    #[test]
    fn non_zero_exit_keeps_output() {
        let output = run(&argv(&["sh", "-c", "echo partial; echo oops >&2; exit 3"])).unwrap();
        match output.check_status() {
            Err(ExternalError::NonZeroExit {
                code,
                stdout,
                stderr,
                ..
            }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stdout, "partial\n");
                assert_eq!(stderr, "oops\n");
            }
            other => panic!("expected non-zero exit, got {other:?}"),
        }
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let err = run(&argv(&["simbatch-no-such-program-xyz"])).unwrap_err();
        assert!(matches!(err, ExternalError::Spawn { .. }));
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(run(&[]), Err(ExternalError::EmptyCommand)));
    }
}
