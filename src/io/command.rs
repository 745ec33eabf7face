use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::Command;

/// Error type for running external programs
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("command not found: {0}")]
    NotFound(String),
    #[error("{program} failed with exit status {status}: {stderr}")]
    Failed {
        program: String,
        /// Exit code, or -1 when killed by a signal
        status: i32,
        stderr: String,
    },
    #[error("could not run {program}: {source}")]
    Io { program: String, source: io::Error },
}

/// Captured output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run a program to completion and capture its output.
///
/// A non-zero exit is [`CommandError::Failed`] carrying stderr; a missing
/// binary is [`CommandError::NotFound`].
pub fn run_command<I, S>(
    program: &str,
    args: I,
    cwd: Option<&Path>,
    env: &[(&str, &str)],
) -> Result<CommandOutput, CommandError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    for (key, value) in env {
        cmd.env(key, value);
    }
    tracing::debug!("running {:?}", cmd);

    let output = cmd.output().map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => CommandError::NotFound(program.to_string()),
        _ => CommandError::Io {
            program: program.to_string(),
            source,
        },
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        return Err(CommandError::Failed {
            program: program.to_string(),
            status: output.status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(CommandOutput { stdout, stderr })
}
