//! External command invocation shared by the store and data-provider
//! adapters.
//!
//! Commands run with the project root as working directory and inherit
//! stdout/stderr, so migration output and dumped fixtures flow straight to
//! the caller. Each command is attempted exactly once; a non-zero exit
//! aborts the invocation.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{PrepError, Result};

/// Render an argv for log lines and error messages.
fn display(argv: &[String]) -> String {
    argv.join(" ")
}

/// Run `argv` in `cwd`, appending `--settings=<profile>` when a profile is
/// configured. The program must resolve on PATH.
pub fn run_command(argv: &[String], profile: Option<&str>, cwd: &Path) -> Result<()> {
    let Some((program, args)) = argv.split_first() else {
        return Err(PrepError::InvalidConfig("empty command".into()));
    };
    let resolved =
        which::which(program).map_err(|_| PrepError::CommandNotFound(program.clone()))?;

    let mut cmd = Command::new(resolved);
    cmd.args(args);
    if let Some(profile) = profile {
        cmd.arg(format!("--settings={profile}"));
    }
    cmd.current_dir(cwd);
    cmd.stdin(Stdio::null());

    let rendered = display(argv);
    debug!(command = %rendered, "running external command");
    let status = cmd.status()?;
    if !status.success() {
        return Err(PrepError::CommandFailed {
            command: rendered,
            status: status.to_string(),
        });
    }
    Ok(())
}
