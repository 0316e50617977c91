//! `git` subprocess execution

use std::path::Path;
use std::process::{Command, Output};

use crate::{Error, Result};

/// How long git waits on another process's ref lock before giving up
const REF_LOCK_TIMEOUT_MS: &str = "3000";

/// Build a `git` command for `workdir` that can never block on a prompt.
///
/// Messages are forced to the C locale because callers match on them. Paths
/// are always literal: `photo[1].jpg` must never also match `photo1.jpg`.
/// A ref lock held by a concurrent fetch is waited for instead of failing.
fn base_command(workdir: &Path, config: &[(String, String)]) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(workdir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_EDITOR", "true")
        .env("GIT_MERGE_AUTOEDIT", "no")
        .env("LC_ALL", "C")
        .env("GIT_LITERAL_PATHSPECS", "1")
        .arg("-c")
        .arg(format!("core.filesRefLockTimeout={REF_LOCK_TIMEOUT_MS}"));
    for (key, value) in config {
        cmd.arg("-c").arg(format!("{key}={value}"));
    }
    cmd
}

/// Run `git <args>` and return its raw output regardless of exit status.
pub(crate) fn output(workdir: &Path, config: &[(String, String)], args: &[&str]) -> Result<Output> {
    tracing::debug!(args = ?args, "git");
    let output = base_command(workdir, config).args(args).output()?;
    Ok(output)
}

/// Run `git <args>` and return trimmed stdout, failing on a non-zero exit.
pub(crate) fn run(workdir: &Path, config: &[(String, String)], args: &[&str]) -> Result<String> {
    let out = output(workdir, config, args)?;
    if out.status.success() {
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    } else {
        Err(Error::CommandFailed {
            command: args.join(" "),
            stderr: failure_text(&out),
        })
    }
}

/// Human-readable failure text: stderr, or stdout when stderr is empty.
pub(crate) fn failure_text(out: &Output) -> String {
    let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
    if stderr.is_empty() {
        String::from_utf8_lossy(&out.stdout).trim().to_string()
    } else {
        stderr
    }
}
