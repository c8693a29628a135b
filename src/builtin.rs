//! Shell-internal commands.
//!
//! The dispatcher inspects the first token of a parsed command and either
//! handles it here, in-process, or reports "not a builtin" so the caller can
//! hand the argument vector to the job control engine.

use crate::shell::Shell;
use anyhow::{Context, Result};
use nix::unistd::{User, getuid};
use std::env;
use std::io::Write;
use std::path::PathBuf;

/// Execute `argv` if its first token names a builtin.
///
/// Returns `Ok(true)` when the command was handled. `Ok(false)` means the
/// name was not recognized, or a recognized builtin failed and the caller
/// may fall through. `exit` terminates the process and does not return.
pub fn dispatch(sh: &mut Shell, argv: &[String], out: &mut dyn Write) -> Result<bool> {
    let Some(name) = argv.first() else {
        return Ok(false);
    };
    match name.as_str() {
        "exit" => std::process::exit(0),
        "cd" => match change_dir(argv.get(1).map(String::as_str)) {
            Ok(()) => Ok(true),
            Err(err) => {
                eprintln!("cd: {err:#}");
                Ok(false)
            }
        },
        "pwd" => {
            let cwd = env::current_dir().context("pwd")?;
            writeln!(out, "{}", cwd.display())?;
            Ok(true)
        }
        "history" => {
            for (idx, line) in sh.history.iter().enumerate() {
                writeln!(out, "{}: {}", idx + 1, line)?;
            }
            Ok(true)
        }
        "jobs" => {
            sh.jobs.write_listing(out)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Change the working directory, defaulting to the user's home.
///
/// `$HOME` is tried first; when unset the home directory comes from the
/// passwd database. On failure the working directory is left unchanged.
fn change_dir(target: Option<&str>) -> Result<()> {
    let path = match target {
        Some(dir) => PathBuf::from(dir),
        None => home_dir()?,
    };
    env::set_current_dir(&path).with_context(|| format!("can't chdir to {}", path.display()))
}

fn home_dir() -> Result<PathBuf> {
    if let Ok(home) = env::var("HOME") {
        return Ok(PathBuf::from(home));
    }
    let user = User::from_uid(getuid())
        .context("passwd lookup failed")?
        .context("no passwd entry for the current user")?;
    Ok(user.dir)
}
