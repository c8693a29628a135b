//! The job control engine: launching external programs.
//!
//! A foreground child gets its own process group, ownership of the
//! controlling terminal and default signal dispositions before `execvp`;
//! the shell then blocks until the child stops or terminates and reclaims
//! the terminal afterwards. A background child stays in the shell's own
//! process group with inherited dispositions and is only tracked in the job
//! table.

use crate::shell::{JOB_CONTROL_SIGNALS, Shell};
use anyhow::{Context, Result};
use nix::sys::signal::{SigHandler, signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, execvp, fork, getpid, setpgid, tcsetpgrp};
use std::ffi::CString;

/// Fork and exec `argv`, foreground or background.
///
/// Returns `Ok(false)` without spawning anything when `argv` is empty. On
/// fork failure the job table is left untouched and the error is returned
/// for the read loop to report.
pub fn launch(sh: &mut Shell, argv: &[String], background: bool) -> Result<bool> {
    if argv.is_empty() {
        return Ok(false);
    }
    let args: Vec<CString> = argv
        .iter()
        .map(|arg| CString::new(arg.as_str()))
        .collect::<std::result::Result<_, _>>()
        .context("argument contains an interior nul byte")?;

    // Safety: the child only calls async-signal-safe-adjacent setup and then
    // execs or exits; it never returns into the shell's control flow.
    match unsafe { fork() }.context("fork")? {
        ForkResult::Child => run_child(sh, &args, background),
        ForkResult::Parent { child } => {
            if background {
                let id = sh.jobs.add(child, argv[0].clone());
                println!("[{id}] {child} {}", argv[0]);
            } else {
                wait_foreground(sh, child)?;
            }
            Ok(true)
        }
    }
}

/// Child-side setup and image replacement. Never returns.
fn run_child(sh: &Shell, args: &[CString], background: bool) -> ! {
    if sh.is_interactive && !background {
        let pid = getpid();
        // New process group seeded by our own pid, then take the terminal.
        // Failures here are reported but not fatal; exec may still succeed.
        if let Err(err) = setpgid(pid, pid) {
            eprintln!("jsh: setpgid: {err}");
        }
        if let Err(err) = tcsetpgrp(&sh.terminal, pid) {
            eprintln!("jsh: tcsetpgrp: {err}");
        }
        // The shell ignores these while idle; the child must not inherit
        // that.
        for sig in JOB_CONTROL_SIGNALS {
            let _ = unsafe { signal(sig, SigHandler::SigDfl) };
        }
    }

    let err = execvp(&args[0], args).unwrap_err();
    eprintln!("jsh: {}: {err}", args[0].to_string_lossy());
    std::process::exit(127)
}

/// Block on the foreground child until it terminates.
///
/// A stop returns the terminal to the shell right away so the prompt stays
/// usable, but the wait keeps going until the child exits or is killed by a
/// signal. On termination the terminal is reclaimed and the saved modes are
/// re-applied.
fn wait_foreground(sh: &mut Shell, child: Pid) -> Result<()> {
    loop {
        match waitpid(child, Some(WaitPidFlag::WUNTRACED)) {
            Ok(WaitStatus::Stopped(..)) => sh.reclaim_terminal()?,
            Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => break,
            Ok(_) => {}
            Err(nix::errno::Errno::ECHILD) => break,
            Err(err) => return Err(err).context("waitpid"),
        }
    }
    sh.reclaim_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobState;
    use std::thread::sleep;
    use std::time::Duration;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_argv_spawns_nothing() {
        let mut sh = Shell::with_interactivity(false).unwrap();
        let handled = launch(&mut sh, &[], false).unwrap();
        assert!(!handled);
        assert!(sh.jobs.is_empty());
    }

    #[test]
    fn test_foreground_launch_waits_and_records_no_job() {
        let mut sh = Shell::with_interactivity(false).unwrap();
        let handled = launch(&mut sh, &argv(&["true"]), false).unwrap();
        assert!(handled);
        assert!(sh.jobs.is_empty());
    }

    #[test]
    fn test_foreground_exec_failure_stays_in_child() {
        let mut sh = Shell::with_interactivity(false).unwrap();
        // The exec fails inside the child; the shell only observes a normal
        // foreground termination.
        let handled = launch(&mut sh, &argv(&["jsh-no-such-program"]), false).unwrap();
        assert!(handled);
        assert!(sh.jobs.is_empty());
    }

    #[test]
    fn test_two_background_launches_get_distinct_jobs() {
        let mut sh = Shell::with_interactivity(false).unwrap();
        assert!(launch(&mut sh, &argv(&["sleep", "30"]), true).unwrap());
        assert!(launch(&mut sh, &argv(&["sleep", "30"]), true).unwrap());
        assert_eq!(sh.jobs.len(), 2);

        let jobs: Vec<_> = sh.jobs.iter().collect();
        assert_eq!(jobs[0].id, 1);
        assert_eq!(jobs[1].id, 2);
        assert_ne!(jobs[0].pid, jobs[1].pid);
        assert!(jobs.iter().all(|j| j.state == JobState::Running));
        assert!(jobs.iter().all(|j| j.command == "sleep"));

        let pids: Vec<Pid> = jobs.iter().map(|j| j.pid).collect();
        for pid in pids {
            nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL).unwrap();
        }
        let mut out = Vec::new();
        for _ in 0..50 {
            sh.jobs.poll(&mut out).unwrap();
            if sh.jobs.is_empty() {
                break;
            }
            sleep(Duration::from_millis(20));
        }
        assert!(sh.jobs.is_empty());
    }

    #[test]
    fn test_background_job_reported_done_after_exit() {
        let mut sh = Shell::with_interactivity(false).unwrap();
        assert!(launch(&mut sh, &argv(&["true"]), true).unwrap());
        assert_eq!(sh.jobs.len(), 1);

        let mut out = Vec::new();
        for _ in 0..50 {
            sh.jobs.poll(&mut out).unwrap();
            if sh.jobs.is_empty() {
                break;
            }
            sleep(Duration::from_millis(20));
        }
        assert!(sh.jobs.is_empty());
        assert_eq!(String::from_utf8(out).unwrap(), "[1] Done true\n");

        // A later `jobs` listing no longer mentions it.
        let mut listing = Vec::new();
        sh.jobs.write_listing(&mut listing).unwrap();
        assert!(listing.is_empty());
    }

    #[test]
    fn test_foreground_stop_then_continue_is_not_termination() {
        let mut sh = Shell::with_interactivity(false).unwrap();

        // The child publishes its pid, stops itself, and exits once it is
        // continued. A helper thread keeps sending SIGCONT so the wait loop
        // is guaranteed to observe a stop followed by a normal exit.
        let pid_file = std::env::temp_dir().join(format!("jsh_test_stop_{}", std::process::id()));
        let _ = std::fs::remove_file(&pid_file);
        let script = format!(
            "echo $$ > {} && kill -s STOP $$; exit 0",
            pid_file.display()
        );

        let waker = {
            let pid_file = pid_file.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    sleep(Duration::from_millis(20));
                    let Ok(text) = std::fs::read_to_string(&pid_file) else {
                        continue;
                    };
                    let Ok(raw) = text.trim().parse::<i32>() else {
                        continue;
                    };
                    let child = Pid::from_raw(raw);
                    if nix::sys::signal::kill(child, nix::sys::signal::Signal::SIGCONT).is_err() {
                        // The child has been reaped; nothing left to wake.
                        break;
                    }
                }
            })
        };

        let handled = launch(&mut sh, &argv(&["sh", "-c", &script]), false).unwrap();
        assert!(handled);
        assert!(sh.jobs.is_empty());

        waker.join().unwrap();
        let _ = std::fs::remove_file(&pid_file);
    }

    #[test]
    fn test_interior_nul_is_rejected_without_fork() {
        let mut sh = Shell::with_interactivity(false).unwrap();
        let bad = vec!["ec\0ho".to_string()];
        assert!(launch(&mut sh, &bad, false).is_err());
        assert!(sh.jobs.is_empty());
    }
}
