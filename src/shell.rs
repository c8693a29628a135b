//! Shell context and the interactive read loop.
//!
//! [`Shell`] owns everything with process-wide lifetime: the controlling
//! terminal handle, the shell's own process-group id, the saved terminal
//! modes, the prompt and the job table. It is constructed once before the
//! loop starts and every operation that needs shared state receives it by
//! reference.

use crate::jobs::JobTable;
use crate::{builtin, external, lexer};
use anyhow::{Context, Result};
use nix::sys::signal::{SigHandler, Signal, kill, signal};
use nix::sys::termios::{SetArg, Termios, tcgetattr, tcsetattr};
use nix::unistd::{Pid, getpgrp, getpid, setpgid, tcgetpgrp, tcsetpgrp};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, IsTerminal, Write};

/// Environment variable consulted for the prompt text.
const PROMPT_ENV: &str = "MY_PROMPT";
const DEFAULT_PROMPT: &str = "shell>";

/// Dispositions the shell ignores while idle and a foreground child resets
/// to default.
pub(crate) const JOB_CONTROL_SIGNALS: [Signal; 5] = [
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
];

/// Load the prompt from the given environment variable, falling back to
/// `"shell>"` when it is unset.
pub fn prompt_from_env(var: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| DEFAULT_PROMPT.to_string())
}

/// The single, process-wide shell context.
pub struct Shell {
    /// The controlling terminal (standard input).
    pub(crate) terminal: io::Stdin,
    pub(crate) is_interactive: bool,
    /// Process group the shell itself occupies.
    pub(crate) pgid: Pid,
    /// Terminal attribute snapshot taken at startup, re-applied after every
    /// foreground job.
    pub(crate) tmodes: Option<Termios>,
    prompt: String,
    pub(crate) jobs: JobTable,
    /// Accepted input lines, in order, for the `history` builtin.
    pub(crate) history: Vec<String>,
}

impl Shell {
    /// Build the context and, when stdin is a terminal, take control of it:
    /// wait until the shell is in the foreground, ignore the job-control
    /// signals, move into an own process group and snapshot the terminal
    /// modes.
    pub fn new() -> Result<Self> {
        Self::with_interactivity(io::stdin().is_terminal())
    }

    /// Build the context with a forced interactivity flag.
    ///
    /// Tests use this with `false` so that constructing a shell never
    /// changes signal dispositions, process groups or terminal ownership of
    /// the process running them.
    pub(crate) fn with_interactivity(is_interactive: bool) -> Result<Self> {
        let mut shell = Shell {
            terminal: io::stdin(),
            is_interactive,
            pgid: getpgrp(),
            tmodes: None,
            prompt: prompt_from_env(PROMPT_ENV),
            jobs: JobTable::new(),
            history: Vec::new(),
        };
        if shell.is_interactive {
            shell.grab_terminal()?;
        }
        Ok(shell)
    }

    fn grab_terminal(&mut self) -> Result<()> {
        // Loop until the terminal driver agrees we are the foreground
        // process group. A debugger holding the terminal keeps us here.
        loop {
            let foreground =
                tcgetpgrp(&self.terminal).context("can't read the foreground process group")?;
            self.pgid = getpgrp();
            if foreground == self.pgid {
                break;
            }
            kill(self.pgid, Signal::SIGTTIN).context("SIGTTIN")?;
        }

        for sig in JOB_CONTROL_SIGNALS {
            unsafe { signal(sig, SigHandler::SigIgn) }
                .with_context(|| format!("can't ignore {sig}"))?;
        }

        let pid = getpid();
        setpgid(pid, pid).context("couldn't put the shell in its own process group")?;
        self.pgid = pid;
        tcsetpgrp(&self.terminal, pid).context("can't take terminal ownership")?;
        self.tmodes = Some(tcgetattr(&self.terminal).context("can't read terminal modes")?);
        Ok(())
    }

    /// Return terminal ownership to the shell's own process group and
    /// re-apply the saved terminal modes, undoing whatever a child left
    /// behind. No-op when not interactive.
    pub(crate) fn reclaim_terminal(&self) -> Result<()> {
        if !self.is_interactive {
            return Ok(());
        }
        tcsetpgrp(&self.terminal, self.pgid).context("can't reclaim terminal ownership")?;
        if let Some(tmodes) = &self.tmodes {
            tcsetattr(&self.terminal, SetArg::TCSADRAIN, tmodes)
                .context("can't restore terminal modes")?;
        }
        Ok(())
    }

    /// The interactive read loop.
    ///
    /// Each iteration: read one line, record it, dispatch it to a builtin or
    /// to the job control engine, then poll the job table once. Ends on EOF.
    pub fn repl(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new()?;
        let mut out = io::stdout();
        loop {
            match editor.readline(&self.prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        editor.add_history_entry(line)?;
                        self.history.push(line.to_string());
                        self.interpret(line, &mut out);
                    }
                    self.jobs.poll(&mut out)?;
                    out.flush()?;
                }
                // The shell itself ignores SIGINT; just draw a new prompt.
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Run one non-empty, trimmed line: builtins first, otherwise hand the
    /// argument vector to the job control engine. Failures are reported once
    /// and the loop continues.
    fn interpret(&mut self, line: &str, out: &mut dyn Write) {
        let (line, background) = lexer::strip_background_marker(line);
        let argv = lexer::tokenize(line);
        if argv.is_empty() {
            return;
        }
        let handled = match builtin::dispatch(self, &argv, out) {
            Ok(handled) => handled,
            Err(err) => {
                eprintln!("jsh: {err:#}");
                true
            }
        };
        if !handled {
            if let Err(err) = external::launch(self, &argv, background) {
                eprintln!("jsh: {err:#}");
            }
        }
    }
}
