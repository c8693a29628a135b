//! Background job bookkeeping.
//!
//! A [`Job`] is created the moment a background command is forked and lives
//! in the [`JobTable`] until a poll observes that its process has exited or
//! was killed by a signal. The table is only ever touched from the read
//! loop, so there is no locking here.

use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use std::io::{self, Write};

/// Lifecycle state of a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Done,
}

/// One background job record.
#[derive(Debug)]
pub struct Job {
    /// Sequential id, assigned at creation and never reused while the shell
    /// runs.
    pub id: usize,
    pub pid: Pid,
    /// The first argument token of the launched command.
    pub command: String,
    pub state: JobState,
}

/// The in-memory record of background jobs.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
    /// Count of jobs ever created; the next job gets `created + 1`.
    created: usize,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly forked background process and return its job id.
    pub fn add(&mut self, pid: Pid, command: String) -> usize {
        self.created += 1;
        let id = self.created;
        self.jobs.push(Job {
            id,
            pid,
            command,
            state: JobState::Running,
        });
        id
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    /// Write the `jobs` builtin listing, one line per record.
    pub fn write_listing(&self, out: &mut dyn Write) -> io::Result<()> {
        for job in &self.jobs {
            match job.state {
                JobState::Done => {
                    writeln!(out, "[{}] Done    {} &", job.id, job.command)?;
                }
                JobState::Running => {
                    writeln!(out, "[{}] {} Running {} &", job.id, job.pid, job.command)?;
                }
            }
        }
        Ok(())
    }

    /// Non-blocking sweep over all Running records.
    ///
    /// Each record whose process has exited or was signaled is reported as
    /// `[<id>] Done <command>` and removed. Removal happens in a second pass
    /// over a snapshot of indices so the table is never shifted while being
    /// iterated. Must only be called from the read loop.
    pub fn poll(&mut self, out: &mut dyn Write) -> io::Result<()> {
        let mut finished = Vec::new();
        for (idx, job) in self.jobs.iter_mut().enumerate() {
            match waitpid(job.pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => {
                    job.state = JobState::Done;
                    finished.push(idx);
                }
                Ok(_) => {}
                // The pid is no longer a waitable child; drop the stale
                // record so it cannot be polled again.
                Err(_) => {
                    job.state = JobState::Done;
                    finished.push(idx);
                }
            }
        }
        for &idx in &finished {
            let job = &self.jobs[idx];
            writeln!(out, "[{}] Done {}", job.id, job.command)?;
        }
        for idx in finished.into_iter().rev() {
            self.jobs.remove(idx);
        }
        Ok(())
    }
}
