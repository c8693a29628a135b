//! A tiny interactive shell built around POSIX job control.
//!
//! The interesting part of this crate is not parsing; the tokenizer is a
//! plain whitespace splitter. The work starts after a line names an
//! external program: process-group isolation, terminal-ownership handoff
//! between the shell and its foreground child, and polling-based tracking
//! of background jobs.
//!
//! The main entry point is [`Shell`], which owns the terminal, the job
//! table and the read loop. Line editing and history recall are delegated
//! to `rustyline`; the shell only records accepted lines for its `history`
//! builtin.

mod builtin;
mod external;
pub mod jobs;
mod lexer;
pub mod shell;

pub use shell::Shell;
