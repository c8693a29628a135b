//! Tokenization of a command line into an argument vector.
//!
//! The splitter is deliberately dumb: it breaks on runs of space, tab and
//! newline, with no quoting, escaping or glob expansion. The trailing `&`
//! background marker is the only other piece of line syntax the shell
//! understands, and it is also recognized here so the read loop never has
//! to look at raw line text itself.

use nix::unistd::{SysconfVar, sysconf};

/// Used when `sysconf(_SC_ARG_MAX)` is unavailable on the platform.
const FALLBACK_ARG_MAX: usize = 4096;

fn arg_limit() -> usize {
    match sysconf(SysconfVar::ARG_MAX) {
        Ok(Some(n)) if n > 0 => n as usize,
        _ => FALLBACK_ARG_MAX,
    }
}

/// Split a line (already trimmed by the caller) into owned argument tokens.
///
/// An empty line yields an empty vector. The number of tokens is capped at
/// the platform's argument-length limit; anything beyond is dropped.
pub fn tokenize(line: &str) -> Vec<String> {
    line.split([' ', '\t', '\n'])
        .filter(|tok| !tok.is_empty())
        .take(arg_limit())
        .map(str::to_owned)
        .collect()
}

/// Detect and strip a trailing `&`.
///
/// Returns the line without the marker (re-trimmed on the right) and whether
/// the command should run in the background.
pub fn strip_background_marker(line: &str) -> (&str, bool) {
    match line.strip_suffix('&') {
        Some(rest) => (rest.trim_end(), true),
        None => (line, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_splits_on_whitespace_runs() {
        assert_eq!(tokenize("ls   -a"), vec!["ls", "-a"]);
    }

    #[test]
    fn test_tokenize_handles_tabs_and_newlines() {
        assert_eq!(tokenize("grep\t-rn\ntodo"), vec!["grep", "-rn", "todo"]);
    }

    #[test]
    fn test_tokenize_empty_line_yields_no_tokens() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_tokenize_whitespace_only_yields_no_tokens() {
        assert!(tokenize(" \t ").is_empty());
    }

    #[test]
    fn test_background_marker_is_stripped() {
        assert_eq!(strip_background_marker("sleep 10 &"), ("sleep 10", true));
    }

    #[test]
    fn test_background_marker_without_space() {
        assert_eq!(strip_background_marker("sleep 10&"), ("sleep 10", true));
    }

    #[test]
    fn test_no_background_marker() {
        assert_eq!(strip_background_marker("ls -a"), ("ls -a", false));
    }

    #[test]
    fn test_arg_limit_is_positive() {
        assert!(arg_limit() > 0);
    }
}
