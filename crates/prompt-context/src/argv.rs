//! Shell-like argv parsing and formatting
//!
//! Default implementations behind the manager's `parse_argv` / `format_argv`
//! capabilities and the lazy-diff string payload. Splitting follows POSIX
//! shell rules via `shlex`; no expansion or globbing is performed.

/// Split a command line into arguments.
///
/// Unbalanced quotes do not fail: the line falls back to plain whitespace
/// splitting so a half-typed argument still reaches git and produces a
/// readable error there.
pub fn parse_argv(line: &str) -> Vec<String> {
    match shlex::split(line) {
        Some(args) => args,
        None => line.split_whitespace().map(str::to_string).collect(),
    }
}

/// Characters that never need quoting in a POSIX shell word
fn is_plain(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_./:@%+=,~^".contains(c)
}

/// Quote one argument for display.
///
/// Plain words pass through; anything else is wrapped in single quotes with
/// embedded single quotes written as `'\''`.
pub fn quote_arg(arg: &str) -> String {
    if !arg.is_empty() && arg.chars().all(is_plain) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', "'\\''"))
}

/// Join arguments into a line that `parse_argv` splits back into the same
/// arguments.
pub fn format_argv<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|a| quote_arg(a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whitespace_and_quotes() {
        assert_eq!(parse_argv("a b"), vec!["a", "b"]);
        assert_eq!(parse_argv("  HEAD~1  --stat "), vec!["HEAD~1", "--stat"]);
        assert_eq!(
            parse_argv(r#"--  "dir with space/file.rs" 'single quoted'"#),
            vec!["--", "dir with space/file.rs", "single quoted"]
        );
        assert_eq!(parse_argv(r"a\ b"), vec!["a b"]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_argv("").is_empty());
        assert!(parse_argv("   \t").is_empty());
    }

    #[test]
    fn test_parse_unbalanced_quote_falls_back() {
        assert_eq!(parse_argv("HEAD \"oops"), vec!["HEAD", "\"oops"]);
    }

    #[test]
    fn test_quote_arg() {
        assert_eq!(quote_arg("HEAD~1"), "HEAD~1");
        assert_eq!(quote_arg(""), "''");
        assert_eq!(quote_arg("it's"), "'it'\\''s'");
        assert_eq!(quote_arg("$(rm -rf /)"), "'$(rm -rf /)'");
    }

    #[test]
    fn test_format_quotes_only_when_needed() {
        assert_eq!(format_argv(&["HEAD~1"]), "HEAD~1");
        assert_eq!(format_argv(&["main", "--", "a b.rs"]), "main -- 'a b.rs'");
        let empty: [&str; 0] = [];
        assert_eq!(format_argv(&empty), "");
    }

    #[test]
    fn test_format_then_parse_preserves_arguments() {
        let args = vec!["--stat".to_string(), "it's here".to_string(), "$HOME".to_string()];
        assert_eq!(parse_argv(&format_argv(&args)), args);
    }
}
