//! External editor capability
//!
//! The initial text goes to a temporary file, the configured editor runs on
//! it in the foreground, and the file is read back once the editor exits.

use prompt_context::argv::parse_argv;
use prompt_context::{ContextError, ContextResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

const CAPABILITY: &str = "openEditor";

#[derive(Debug, Clone)]
pub struct EditorCommand {
    argv: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl EditorCommand {
    /// `line` is tokenised like a shell command, e.g. `code --wait`
    pub fn new(line: &str) -> Self {
        Self {
            argv: parse_argv(line),
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Edit `initial`; `title` names the temporary file
    pub fn edit(&self, title: &str, initial: &str) -> ContextResult<String> {
        let Some((program, args)) = self.argv.split_first() else {
            return Err(ContextError::capability(CAPABILITY, "no editor configured"));
        };

        let mut file = tempfile::Builder::new()
            .prefix(&format!("pctx-{}-", file_stem(title)))
            .suffix(".md")
            .tempfile()?;
        file.write_all(initial.as_bytes())?;
        file.flush()?;

        let mut cmd = Command::new(program);
        cmd.args(args).arg(file.path());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        debug!(editor = %program, file = %file.path().display(), "opening editor");

        let status = cmd
            .status()
            .map_err(|e| ContextError::capability(CAPABILITY, format!("{}: {}", program, e)))?;
        if !status.success() {
            return Err(ContextError::capability(
                CAPABILITY,
                format!("{} exited with {}", program, status),
            ));
        }
        Ok(fs::read_to_string(file.path())?)
    }
}

/// Title reduced to characters safe in a file name
fn file_stem(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}
