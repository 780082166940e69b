//! Clipboard capability: pipe the prompt into a configured command such as
//! `pbcopy` or `xclip -selection clipboard`.

use prompt_context::argv::parse_argv;
use prompt_context::{ContextError, ContextResult};
use std::io::Write;
use std::process::{Command, Stdio};

const CAPABILITY: &str = "clipboardCopy";

#[derive(Debug, Clone)]
pub struct ClipboardCommand {
    argv: Vec<String>,
}

impl ClipboardCommand {
    pub fn new(line: &str) -> Self {
        Self {
            argv: parse_argv(line),
        }
    }

    pub fn copy(&self, text: &str) -> ContextResult<()> {
        let Some((program, args)) = self.argv.split_first() else {
            return Err(ContextError::capability(CAPABILITY, "no clipboard command configured"));
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| ContextError::capability(CAPABILITY, format!("{}: {}", program, e)))?;

        // stdin is closed before waiting so the command sees end of input
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(text.as_bytes()),
            None => Ok(()),
        };
        let status = child
            .wait()
            .map_err(|e| ContextError::capability(CAPABILITY, format!("{}: {}", program, e)))?;
        if !status.success() {
            return Err(ContextError::capability(
                CAPABILITY,
                format!("{} exited with {}", program, status),
            ));
        }
        written.map_err(|e| {
            ContextError::capability(CAPABILITY, format!("{}: writing input failed: {}", program, e))
        })
    }
}
