//! Interactive command loop
//!
//! Reads one command per line, tokenises it with the manager's argv parser
//! and dispatches through the command table. `help` is added to the table;
//! `exit` and `quit` end the loop, as does end of input.

use crate::host::CancelSlot;
use anyhow::{Context, Result};
use prompt_context::{Command, CommandTable, ContextManager};
use std::io::{BufRead, Write};
use tracing::debug;

const PROMPT: &str = "pctx> ";
const EXIT_COMMANDS: [&str; 2] = ["exit", "quit"];

/// The manager's table plus host-only commands
pub fn host_commands(manager: &ContextManager) -> CommandTable {
    let mut table = manager.commands();
    let mut lines: Vec<String> = table
        .iter()
        .map(|(_, command)| format!("  {:<24} {}", command.usage, command.description))
        .collect();
    lines.push(format!("  {:<24} {}", "help", "Show this help"));
    lines.push(format!("  {:<24} {}", "exit | quit", "Leave pctx"));
    let help = lines.join("\n");

    let printer = manager.clone();
    table.insert(
        "help",
        Command::new("Show this help", "help", move |_| {
            printer.print(&help);
            Ok(())
        }),
    );
    table
}

pub struct Repl<'a> {
    manager: &'a ContextManager,
    commands: CommandTable,
    cancel: CancelSlot,
}

impl<'a> Repl<'a> {
    pub fn new(manager: &'a ContextManager, cancel: CancelSlot) -> Self {
        Self {
            manager,
            commands: host_commands(manager),
            cancel,
        }
    }

    /// Run until `exit`, `quit` or end of input. `prompt` receives the
    /// prompt string before every read.
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, mut prompt: W) -> Result<()> {
        let mut line = String::new();
        loop {
            prompt.write_all(PROMPT.as_bytes())?;
            prompt.flush()?;

            line.clear();
            let read = input.read_line(&mut line).context("Failed to read command")?;
            if read == 0 {
                break;
            }
            if !self.execute(&line) {
                break;
            }
        }
        Ok(())
    }

    /// Run one line. Returns `false` when the line asks to leave.
    pub fn execute(&self, line: &str) -> bool {
        let argv = self.manager.parse_argv(line);
        let Some(name) = argv.first() else {
            return true;
        };
        if EXIT_COMMANDS.contains(&name.as_str()) {
            return false;
        }

        self.manager.set_cancellation(self.cancel.current());
        debug!(command = %name, "dispatching");
        if let Err(e) = self.commands.dispatch_line(&argv) {
            self.manager.print(&format!("Error: {}", e));
        }
        true
    }
}
