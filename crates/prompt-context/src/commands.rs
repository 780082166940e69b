//! Command table
//!
//! A table maps command names to a description and a handler. Tables are
//! plain values: a host clones a [`Command`], wraps its handler, and inserts
//! the wrapper under the same name without touching any other command or
//! any other table.

use crate::error::{ContextError, ContextResult};
use crate::item::{ContextItem, ItemKind};
use crate::manager::ContextManager;
use crate::payload::coerce_payload;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// Names of the built-in commands, in help order
pub const BUILTIN_COMMANDS: [&str; 8] = ["add", "diff", "note", "list", "edit", "remove", "show", "copy"];

/// Longest note preview shown by `list`
const NOTE_PREVIEW_CHARS: usize = 60;

/// Handler invoked with the raw argument vector (command name excluded)
pub type CommandHandler = Rc<dyn Fn(&[String]) -> ContextResult<()>>;

/// One named command
#[derive(Clone)]
pub struct Command {
    pub description: String,
    pub usage: String,
    pub handler: CommandHandler,
}

impl Command {
    pub fn new(
        description: impl Into<String>,
        usage: impl Into<String>,
        handler: impl Fn(&[String]) -> ContextResult<()> + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            usage: usage.into(),
            handler: Rc::new(handler),
        }
    }

    pub fn run(&self, args: &[String]) -> ContextResult<()> {
        (self.handler)(args)
    }

    /// Same description and usage, different handler
    pub fn with_handler(&self, handler: impl Fn(&[String]) -> ContextResult<()> + 'static) -> Self {
        Self {
            description: self.description.clone(),
            usage: self.usage.clone(),
            handler: Rc::new(handler),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("description", &self.description)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}

/// Insertion-ordered name to command mapping
#[derive(Clone, Default, Debug)]
pub struct CommandTable {
    entries: Vec<(String, Command)>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Add or replace `name`, returning the previous command. Replacing
    /// keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, command: Command) -> Option<Command> {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, command)),
            None => {
                self.entries.push((name, command));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Command> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Command)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run `name` with `args`
    pub fn dispatch(&self, name: &str, args: &[String]) -> ContextResult<()> {
        let command = self.get(name).ok_or_else(|| ContextError::UnknownCommand {
            name: name.to_string(),
        })?;
        command.run(args)
    }

    /// Run a tokenised line: first word is the command name. Blank lines
    /// are a no-op.
    pub fn dispatch_line(&self, argv: &[String]) -> ContextResult<()> {
        match argv.split_first() {
            Some((name, args)) => self.dispatch(name, args),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Built-in commands
// ============================================================================

pub(crate) fn builtin_commands(manager: &ContextManager) -> CommandTable {
    let mut table = CommandTable::new();
    let bind = |f: fn(&ContextManager, &[String]) -> ContextResult<()>| {
        let manager = manager.clone();
        move |args: &[String]| f(&manager, args)
    };

    table.insert(
        "add",
        Command::new("Add files or directories to the context", "add <path> [path ...]", bind(add)),
    );
    table.insert(
        "diff",
        Command::new(
            "Add a git diff, computed when the prompt is built",
            "diff [git-diff-args ...]",
            bind(diff),
        ),
    );
    table.insert(
        "note",
        Command::new(
            "Add a note (opens the editor when no text is given)",
            "note [text ...]",
            bind(note),
        ),
    );
    table.insert("list", Command::new("List context items", "list", bind(list)));
    table.insert("edit", Command::new("Edit a context item by id", "edit <id>", bind(edit)));
    table.insert(
        "remove",
        Command::new("Remove context items by id", "remove <id> [id ...]", bind(remove)),
    );
    table.insert("show", Command::new("Show the assembled prompt", "show", bind(show)));
    table.insert(
        "copy",
        Command::new("Copy the assembled prompt to the clipboard", "copy", bind(copy)),
    );
    table
}

fn parse_id(raw: &str) -> ContextResult<u64> {
    raw.trim().parse().map_err(|_| ContextError::InvalidId {
        raw: raw.to_string(),
    })
}

fn add(manager: &ContextManager, args: &[String]) -> ContextResult<()> {
    if args.is_empty() {
        return Err(ContextError::usage("add <path> [path ...]"));
    }
    let paths = manager.paths()?;
    for path in args {
        if let Err(e) = paths.add_path(path) {
            manager.print(&format!("Error: {}", e));
            continue;
        }
        let tracked = manager
            .get_items()?
            .into_iter()
            .find(|item| item.kind == ItemKind::File && item.label() == Some(path.as_str()));
        match tracked {
            Some(item) => manager.print(&format!("Refreshed file: {} [{}]", path, item.id)),
            None => {
                manager.add_item(ItemKind::File, path.as_str(), None)?;
                manager.print(&format!("Added file: {}", path));
            }
        }
    }
    Ok(())
}

fn diff(manager: &ContextManager, args: &[String]) -> ContextResult<()> {
    if args.is_empty() {
        manager.add_item(ItemKind::LazyDiff, "", None)?;
        manager.print("Added diff: git diff (default)");
        return Ok(());
    }
    let label = format!("git diff {}", manager.format_argv(args));
    let payload = Value::Array(args.iter().cloned().map(Value::String).collect());
    manager.add_item(ItemKind::LazyDiff, label.as_str(), Some(payload))?;
    manager.print(&format!("Added diff: {}", label));
    Ok(())
}

fn note(manager: &ContextManager, args: &[String]) -> ContextResult<()> {
    let text = if args.is_empty() {
        manager.open_editor("note", "")?
    } else {
        args.join(" ")
    };
    if text.trim().is_empty() {
        manager.print("Note discarded");
        return Ok(());
    }
    let id = manager.add_item(ItemKind::Note, "", Some(Value::String(text)))?;
    manager.print(&format!("Added note [{}]", id));
    Ok(())
}

fn list(manager: &ContextManager, _args: &[String]) -> ContextResult<()> {
    let items = manager.get_items()?;
    if items.is_empty() {
        manager.print("No context items.");
        return Ok(());
    }
    for item in &items {
        manager.print(&describe(manager, item));
    }
    Ok(())
}

fn describe(manager: &ContextManager, item: &ContextItem) -> String {
    let mut line = format!("[{}] [{}] {}", item.id, item.kind, item.display_label());
    match item.kind {
        ItemKind::File if !manager.file_exists(item.display_label()) => line.push_str(" (missing)"),
        ItemKind::Note => {
            let text = item.payload_text();
            let first = text.lines().next().unwrap_or_default();
            let mut preview: String = first.chars().take(NOTE_PREVIEW_CHARS).collect();
            if preview.len() < first.len() || text.lines().nth(1).is_some() {
                preview.push_str("...");
            }
            if !preview.is_empty() {
                line.push_str(": ");
                line.push_str(&preview);
            }
        }
        _ => {}
    }
    line
}

fn edit(manager: &ContextManager, args: &[String]) -> ContextResult<()> {
    let [raw] = args else {
        return Err(ContextError::usage("edit <id>"));
    };
    let mut item = manager.find_item(parse_id(raw)?)?;
    let title = format!("{} {}", item.kind, item.id);

    match item.kind {
        ItemKind::Note | ItemKind::Diff | ItemKind::DiffError => {
            let edited = manager.open_editor(&title, &item.payload_text())?;
            item.payload = Some(Value::String(edited));
        }
        ItemKind::LazyDiff => {
            let current = match coerce_payload(item.payload.as_ref()) {
                Ok(Some(args)) => manager.format_argv(&args),
                Ok(None) => String::new(),
                Err(_) => item.payload_text(),
            };
            let args = manager.parse_argv(&manager.open_editor(&title, &current)?);
            if args.is_empty() {
                item.payload = None;
                item.label = None;
            } else {
                item.label = Some(format!("git diff {}", manager.format_argv(&args)));
                item.payload = Some(Value::Array(args.into_iter().map(Value::String).collect()));
            }
        }
        ref other => {
            return Err(ContextError::usage(format!(
                "edit supports note, diff and lazy-diff items, not {}",
                other
            )))
        }
    }

    let id = item.id;
    manager.replace_item(item)?;
    manager.print(&format!("Updated [{}]", id));
    Ok(())
}

fn remove(manager: &ContextManager, args: &[String]) -> ContextResult<()> {
    if args.is_empty() {
        return Err(ContextError::usage("remove <id> [id ...]"));
    }
    // resolve every id before touching the collection
    let ids = args.iter().map(|raw| parse_id(raw)).collect::<ContextResult<Vec<_>>>()?;
    let targets = ids
        .into_iter()
        .map(|id| manager.find_item(id))
        .collect::<ContextResult<Vec<_>>>()?;

    for item in targets {
        if item.kind == ItemKind::File {
            if let Err(e) = manager.paths()?.remove_path(item.display_label()) {
                manager.print(&format!("Error: {}", e));
                continue;
            }
        }
        manager.remove_item(item.id)?;
        manager.print(&format!("Removed [{}]", item.id));
    }
    Ok(())
}

fn show(manager: &ContextManager, _args: &[String]) -> ContextResult<()> {
    let prompt = manager.build_prompt()?;
    manager.print(&prompt);
    Ok(())
}

fn copy(manager: &ContextManager, _args: &[String]) -> ContextResult<()> {
    let prompt = manager.build_prompt()?;
    manager.clipboard_copy(&prompt)?;
    manager.print("Copied prompt");
    Ok(())
}
