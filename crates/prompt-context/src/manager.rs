//! Context manager
//!
//! Owns the item collection's life cycle through host-supplied accessors and
//! exposes the host capabilities (editor, clipboard, argv helpers, path
//! context) that command handlers call back into. The manager itself is a
//! cheap `Rc` handle; command tables capture clones of it.
//!
//! Everything here is single-threaded. The host serialises access to the
//! collection.

use crate::argv;
use crate::commands::{builtin_commands, CommandTable};
use crate::diff::{DiffRunner, GitDiffRunner};
use crate::error::{ContextError, ContextResult};
use crate::item::{self, ContextItem, ItemKind};
use crate::render::{ArchiveSource, ContextRenderer};
use serde_json::Value;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Host-side file context consumed by `add` / `remove` and the default
/// prompt's archive block.
pub trait PathContext {
    fn add_path(&self, path: &str) -> ContextResult<()>;
    fn remove_path(&self, path: &str) -> ContextResult<()>;
    fn to_txtar(&self) -> ContextResult<String>;
}

type GetItemsFn = Box<dyn Fn() -> Vec<ContextItem>>;
type SetItemsFn = Box<dyn Fn(Vec<ContextItem>)>;
type BuildPromptFn = Box<dyn Fn(&ContextManager) -> ContextResult<String>>;
type OpenEditorFn = Box<dyn Fn(&str, &str) -> ContextResult<String>>;
type ClipboardFn = Box<dyn Fn(&str) -> ContextResult<()>>;
type FileExistsFn = Box<dyn Fn(&str) -> bool>;
type FormatArgvFn = Box<dyn Fn(&[String]) -> String>;
type ParseArgvFn = Box<dyn Fn(&str) -> Vec<String>>;
type NextIdFn = Box<dyn Fn(&[ContextItem]) -> u64>;
type OutputFn = Box<dyn Fn(&str)>;

/// Capabilities supplied by the host.
///
/// Only `get_items` and `set_items` are required, and their absence is
/// reported when first used rather than here.
#[derive(Default)]
pub struct Environment {
    get_items: Option<GetItemsFn>,
    set_items: Option<SetItemsFn>,
    build_prompt: Option<BuildPromptFn>,
    open_editor: Option<OpenEditorFn>,
    clipboard_copy: Option<ClipboardFn>,
    file_exists: Option<FileExistsFn>,
    format_argv: Option<FormatArgvFn>,
    parse_argv: Option<ParseArgvFn>,
    next_integer_id: Option<NextIdFn>,
    output: Option<OutputFn>,
    paths: Option<Rc<dyn PathContext>>,
    diff_runner: Option<Rc<dyn DiffRunner>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_get_items(mut self, f: impl Fn() -> Vec<ContextItem> + 'static) -> Self {
        self.get_items = Some(Box::new(f));
        self
    }

    pub fn with_set_items(mut self, f: impl Fn(Vec<ContextItem>) + 'static) -> Self {
        self.set_items = Some(Box::new(f));
        self
    }

    /// Back both accessors with one shared vector
    pub fn with_shared_items(self, store: Rc<RefCell<Vec<ContextItem>>>) -> Self {
        let reader = Rc::clone(&store);
        self.with_get_items(move || reader.borrow().clone())
            .with_set_items(move |items| *store.borrow_mut() = items)
    }

    pub fn with_build_prompt(
        mut self,
        f: impl Fn(&ContextManager) -> ContextResult<String> + 'static,
    ) -> Self {
        self.build_prompt = Some(Box::new(f));
        self
    }

    /// `f(title_hint, initial_text)` returns the edited text
    pub fn with_editor(mut self, f: impl Fn(&str, &str) -> ContextResult<String> + 'static) -> Self {
        self.open_editor = Some(Box::new(f));
        self
    }

    pub fn with_clipboard(mut self, f: impl Fn(&str) -> ContextResult<()> + 'static) -> Self {
        self.clipboard_copy = Some(Box::new(f));
        self
    }

    pub fn with_file_exists(mut self, f: impl Fn(&str) -> bool + 'static) -> Self {
        self.file_exists = Some(Box::new(f));
        self
    }

    pub fn with_format_argv(mut self, f: impl Fn(&[String]) -> String + 'static) -> Self {
        self.format_argv = Some(Box::new(f));
        self
    }

    pub fn with_parse_argv(mut self, f: impl Fn(&str) -> Vec<String> + 'static) -> Self {
        self.parse_argv = Some(Box::new(f));
        self
    }

    /// Replace the default max-plus-one id allocator
    pub fn with_next_integer_id(mut self, f: impl Fn(&[ContextItem]) -> u64 + 'static) -> Self {
        self.next_integer_id = Some(Box::new(f));
        self
    }

    /// Where command handlers print; stdout when unset
    pub fn with_output(mut self, f: impl Fn(&str) + 'static) -> Self {
        self.output = Some(Box::new(f));
        self
    }

    pub fn with_paths(mut self, paths: Rc<dyn PathContext>) -> Self {
        self.paths = Some(paths);
        self
    }

    /// Runner for lazy diffs in the default prompt; git in the current
    /// directory when unset
    pub fn with_diff_runner(mut self, runner: Rc<dyn DiffRunner>) -> Self {
        self.diff_runner = Some(runner);
        self
    }
}

struct Inner {
    env: Environment,
    diff_runner: Rc<dyn DiffRunner>,
    cancel: RefCell<CancellationToken>,
}

/// Item store plus host capabilities. Clones share state.
#[derive(Clone)]
pub struct ContextManager {
    inner: Rc<Inner>,
}

impl ContextManager {
    pub fn new(mut env: Environment) -> Self {
        let diff_runner = env
            .diff_runner
            .take()
            .unwrap_or_else(|| Rc::new(GitDiffRunner::new()));
        Self {
            inner: Rc::new(Inner {
                env,
                diff_runner,
                cancel: RefCell::new(CancellationToken::new()),
            }),
        }
    }

    fn env(&self) -> &Environment {
        &self.inner.env
    }

    // ------------------------------------------------------------------------
    // Item store
    // ------------------------------------------------------------------------

    pub fn get_items(&self) -> ContextResult<Vec<ContextItem>> {
        let get = self
            .env()
            .get_items
            .as_ref()
            .ok_or_else(|| ContextError::configuration("getItems"))?;
        Ok(get())
    }

    pub fn set_items(&self, items: Vec<ContextItem>) -> ContextResult<()> {
        let set = self
            .env()
            .set_items
            .as_ref()
            .ok_or_else(|| ContextError::configuration("setItems"))?;
        set(items);
        Ok(())
    }

    /// Id the next added item will receive for `list`
    pub fn next_integer_id(&self, list: &[ContextItem]) -> u64 {
        match &self.env().next_integer_id {
            Some(allocate) => allocate(list),
            None => item::next_integer_id(list),
        }
    }

    /// Append a new item and persist the collection. Returns the new id.
    pub fn add_item(
        &self,
        kind: impl Into<ItemKind>,
        label: impl Into<String>,
        payload: Option<Value>,
    ) -> ContextResult<u64> {
        let mut items = self.get_items()?;
        let id = self.next_integer_id(&items);
        let label: String = label.into();
        let item = ContextItem::new(id, kind, (!label.is_empty()).then_some(label), payload);
        info!(id, kind = %item.kind, label = item.display_label(), "context item added");
        items.push(item);
        self.set_items(items)?;
        Ok(id)
    }

    pub fn find_item(&self, id: u64) -> ContextResult<ContextItem> {
        self.get_items()?
            .into_iter()
            .find(|item| item.id == id)
            .ok_or(ContextError::ItemNotFound { id })
    }

    /// Drop the item with `id`; other ids are untouched
    pub fn remove_item(&self, id: u64) -> ContextResult<ContextItem> {
        let mut items = self.get_items()?;
        let index = items
            .iter()
            .position(|item| item.id == id)
            .ok_or(ContextError::ItemNotFound { id })?;
        let removed = items.remove(index);
        self.set_items(items)?;
        info!(id, kind = %removed.kind, "context item removed");
        Ok(removed)
    }

    /// Replace the item with the same id, keeping its position
    pub fn replace_item(&self, updated: ContextItem) -> ContextResult<()> {
        let mut items = self.get_items()?;
        let slot = items
            .iter_mut()
            .find(|item| item.id == updated.id)
            .ok_or(ContextError::ItemNotFound { id: updated.id })?;
        *slot = updated;
        self.set_items(items)
    }

    // ------------------------------------------------------------------------
    // Capabilities
    // ------------------------------------------------------------------------

    pub fn open_editor(&self, title: &str, initial: &str) -> ContextResult<String> {
        let open = self
            .env()
            .open_editor
            .as_ref()
            .ok_or_else(|| ContextError::configuration("openEditor"))?;
        open(title, initial)
    }

    pub fn clipboard_copy(&self, text: &str) -> ContextResult<()> {
        let copy = self
            .env()
            .clipboard_copy
            .as_ref()
            .ok_or_else(|| ContextError::configuration("clipboardCopy"))?;
        copy(text)
    }

    pub fn file_exists(&self, path: &str) -> bool {
        match &self.env().file_exists {
            Some(exists) => exists(path),
            None => Path::new(path).exists(),
        }
    }

    pub fn format_argv(&self, args: &[String]) -> String {
        match &self.env().format_argv {
            Some(format) => format(args),
            None => argv::format_argv(args),
        }
    }

    pub fn parse_argv(&self, line: &str) -> Vec<String> {
        match &self.env().parse_argv {
            Some(parse) => parse(line),
            None => argv::parse_argv(line),
        }
    }

    pub fn paths(&self) -> ContextResult<&dyn PathContext> {
        self.env()
            .paths
            .as_deref()
            .ok_or_else(|| ContextError::configuration("context"))
    }

    pub fn print(&self, line: &str) {
        match &self.env().output {
            Some(output) => output(line),
            None => println!("{}", line),
        }
    }

    // ------------------------------------------------------------------------
    // Prompt assembly
    // ------------------------------------------------------------------------

    /// Token passed to diffs run by the default prompt
    pub fn cancellation(&self) -> CancellationToken {
        self.inner.cancel.borrow().clone()
    }

    /// Swap the token, e.g. after the previous one fired
    pub fn set_cancellation(&self, cancel: CancellationToken) {
        *self.inner.cancel.borrow_mut() = cancel;
    }

    /// The host's prompt builder if supplied, else [`Self::default_prompt`]
    pub fn build_prompt(&self) -> ContextResult<String> {
        match &self.env().build_prompt {
            Some(build) => build(self),
            None => self.default_prompt(),
        }
    }

    /// Render the current collection with the path context as archive
    pub fn default_prompt(&self) -> ContextResult<String> {
        let items = self.get_items()?;
        Ok(self.render_items(&items))
    }

    /// Render `items` with the manager's diff runner and path archive
    pub fn render_items(&self, items: &[ContextItem]) -> String {
        let renderer = ContextRenderer::new(Rc::clone(&self.inner.diff_runner))
            .with_cancellation(self.cancellation());
        let archive = self.env().paths.as_deref().map(PathArchive);
        renderer.build_context(items, archive.as_ref().map(|a| a as &dyn ArchiveSource))
    }

    /// A fresh command table bound to this manager. Changes to the returned
    /// table never affect other tables.
    pub fn commands(&self) -> CommandTable {
        builtin_commands(self)
    }
}

struct PathArchive<'a>(&'a dyn PathContext);

impl ArchiveSource for PathArchive<'_> {
    fn to_txtar(&self) -> ContextResult<String> {
        self.0.to_txtar()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::MockDiffRunner;
    use serde_json::json;

    fn manager_with_store() -> (ContextManager, Rc<RefCell<Vec<ContextItem>>>) {
        let store = Rc::new(RefCell::new(Vec::new()));
        let manager = ContextManager::new(Environment::new().with_shared_items(Rc::clone(&store)));
        (manager, store)
    }

    #[test]
    fn test_missing_accessors_fail_on_use() {
        let manager = ContextManager::new(Environment::new().with_set_items(|_| {}));
        let err = manager.get_items().unwrap_err();
        assert_eq!(err.to_string(), "getItems must be provided");

        let manager = ContextManager::new(Environment::new().with_get_items(Vec::new));
        let err = manager.set_items(Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "setItems must be provided");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_add_item_assigns_sequential_ids() {
        let (manager, store) = manager_with_store();
        for expected in 1..=3 {
            let predicted = manager.next_integer_id(&store.borrow());
            let id = manager.add_item("note", "n", Some(json!("x"))).unwrap();
            assert_eq!(id, expected);
            assert_eq!(id, predicted);
        }
        assert_eq!(store.borrow().len(), 3);
    }

    #[test]
    fn test_add_item_after_removal_uses_max() {
        let (manager, store) = manager_with_store();
        manager.add_item("note", "a", None).unwrap();
        manager.add_item("note", "b", None).unwrap();
        manager.add_item("note", "c", None).unwrap();
        manager.remove_item(2).unwrap();

        let ids: Vec<u64> = store.borrow().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(manager.add_item("note", "d", None).unwrap(), 4);
    }

    #[test]
    fn test_custom_allocator_is_used() {
        let store = Rc::new(RefCell::new(Vec::new()));
        let manager = ContextManager::new(
            Environment::new()
                .with_shared_items(Rc::clone(&store))
                .with_next_integer_id(|_| 42),
        );
        assert_eq!(manager.add_item("file", "test", None).unwrap(), 42);
        assert_eq!(store.borrow()[0].id, 42);
    }

    #[test]
    fn test_empty_label_is_stored_as_absent() {
        let (manager, store) = manager_with_store();
        manager.add_item("note", "", Some(json!("x"))).unwrap();
        assert_eq!(store.borrow()[0].label, None);
    }

    #[test]
    fn test_remove_unknown_id() {
        let (manager, _) = manager_with_store();
        assert!(matches!(
            manager.remove_item(9),
            Err(ContextError::ItemNotFound { id: 9 })
        ));
    }

    #[test]
    fn test_helper_overrides_are_used() {
        let manager = ContextManager::new(
            Environment::new()
                .with_editor(|title, _| Ok(format!("edited {title}")))
                .with_clipboard(|_| Err(ContextError::capability("clipboardCopy", "no display")))
                .with_file_exists(|path| path == "yes.txt")
                .with_format_argv(|args| args.join("|"))
                .with_parse_argv(|line| line.split(',').map(str::to_string).collect()),
        );
        assert_eq!(manager.open_editor("note", "").unwrap(), "edited note");
        assert!(manager.clipboard_copy("x").is_err());
        assert!(manager.file_exists("yes.txt"));
        assert!(!manager.file_exists("no.txt"));
        assert_eq!(manager.format_argv(&["a".into(), "b".into()]), "a|b");
        assert_eq!(manager.parse_argv("a,b"), vec!["a", "b"]);
    }

    #[test]
    fn test_default_helpers() {
        let manager = ContextManager::new(Environment::new());
        assert_eq!(manager.parse_argv("a 'b c'"), vec!["a", "b c"]);
        assert_eq!(manager.format_argv(&["a".into(), "b c".into()]), "a 'b c'");
        assert!(matches!(
            manager.open_editor("note", ""),
            Err(ContextError::Configuration { .. })
        ));
        assert!(manager.paths().is_err());
    }

    #[test]
    fn test_build_prompt_prefers_host() {
        let manager = ContextManager::new(Environment::new().with_build_prompt(|_| Ok("test prompt".into())));
        assert_eq!(manager.build_prompt().unwrap(), "test prompt");
    }

    #[test]
    fn test_default_prompt_renders_through_runner() {
        let mut runner = MockDiffRunner::new();
        runner.expect_revision_exists().returning(|_, _| true);
        runner.expect_run().returning(|_, _| Ok("+added line".into()));

        let store = Rc::new(RefCell::new(Vec::new()));
        let manager = ContextManager::new(
            Environment::new()
                .with_shared_items(Rc::clone(&store))
                .with_diff_runner(Rc::new(runner)),
        );
        manager.add_item("note", "test note", Some(json!("This is a test note"))).unwrap();
        manager.add_item("lazy-diff", "", None).unwrap();

        let prompt = manager.build_prompt().unwrap();
        assert!(prompt.starts_with("### Note: test note\n\nThis is a test note\n\n---\n"));
        assert!(prompt.contains("### Diff: git diff HEAD~1\n\n`````diff\n+added line\n`````"));
    }
}
