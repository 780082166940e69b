//! Wiring of the core manager to this host's capabilities

use crate::clipboard::ClipboardCommand;
use crate::config::PctxConfig;
use crate::editor::EditorCommand;
use crate::files::FileContext;
use prompt_context::{ContextItem, ContextManager, Environment};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Cancellation token shared between the signal handler and the command
/// loop. A fired token is swapped for a fresh one before the next command.
#[derive(Clone, Default)]
pub struct CancelSlot {
    token: Arc<Mutex<CancellationToken>>,
}

impl CancelSlot {
    fn lock(&self) -> MutexGuard<'_, CancellationToken> {
        self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Abort whatever the current token guards
    pub fn cancel(&self) {
        self.lock().cancel();
    }

    /// The live token, replacing it first if it already fired
    pub fn current(&self) -> CancellationToken {
        let mut token = self.lock();
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
        token.clone()
    }
}

/// In-memory session: the item store and the manager wired to it
pub struct Session {
    pub manager: ContextManager,
    pub items: Rc<RefCell<Vec<ContextItem>>>,
    pub files: Rc<FileContext>,
}

impl Session {
    pub fn new(config: &PctxConfig) -> Self {
        Self::with_environment(config, Environment::new())
    }

    /// Like [`Session::new`] but starting from `env`, so callers can pre-set
    /// capabilities such as the output sink
    pub fn with_environment(config: &PctxConfig, env: Environment) -> Self {
        let working_dir = config.working_dir();
        let items = Rc::new(RefCell::new(Vec::new()));
        let files = Rc::new(FileContext::new(&working_dir));
        let editor = EditorCommand::new(config.editor()).with_working_dir(&working_dir);

        let exists = Rc::clone(&files);
        let mut env = env
            .with_shared_items(Rc::clone(&items))
            .with_paths(files.clone())
            .with_file_exists(move |path| exists.exists(path))
            .with_editor(move |title, initial| editor.edit(title, initial))
            .with_diff_runner(Rc::new(config.diff_runner()));
        if let Some(line) = &config.clipboard_command {
            let clipboard = ClipboardCommand::new(line);
            env = env.with_clipboard(move |text| clipboard.copy(text));
        }

        Self {
            manager: ContextManager::new(env),
            items,
            files,
        }
    }
}
