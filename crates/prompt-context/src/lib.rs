//! Prompt Context Library
//!
//! Collects files, notes and git diffs into an ordered list of context
//! items and renders them as one markdown prompt.
//!
//! # Pieces
//!
//! - [`item`]: the item model and max-plus-one id allocation
//! - [`manager`]: item store over host accessors plus host capabilities
//! - [`commands`]: the extensible command table (`add`, `diff`, `note`,
//!   `list`, `edit`, `remove`, `show`, `copy`)
//! - [`render`]: block collection, fence sizing and markdown layout
//! - [`diff`]: the `git diff` runner and default-argument policy
//!
//! # Usage
//!
//! ```no_run
//! use prompt_context::{ContextManager, Environment};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let store = Rc::new(RefCell::new(Vec::new()));
//! let manager = ContextManager::new(Environment::new().with_shared_items(store));
//! let commands = manager.commands();
//! commands.dispatch("note", &["remember the edge cases".to_string()])?;
//! commands.dispatch("diff", &[])?;
//! println!("{}", manager.build_prompt()?);
//! # Ok::<(), prompt_context::ContextError>(())
//! ```

pub mod argv;
pub mod commands;
pub mod diff;
pub mod error;
pub mod fence;
pub mod item;
pub mod manager;
pub mod payload;
pub mod render;

pub use commands::{Command, CommandHandler, CommandTable, BUILTIN_COMMANDS};
pub use diff::{DiffRunner, GitDiffRunner, EMPTY_TREE_HASH};
pub use error::{ContextError, ContextResult};
pub use item::{next_integer_id, ContextItem, IdSource, ItemKind};
pub use manager::{ContextManager, Environment, PathContext};
pub use render::{render_blocks, ArchiveSource, ContentBlock, ContextRenderer};
