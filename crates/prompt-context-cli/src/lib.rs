//! pctx host
//!
//! A terminal host for the prompt-context core: configuration, a
//! filesystem path context, editor and clipboard commands, and the
//! interactive command loop.
//!
//! # Usage
//!
//! ```bash
//! # Interactive session in the current repository
//! pctx
//!
//! # Render an item list produced by another tool
//! pctx render items.json
//!
//! # Custom configuration
//! PCTX_EDITOR="code --wait" PCTX_CLIPBOARD=pbcopy pctx --working-dir ../repo
//! ```

pub mod cli;
pub mod clipboard;
pub mod config;
pub mod editor;
pub mod files;
pub mod host;
pub mod render;
pub mod repl;

pub use config::PctxConfig;
pub use host::{CancelSlot, Session};
