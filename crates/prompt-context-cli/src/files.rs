//! Filesystem-backed path context
//!
//! Tracks the paths handed to `add`. Directories are expanded when the
//! archive is built, using the `ignore` walker so `.gitignore` rules and
//! hidden files are honoured. File contents are read fresh every time.

use ignore::WalkBuilder;
use prompt_context::{ContextError, ContextResult, PathContext};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FileContextError {
    #[error("path not found: {path}")]
    NotFound { path: String },

    #[error("path not tracked: {path}")]
    NotTracked { path: String },
}

impl From<FileContextError> for ContextError {
    fn from(err: FileContextError) -> Self {
        let capability = match err {
            FileContextError::NotFound { .. } => "addPath",
            FileContextError::NotTracked { .. } => "removePath",
        };
        ContextError::capability(capability, err.to_string())
    }
}

/// Paths tracked relative to a root directory
pub struct FileContext {
    root: PathBuf,
    tracked: RefCell<BTreeSet<String>>,
}

impl FileContext {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            tracked: RefCell::new(BTreeSet::new()),
        }
    }

    /// `path` resolved against the root
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    /// Tracked entries as they were added
    pub fn tracked(&self) -> Vec<String> {
        self.tracked.borrow().iter().cloned().collect()
    }

    /// Every file currently covered, keyed by archive name
    pub fn files(&self) -> BTreeMap<String, PathBuf> {
        let mut files = BTreeMap::new();
        for entry in self.tracked.borrow().iter() {
            let full = self.resolve(entry);
            if full.is_file() {
                files.insert(entry.clone(), full);
                continue;
            }

            let walker = WalkBuilder::new(&full)
                .hidden(true)
                .git_ignore(true)
                .require_git(false)
                .build();
            for found in walker.flatten() {
                let path = found.path();
                if !path.is_file() {
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&full) else {
                    continue;
                };
                files.insert(archive_name(entry, relative), path.to_path_buf());
            }
        }
        files
    }
}

/// `entry/relative` with forward slashes
fn archive_name(entry: &str, relative: &Path) -> String {
    let mut name = entry.trim_end_matches(['/', '\\']).to_string();
    for part in relative.components() {
        name.push('/');
        name.push_str(&part.as_os_str().to_string_lossy());
    }
    name
}

impl PathContext for FileContext {
    fn add_path(&self, path: &str) -> ContextResult<()> {
        if !self.exists(path) {
            return Err(FileContextError::NotFound {
                path: path.to_string(),
            }
            .into());
        }
        self.tracked.borrow_mut().insert(path.to_string());
        Ok(())
    }

    fn remove_path(&self, path: &str) -> ContextResult<()> {
        if !self.tracked.borrow_mut().remove(path) {
            return Err(FileContextError::NotTracked {
                path: path.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn to_txtar(&self) -> ContextResult<String> {
        let mut out = String::new();
        for (name, path) in self.files() {
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            out.push_str("-- ");
            out.push_str(&name);
            out.push_str(" --\n");
            out.push_str(&content);
            if !content.is_empty() && !content.ends_with('\n') {
                out.push('\n');
            }
        }
        Ok(out)
    }
}
