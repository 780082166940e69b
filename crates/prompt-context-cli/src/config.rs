//! Configuration for the pctx host
//!
//! Values come from `pctx.toml` (or `--config`), then environment variables
//! override them:
//!
//! - `PCTX_WORKING_DIR`: repository directory for git and relative paths
//! - `PCTX_GIT`: git executable
//! - `PCTX_DIFF_TIMEOUT_SECS`: diff timeout, `0` disables
//! - `PCTX_EDITOR`, then `VISUAL`, then `EDITOR`: editor command line
//! - `PCTX_CLIPBOARD`: clipboard command line
//! - `PCTX_LOG`: default log filter when `RUST_LOG` is unset

use anyhow::{Context, Result};
use prompt_context::GitDiffRunner;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file read from the current directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "pctx.toml";

const DEFAULT_EDITOR: &str = "vi";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PctxConfig {
    pub working_dir: Option<PathBuf>,
    pub git_binary: String,
    pub diff_timeout_secs: u64,
    pub editor: Option<String>,
    pub clipboard_command: Option<String>,
    pub log_level: String,
    /// Problems found while applying overrides, logged once tracing is up
    #[serde(skip)]
    pub warnings: Vec<String>,
}

impl Default for PctxConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            git_binary: "git".to_string(),
            diff_timeout_secs: 30,
            editor: None,
            clipboard_command: None,
            log_level: "warn".to_string(),
            warnings: Vec::new(),
        }
    }
}

impl PctxConfig {
    /// Load from `path`, or `./pctx.toml` when present, then apply the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if default_path.is_file() => Self::from_file(default_path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Apply overrides from `var`, a lookup over environment variables
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = set("PCTX_WORKING_DIR") {
            self.working_dir = Some(PathBuf::from(dir));
        }
        if let Some(git) = set("PCTX_GIT") {
            self.git_binary = git;
        }
        if let Some(raw) = set("PCTX_DIFF_TIMEOUT_SECS") {
            match raw.trim().parse() {
                Ok(secs) => self.diff_timeout_secs = secs,
                Err(_) => self
                    .warnings
                    .push(format!("ignoring PCTX_DIFF_TIMEOUT_SECS={raw:?}: not a number of seconds")),
            }
        }
        if let Some(editor) = set("PCTX_EDITOR") {
            self.editor = Some(editor);
        } else if self.editor.is_none() {
            self.editor = set("VISUAL").or_else(|| set("EDITOR"));
        }
        if let Some(clipboard) = set("PCTX_CLIPBOARD") {
            self.clipboard_command = Some(clipboard);
        }
        if let Some(level) = set("PCTX_LOG") {
            self.log_level = level;
        }
    }

    /// Command-line directory beats file and environment
    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        if dir.is_some() {
            self.working_dir = dir;
        }
        self
    }

    pub fn working_dir(&self) -> PathBuf {
        self.working_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn editor(&self) -> &str {
        self.editor.as_deref().unwrap_or(DEFAULT_EDITOR)
    }

    pub fn diff_timeout(&self) -> Option<Duration> {
        (self.diff_timeout_secs > 0).then(|| Duration::from_secs(self.diff_timeout_secs))
    }

    pub fn diff_runner(&self) -> GitDiffRunner {
        let runner = GitDiffRunner::new()
            .with_git_binary(&self.git_binary)
            .with_working_dir(self.working_dir());
        match self.diff_timeout() {
            Some(timeout) => runner.with_timeout(timeout),
            None => runner,
        }
    }
}
