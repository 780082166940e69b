//! One-shot rendering of a host-marshalled item list

use crate::config::PctxConfig;
use anyhow::{Context, Result};
use prompt_context::ContextRenderer;
use serde_json::Value;
use std::fs;
use std::io::Read;
use tokio_util::sync::CancellationToken;

/// Read items JSON from `input` (`-` for stdin)
pub fn read_items(input: &str) -> Result<Value> {
    let text = if input == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read items from stdin")?;
        text
    } else {
        fs::read_to_string(input).with_context(|| format!("Failed to read items file {}", input))?
    };
    serde_json::from_str(&text).with_context(|| format!("Invalid items JSON in {}", input))
}

/// Render loosely typed items with the configured git runner
pub fn render_items(config: &PctxConfig, items: &Value, cancel: CancellationToken) -> String {
    ContextRenderer::new(config.diff_runner())
        .with_cancellation(cancel)
        .build_context_value(items, None)
}
