//! Context renderer
//!
//! Turns an ordered item collection into one markdown document in two
//! stages: collect a [`ContentBlock`] per renderable item (running lazy
//! diffs on the way), then size a single fence over every fenced body and
//! emit the blocks in order.
//!
//! Rendering never fails. Bad payloads and failed diffs become inline
//! "Diff Error" sections; items with a missing or unknown type are skipped.

use crate::diff::{resolve_diff_args, DiffRunner};
use crate::error::ContextResult;
use crate::fence::fence_for;
use crate::item::{value_to_text, ContextItem, ItemKind, DEFAULT_DIFF_LABEL, DEFAULT_NOTE_LABEL};
use crate::payload::coerce_payload;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Language tag for diff bodies
pub const DIFF_LANG: &str = "diff";

/// Language tag for the archive block
pub const TXTAR_LANG: &str = "txtar";

/// Prefix of the body emitted when a lazy diff cannot be produced
pub const DIFF_ERROR_PREFIX: &str = "Error executing git diff: ";

const SEPARATOR: &str = "\n\n---\n";

/// Produces a serialized snapshot appended after all item blocks.
pub trait ArchiveSource {
    fn to_txtar(&self) -> ContextResult<String>;
}

impl<F> ArchiveSource for F
where
    F: Fn() -> String,
{
    fn to_txtar(&self) -> ContextResult<String> {
        Ok(self())
    }
}

/// One rendered section, alive only for the duration of a render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    pub title: String,
    pub content: String,
    /// Fenced with this language tag when set
    pub lang: Option<&'static str>,
    pub is_error: bool,
}

impl ContentBlock {
    fn plain(title: String, content: String) -> Self {
        Self {
            title,
            content,
            lang: None,
            is_error: false,
        }
    }

    fn error(title: String, content: String) -> Self {
        Self {
            is_error: true,
            ..Self::plain(title, content)
        }
    }

    fn diff(title: String, content: String) -> Self {
        Self {
            lang: Some(DIFF_LANG),
            ..Self::plain(title, content)
        }
    }
}

/// Renders context items to markdown, resolving lazy diffs through `R`
pub struct ContextRenderer<R> {
    runner: R,
    cancel: CancellationToken,
}

impl<R: DiffRunner> ContextRenderer<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight diffs when `cancel` fires; they render as errors
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Render typed items.
    pub fn build_context(&self, items: &[ContextItem], archive: Option<&dyn ArchiveSource>) -> String {
        let blocks: Vec<ContentBlock> = items
            .iter()
            .filter_map(|item| self.block_for(&item.kind, item.label(), item.payload.as_ref()))
            .collect();
        render_blocks(&blocks, archive_text(archive).as_deref())
    }

    /// Render loosely typed items as handed over by a host.
    ///
    /// Anything but an array renders as `""`. Non-object entries and entries
    /// without a `type` are skipped; labels of other types are stringified (arrays
    /// comma-joined, objects as `[object Object]`).
    pub fn build_context_value(&self, items: &Value, archive: Option<&dyn ArchiveSource>) -> String {
        let Value::Array(entries) = items else {
            return String::new();
        };

        let mut blocks = Vec::with_capacity(entries.len());
        for entry in entries {
            let Value::Object(fields) = entry else {
                continue;
            };
            let kind = match fields.get("type") {
                None | Some(Value::Null) => {
                    debug!("skipping context entry without a type");
                    continue;
                }
                Some(value) => ItemKind::from(value_to_text(value)),
            };
            let label = fields
                .get("label")
                .map(value_to_text)
                .filter(|label| !label.is_empty());
            if let Some(block) = self.block_for(&kind, label.as_deref(), fields.get("payload")) {
                blocks.push(block);
            }
        }
        render_blocks(&blocks, archive_text(archive).as_deref())
    }

    /// Collection stage for one item
    fn block_for(&self, kind: &ItemKind, label: Option<&str>, payload: Option<&Value>) -> Option<ContentBlock> {
        let text = || payload.map(value_to_text).unwrap_or_default();
        match kind {
            ItemKind::Note => Some(ContentBlock::plain(
                format!("Note: {}", label.unwrap_or(DEFAULT_NOTE_LABEL)),
                text(),
            )),
            ItemKind::Diff => Some(ContentBlock::diff(
                format!("Diff: {}", label.unwrap_or(DEFAULT_DIFF_LABEL)),
                text(),
            )),
            ItemKind::DiffError => Some(ContentBlock::error(
                format!("Diff Error: {}", label.unwrap_or(DEFAULT_DIFF_LABEL)),
                text(),
            )),
            ItemKind::LazyDiff => Some(self.lazy_diff_block(label, payload)),
            other => {
                debug!(kind = %other, "no renderer for context item type, skipping");
                None
            }
        }
    }

    fn lazy_diff_block(&self, label: Option<&str>, payload: Option<&Value>) -> ContentBlock {
        let (args, outcome) = match coerce_payload(payload) {
            Ok(coerced) => {
                let args = resolve_diff_args(&self.runner, &self.cancel, coerced);
                let outcome = self.runner.run(&self.cancel, &args);
                (args, outcome)
            }
            Err(e) => (Vec::new(), Err(e)),
        };

        let final_label = match label {
            Some(label) => label.to_string(),
            None => format!("git diff {}", args.join(" ").trim()),
        };

        match outcome {
            Ok(output) => ContentBlock::diff(format!("Diff: {}", final_label), output),
            Err(e) => {
                warn!(label = %final_label, error = %e, "lazy diff failed");
                ContentBlock::error(
                    format!("Diff Error: {}", final_label),
                    format!("{}{}", DIFF_ERROR_PREFIX, e),
                )
            }
        }
    }
}

fn archive_text(archive: Option<&dyn ArchiveSource>) -> Option<String> {
    match archive?.to_txtar() {
        Ok(text) if !text.is_empty() => Some(text),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "archive producer failed, omitting archive");
            None
        }
    }
}

/// Rendering stage: one fence for every fenced body plus the archive
pub fn render_blocks(blocks: &[ContentBlock], archive: Option<&str>) -> String {
    let fence = fence_for(
        blocks
            .iter()
            .filter(|b| b.lang.is_some())
            .map(|b| b.content.as_str())
            .chain(archive),
    );

    let mut out = String::new();
    for block in blocks {
        out.push_str("### ");
        out.push_str(&block.title);
        out.push_str("\n\n");
        match block.lang {
            Some(lang) => push_fenced(&mut out, &fence, lang, &block.content),
            None => out.push_str(&block.content),
        }
        out.push_str(SEPARATOR);
    }

    if let Some(text) = archive {
        push_fenced(&mut out, &fence, TXTAR_LANG, text);
    }
    out
}

fn push_fenced(out: &mut String, fence: &str, lang: &str, content: &str) {
    out.push_str(fence);
    out.push_str(lang);
    out.push('\n');
    out.push_str(content);
    out.push('\n');
    out.push_str(fence);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{MockDiffRunner, EMPTY_TREE_HASH};
    use crate::error::ContextError;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn item(id: u64, kind: &str, label: Option<&str>, payload: Option<Value>) -> ContextItem {
        ContextItem::new(id, kind, label.map(str::to_string), payload)
    }

    fn unused_runner() -> MockDiffRunner {
        let mut runner = MockDiffRunner::new();
        runner.expect_run().never();
        runner.expect_revision_exists().never();
        runner
    }

    #[test]
    fn test_note_block() {
        let renderer = ContextRenderer::new(unused_runner());
        let out = renderer.build_context(&[item(1, "note", Some("Important"), Some(json!("Remember")))], None);
        assert_eq!(out, "### Note: Important\n\nRemember\n\n---\n");
    }

    #[test]
    fn test_default_labels() {
        let renderer = ContextRenderer::new(unused_runner());
        let out = renderer.build_context(
            &[
                item(1, "note", None, Some(json!("a"))),
                item(2, "diff", Some(""), Some(json!("+b"))),
                item(3, "diff-error", None, Some(json!("boom"))),
            ],
            None,
        );
        assert!(out.contains("### Note: note\n\na\n"));
        assert!(out.contains("### Diff: git diff\n\n`````diff\n+b\n`````\n\n---\n"));
        assert!(out.contains("### Diff Error: git diff\n\nboom\n\n---\n"));
    }

    #[test]
    fn test_order_is_preserved() {
        let renderer = ContextRenderer::new(unused_runner());
        let out = renderer.build_context(
            &[
                item(3, "note", Some("third"), Some(json!("c"))),
                item(1, "note", Some("first"), Some(json!("a"))),
                item(2, "diff", Some("second"), Some(json!("b"))),
            ],
            None,
        );
        let third = out.find("Note: third").unwrap();
        let first = out.find("Note: first").unwrap();
        let second = out.find("Diff: second").unwrap();
        assert!(third < first && first < second, "{out}");
    }

    #[test]
    fn test_unknown_and_file_types_are_skipped() {
        let renderer = ContextRenderer::new(unused_runner());
        let out = renderer.build_context(
            &[
                item(1, "file", Some("src/lib.rs"), None),
                item(2, "image", Some("logo.png"), None),
                item(3, "note", Some("kept"), Some(json!("x"))),
            ],
            None,
        );
        assert_eq!(out, "### Note: kept\n\nx\n\n---\n");
    }

    #[test]
    fn test_lazy_diff_success_uses_args_in_label() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_mock = Arc::clone(&seen);
        let mut runner = MockDiffRunner::new();
        runner.expect_revision_exists().never();
        runner.expect_run().times(1).returning(move |_, args| {
            seen_in_mock.lock().unwrap().push(args.to_vec());
            Ok("+added line".to_string())
        });

        let renderer = ContextRenderer::new(runner);
        let out = renderer.build_context(&[item(1, "lazy-diff", None, Some(json!(["main", "--stat"])))], None);

        assert!(out.contains("### Diff: git diff main --stat\n\n`````diff\n+added line\n`````"), "{out}");
        assert_eq!(*seen.lock().unwrap(), vec![vec!["main".to_string(), "--stat".to_string()]]);
    }

    #[test]
    fn test_lazy_diff_failure_becomes_error_block() {
        let mut runner = MockDiffRunner::new();
        runner.expect_revision_exists().returning(|_, _| true);
        runner
            .expect_run()
            .returning(|_, _| Err(ContextError::diff_execution("fatal: bad revision exit status 128")));

        let renderer = ContextRenderer::new(runner);
        let out = renderer.build_context(&[item(1, "lazy-diff", Some("my diff"), None)], None);

        assert_eq!(
            out,
            "### Diff Error: my diff\n\nError executing git diff: fatal: bad revision exit status 128\n\n---\n"
        );
    }

    #[test]
    fn test_lazy_diff_invalid_payload_never_runs_git() {
        let renderer = ContextRenderer::new(unused_runner());
        let out = renderer.build_context(
            &[
                item(1, "lazy-diff", None, Some(json!(["a", 5]))),
                item(2, "lazy-diff", Some("numeric"), Some(json!(42))),
                item(3, "note", Some("after"), Some(json!("still here"))),
            ],
            None,
        );
        assert!(out.contains("### Diff Error: git diff \n\nError executing git diff: Invalid payload: expected a string array, but found non-string element at index 1"), "{out}");
        assert!(out.contains("### Diff Error: numeric\n\nError executing git diff: Invalid payload: expected a string or string array, but got type 'number'"), "{out}");
        assert!(out.contains("### Note: after\n\nstill here"));
    }

    #[test]
    fn test_lazy_diff_escalates_single_head_parent() {
        let mut runner = MockDiffRunner::new();
        runner.expect_revision_exists().returning(|_, _| false);
        runner
            .expect_run()
            .withf(|_, args| args == [EMPTY_TREE_HASH.to_string(), "HEAD".to_string()])
            .times(1)
            .returning(|_, _| Ok("+initial".to_string()));

        let renderer = ContextRenderer::new(runner);
        let out = renderer.build_context(&[item(1, "lazy-diff", None, Some(json!(["HEAD~1"])))], None);
        assert!(out.contains(&format!("### Diff: git diff {} HEAD", EMPTY_TREE_HASH)), "{out}");
    }

    #[test]
    fn test_fence_grows_past_backticks_in_diff() {
        let renderer = ContextRenderer::new(unused_runner());
        let body = "+let s = \"``````\";";
        let out = renderer.build_context(&[item(1, "diff", None, Some(json!(body)))], None);
        assert!(out.contains(&format!("```````diff\n{}\n```````\n", body)), "{out}");
    }

    #[test]
    fn test_note_backticks_do_not_affect_fence() {
        let renderer = ContextRenderer::new(unused_runner());
        let out = renderer.build_context(
            &[
                item(1, "note", None, Some(json!("``````````"))),
                item(2, "diff", None, Some(json!("+x"))),
            ],
            None,
        );
        assert!(out.contains("`````diff\n+x\n`````\n"), "{out}");
    }

    #[test]
    fn test_archive_appended_last_and_fenced() {
        let renderer = ContextRenderer::new(unused_runner());
        let archive = || "-- a.txt --\n````\nhello".to_string();
        let out = renderer.build_context(&[item(1, "note", None, Some(json!("n")))], Some(&archive));
        assert_eq!(
            out,
            "### Note: note\n\nn\n\n---\n`````txtar\n-- a.txt --\n````\nhello\n`````"
        );
    }

    #[test]
    fn test_empty_archive_is_omitted() {
        let renderer = ContextRenderer::new(unused_runner());
        let archive = String::new;
        assert_eq!(renderer.build_context(&[], Some(&archive)), "");
    }

    #[test]
    fn test_failing_archive_is_omitted() {
        struct Broken;
        impl ArchiveSource for Broken {
            fn to_txtar(&self) -> ContextResult<String> {
                Err(ContextError::capability("toTxtar", "disk gone"))
            }
        }
        let renderer = ContextRenderer::new(unused_runner());
        let out = renderer.build_context(&[item(1, "note", None, Some(json!("n")))], Some(&Broken));
        assert_eq!(out, "### Note: note\n\nn\n\n---\n");
    }

    #[test]
    fn test_loose_items() {
        let renderer = ContextRenderer::new(unused_runner());
        let items = json!([
            null,
            "not an object",
            {"label": "no type"},
            {"type": null, "payload": "x"},
            {"type": "note", "label": true, "payload": "converted label"},
            {"type": "note", "label": null, "payload": "default label"}
        ]);
        let out = renderer.build_context_value(&items, None);
        assert_eq!(
            out,
            "### Note: true\n\nconverted label\n\n---\n### Note: note\n\ndefault label\n\n---\n"
        );
    }

    #[test]
    fn test_loose_non_array_is_empty() {
        let renderer = ContextRenderer::new(unused_runner());
        assert_eq!(renderer.build_context_value(&json!({"type": "note"}), None), "");
        assert_eq!(renderer.build_context_value(&json!(7), None), "");
        assert_eq!(renderer.build_context_value(&Value::Null, None), "");
    }

    #[test]
    fn test_cancelled_render_degrades_to_error() {
        let mut runner = MockDiffRunner::new();
        runner.expect_revision_exists().returning(|cancel, _| !cancel.is_cancelled());
        runner.expect_run().returning(|cancel, _| {
            if cancel.is_cancelled() {
                Err(ContextError::diff_execution("git diff cancelled"))
            } else {
                Ok(String::new())
            }
        });
        let cancel = CancellationToken::new();
        cancel.cancel();

        let renderer = ContextRenderer::new(runner).with_cancellation(cancel);
        let out = renderer.build_context(&[item(1, "lazy-diff", Some("d"), Some(json!("main")))], None);
        assert_eq!(out, "### Diff Error: d\n\nError executing git diff: git diff cancelled\n\n---\n");
    }
}
