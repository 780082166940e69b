//! Context item types and id allocation

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Default label for notes without one
pub const DEFAULT_NOTE_LABEL: &str = "note";

/// Default label for diffs without one
pub const DEFAULT_DIFF_LABEL: &str = "git diff";

/// The kind of a context item.
///
/// Unrecognised kinds are kept verbatim so host extensions survive a round
/// trip through the store; the renderer skips them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemKind {
    File,
    Note,
    Diff,
    DiffError,
    LazyDiff,
    Other(String),
}

impl ItemKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::File => "file",
            Self::Note => "note",
            Self::Diff => "diff",
            Self::DiffError => "diff-error",
            Self::LazyDiff => "lazy-diff",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for ItemKind {
    fn from(s: &str) -> Self {
        match s {
            "file" => Self::File,
            "note" => Self::Note,
            "diff" => Self::Diff,
            "diff-error" => Self::DiffError,
            "lazy-diff" => Self::LazyDiff,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ItemKind {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<ItemKind> for String {
    fn from(kind: ItemKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of content tracked by the manager and eligible for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    /// Unique within one collection
    pub id: u64,

    /// Selects the rendering branch
    #[serde(rename = "type")]
    pub kind: ItemKind,

    /// Display label; empty is treated as absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Kind-dependent payload: a string for notes and diffs, absent / string /
    /// string array for lazy diffs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ContextItem {
    pub fn new(
        id: u64,
        kind: impl Into<ItemKind>,
        label: Option<String>,
        payload: Option<Value>,
    ) -> Self {
        Self {
            id,
            kind: kind.into(),
            label,
            payload,
        }
    }

    /// The label if present and non-empty
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref().filter(|l| !l.is_empty())
    }

    /// Label with the kind-specific fallback applied
    pub fn display_label(&self) -> &str {
        match self.label() {
            Some(label) => label,
            None => match self.kind {
                ItemKind::Note => DEFAULT_NOTE_LABEL,
                ItemKind::Diff | ItemKind::DiffError | ItemKind::LazyDiff => DEFAULT_DIFF_LABEL,
                _ => self.kind.as_str(),
            },
        }
    }

    /// Payload as text; absent and null become empty, other values are
    /// stringified
    pub fn payload_text(&self) -> String {
        self.payload.as_ref().map(value_to_text).unwrap_or_default()
    }
}

/// Stringify a loosely typed value the way a host scripting layer would:
/// arrays join their elements with `,` (null elements empty) and objects
/// collapse to `[object Object]`.
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(elements) => elements.iter().map(value_to_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
        other => other.to_string(),
    }
}

// ============================================================================
// Id allocation
// ============================================================================

/// Anything that carries an integer id, possibly loosely typed.
pub trait IdSource {
    /// The id coerced to an integer; non-numeric and negative ids are 0
    fn integer_id(&self) -> u64;
}

impl IdSource for ContextItem {
    fn integer_id(&self) -> u64 {
        self.id
    }
}

impl IdSource for Value {
    fn integer_id(&self) -> u64 {
        self.get("id").map(coerce_integer).unwrap_or(0)
    }
}

fn coerce_integer(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(float_id)).unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(float_id))
                .unwrap_or(0)
        }
        Value::Bool(true) => 1,
        _ => 0,
    }
}

/// Truncated toward zero; negative and non-finite values are 0
fn float_id(f: f64) -> u64 {
    if f.is_finite() && f > 0.0 {
        f.trunc() as u64
    } else {
        0
    }
}

/// Next id for a collection: 1 when empty, otherwise one past the largest
/// id. When the largest id is `u64::MAX` the smallest unused id is returned.
pub fn next_integer_id<T: IdSource>(list: &[T]) -> u64 {
    let max = list.iter().map(IdSource::integer_id).max().unwrap_or(0);
    max.checked_add(1).unwrap_or_else(|| first_free_id(list))
}

fn first_free_id<T: IdSource>(list: &[T]) -> u64 {
    let taken: HashSet<u64> = list.iter().map(IdSource::integer_id).collect();
    (1..=u64::MAX).find(|id| !taken.contains(id)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(id: u64) -> ContextItem {
        ContextItem::new(id, ItemKind::Note, None, None)
    }

    #[test]
    fn test_next_integer_id_empty() {
        let empty: Vec<ContextItem> = Vec::new();
        assert_eq!(next_integer_id(&empty), 1);
    }

    #[test]
    fn test_next_integer_id_uses_max_not_len() {
        assert_eq!(next_integer_id(&[item(2), item(7), item(3)]), 8);
        assert_eq!(next_integer_id(&[item(1), item(5), item(3)]), 6);
    }

    #[test]
    fn test_next_integer_id_coerces_loose_ids() {
        let list = vec![json!({"id": "9"}), json!({"id": "not-a-number"})];
        assert_eq!(next_integer_id(&list), 10);

        let list = vec![json!({"id": 2.9}), json!({"type": "note"}), json!(null)];
        assert_eq!(next_integer_id(&list), 3);
    }

    #[test]
    fn test_next_integer_id_above_i64_range() {
        let big = 1u64 << 63;
        assert_eq!(next_integer_id(&[item(big), item(big + 5)]), big + 6);
        assert_eq!(next_integer_id(&[item(big + 5), item(big)]), big + 6);
    }

    #[test]
    fn test_next_integer_id_at_u64_max_reuses_gap() {
        assert_eq!(next_integer_id(&[item(u64::MAX)]), 1);
        assert_eq!(next_integer_id(&[item(1), item(u64::MAX), item(2)]), 3);
    }

    #[test]
    fn test_negative_loose_ids_count_as_zero() {
        let list = vec![json!({"id": -4}), json!({"id": "-2.5"})];
        assert_eq!(next_integer_id(&list), 1);

        let list = vec![json!({"id": u64::MAX - 1}), json!({"id": -1})];
        assert_eq!(next_integer_id(&list), u64::MAX);
    }

    #[test]
    fn test_kind_round_trips_unknown_names() {
        assert_eq!(ItemKind::from("lazy-diff"), ItemKind::LazyDiff);
        assert_eq!(ItemKind::from("image").as_str(), "image");

        let parsed: ContextItem =
            serde_json::from_value(json!({"id": 4, "type": "image", "label": "x.png"})).unwrap();
        assert_eq!(parsed.kind, ItemKind::Other("image".into()));
        assert_eq!(serde_json::to_value(&parsed).unwrap()["type"], "image");
    }

    #[test]
    fn test_display_label_fallbacks() {
        let note = ContextItem::new(1, ItemKind::Note, Some(String::new()), None);
        assert_eq!(note.display_label(), "note");

        let diff = ContextItem::new(2, ItemKind::DiffError, None, None);
        assert_eq!(diff.display_label(), "git diff");

        let file = ContextItem::new(3, ItemKind::File, Some("src/lib.rs".into()), None);
        assert_eq!(file.display_label(), "src/lib.rs");
    }

    #[test]
    fn test_payload_text() {
        let item = ContextItem::new(1, ItemKind::Note, None, Some(json!("Remember")));
        assert_eq!(item.payload_text(), "Remember");

        let item = ContextItem::new(1, ItemKind::Note, None, Some(Value::Null));
        assert_eq!(item.payload_text(), "");

        let item = ContextItem::new(1, ItemKind::Note, None, Some(json!(12)));
        assert_eq!(item.payload_text(), "12");
    }

    #[test]
    fn test_structured_values_stringify_like_host_scripts() {
        assert_eq!(value_to_text(&json!(["a", "b"])), "a,b");
        assert_eq!(value_to_text(&json!(["a", null, ["b", 3]])), "a,,b,3");
        assert_eq!(value_to_text(&json!([])), "");
        assert_eq!(value_to_text(&json!({"k": "v"})), "[object Object]");
        assert_eq!(value_to_text(&json!(true)), "true");
    }
}
