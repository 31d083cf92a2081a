//! Accent-insensitive document type filtering

use serde_json::Value;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Label returned by [`AllowList::choose_label`] when a document has none
pub const UNKNOWN_LABEL: &str = "inconnu";

/// Decompose, drop combining marks, lower-case, collapse whitespace.
///
/// Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Document descriptor as listed by a provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub id: String,
    pub name: String,
    /// Raw, unnormalized type labels
    pub type_labels: Vec<String>,
    pub deleted: bool,
    pub confidentiality: Option<String>,
}

/// Render a JSON scalar id as a string (numbers and strings accepted)
pub fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl Document {
    /// Build from a JSON descriptor.
    ///
    /// `id_keys` are tried in order. Type labels are read from
    /// `value[list_key][*][label_key]`; a plain string entry counts as a label.
    pub fn from_json(
        value: &Value,
        id_keys: &[&str],
        name_key: &str,
        list_key: &str,
        label_key: &str,
    ) -> Self {
        let id = id_keys
            .iter()
            .find_map(|k| id_string(value.get(*k)))
            .unwrap_or_default();
        let name = value
            .get(name_key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let type_labels = match value.get(list_key) {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|e| match e {
                    Value::String(s) => Some(s.clone()),
                    other => other.get(label_key).and_then(Value::as_str).map(str::to_string),
                })
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        };
        Self {
            id,
            name,
            type_labels,
            deleted: value.get("deleted").and_then(Value::as_bool) == Some(true),
            confidentiality: value
                .get("confidentiality")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    /// Excluded regardless of type: deleted, or confidentiality present and not public
    pub fn is_withheld(&self) -> bool {
        self.deleted
            || self
                .confidentiality
                .as_deref()
                .is_some_and(|c| !c.eq_ignore_ascii_case("public"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Normalized label contains a fragment
    #[default]
    Contains,
    /// Normalized label equals a fragment
    Exact,
}

/// Ordered set of normalized phrase fragments
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    fragments: Vec<String>,
    mode: MatchMode,
}

impl AllowList {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for f in fragments {
            let n = normalize(f.as_ref());
            if !n.is_empty() && !normalized.contains(&n) {
                normalized.push(n);
            }
        }
        Self {
            fragments: normalized,
            mode: MatchMode::Contains,
        }
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Whether one raw label matches any fragment
    pub fn matches_label(&self, label: &str) -> bool {
        let label = normalize(label);
        self.fragments.iter().any(|f| match self.mode {
            MatchMode::Contains => label.contains(f.as_str()),
            MatchMode::Exact => label == *f,
        })
    }

    /// Keep/drop decision for a document.
    pub fn is_allowed(&self, doc: &Document) -> bool {
        if doc.is_withheld() {
            return false;
        }
        doc.type_labels.iter().any(|l| self.matches_label(l))
    }

    /// Representative label: first matching raw label, else first label, else "inconnu"
    pub fn choose_label(&self, doc: &Document) -> String {
        doc.type_labels
            .iter()
            .find(|l| self.matches_label(l))
            .or_else(|| doc.type_labels.first())
            .cloned()
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string())
    }
}
