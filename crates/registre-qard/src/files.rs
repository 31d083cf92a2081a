//! File selection and output naming

use std::sync::LazyLock;

use regex::Regex;
use registre_core::filter::id_string;
use serde_json::Value;

use crate::config::Config;

/// Label used when a file carries no datatype
pub const UNKNOWN_DATATYPE: &str = "UNKNOWN";

const MAX_NAME_LEN: usize = 200;

static UNSAFE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w.\-]+").expect("valid regex"));

/// A file retained for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedFile {
    pub id: String,
    pub datatype: String,
}

fn datatype_of(file: &Value) -> String {
    ["datatype", "data_type"]
        .iter()
        .find_map(|k| file.get(*k).and_then(Value::as_str).filter(|s| !s.is_empty()))
        .unwrap_or_default()
        .to_uppercase()
}

/// Choose the files to download for one user.
///
/// Files with a datatype outside the allowed set are dropped; files without
/// a datatype are kept as `UNKNOWN`. Only the first match is kept unless
/// `all_files` is set, in which case at most `max_files_per_user` are.
pub fn pick_files(files: &[Value], config: &Config) -> Vec<PickedFile> {
    let cap = if config.all_files {
        config.max_files_per_user
    } else {
        1
    };
    let filter = config.datatype_filter();
    let mut chosen = Vec::new();
    for file in files {
        if chosen.len() >= cap {
            break;
        }
        let datatype = datatype_of(file);
        let dropped = filter.as_ref().is_some_and(|f| !f.matches_label(&datatype));
        if !datatype.is_empty() && dropped {
            continue;
        }
        let Some(id) = ["id", "file_id", "uuid"]
            .iter()
            .find_map(|k| id_string(file.get(*k)))
        else {
            continue;
        };
        chosen.push(PickedFile {
            id,
            datatype: if datatype.is_empty() {
                UNKNOWN_DATATYPE.to_string()
            } else {
                datatype
            },
        });
    }
    chosen
}

/// Replace every run of characters outside `[\w.-]` with `_`, truncated to 200 chars
pub fn safe_filename(name: &str) -> String {
    UNSAFE_RUN
        .replace_all(name, "_")
        .chars()
        .take(MAX_NAME_LEN)
        .collect()
}

fn split_ext(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) if i > 0 => (&name[..i], &name[i..]),
        _ => (name, ""),
    }
}

/// Final file name: `<prefix>__<base><ext>`, the served name as-is without a prefix.
///
/// `served` is the `Content-Disposition` name, `<file_id>.pdf` when absent.
pub fn output_name(served: Option<&str>, file_id: &str, prefix: &str) -> String {
    let fallback = format!("{file_id}.pdf");
    let served = served.filter(|s| !s.is_empty()).unwrap_or(&fallback);
    if prefix.is_empty() {
        return safe_filename(served);
    }
    let (base, ext) = split_ext(served);
    let ext = if ext.is_empty() { ".pdf" } else { ext };
    format!("{}__{}{ext}", safe_filename(prefix), safe_filename(base))
}

/// Prefix for bulk downloads: `<siren>_<DATATYPE>`, numbered in all-files mode
pub fn bulk_prefix(siren: &str, file: &PickedFile, index: usize, numbered: bool) -> String {
    if numbered {
        format!("{siren}_{}_{index:02}", file.datatype)
    } else {
        format!("{siren}_{}", file.datatype)
    }
}

/// Prefix for CSV-driven downloads: `SIREN__ACT__DATE__TITLE`, empty parts omitted
pub fn act_prefix(siren: &str, date: &str, title: &str) -> String {
    let date = date.replace('/', "-").replace(' ', "_");
    [siren, "ACT", date.as_str(), title]
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| safe_filename(p))
        .collect::<Vec<_>>()
        .join("__")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn safe_filename_collapses_runs() {
        assert_eq!(safe_filename("Statuts à jour / 2021"), "Statuts_à_jour_2021");
        assert_eq!(safe_filename("a:b?c.pdf"), "a_b_c.pdf");
        assert_eq!(safe_filename(&"x".repeat(300)).len(), 200);
    }

    #[test]
    fn picks_first_allowed_only() {
        let files = vec![
            json!({"id": "f0", "datatype": "BALANCE_SHEET"}),
            json!({"id": "f1", "datatype": "act"}),
            json!({"id": "f2", "datatype": "LEGAL_NOTICE"}),
        ];
        let picked = pick_files(&files, &Config::default());
        assert_eq!(
            picked,
            vec![PickedFile {
                id: "f1".into(),
                datatype: "ACT".into()
            }]
        );
    }

    #[test]
    fn datatype_must_match_whole_code() {
        let files = vec![
            json!({"id": "f0", "datatype": "ACTS"}),
            json!({"id": "f1", "datatype": "LEGAL_NOTICE_DRAFT"}),
            json!({"id": "f2", "datatype": "Legal_Notice"}),
        ];
        let picked = pick_files(&files, &Config::default());
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, "f2");
        assert_eq!(picked[0].datatype, "LEGAL_NOTICE");
    }

    #[test]
    fn empty_allowed_set_keeps_everything() {
        let files = vec![json!({"id": "f0", "datatype": "BALANCE_SHEET"})];
        let config = Config {
            allowed_datatypes: Default::default(),
            ..Default::default()
        };
        assert_eq!(pick_files(&files, &config)[0].datatype, "BALANCE_SHEET");
    }

    #[test]
    fn all_files_caps_at_max() {
        let files: Vec<_> = (0..5)
            .map(|i| json!({"file_id": i, "data_type": "ACT"}))
            .collect();
        let config = Config {
            all_files: true,
            max_files_per_user: 3,
            ..Default::default()
        };
        let picked = pick_files(&files, &config);
        assert_eq!(picked.len(), 3);
        assert_eq!(picked[2].id, "2");
    }

    #[test]
    fn missing_datatype_kept_as_unknown_and_missing_id_skipped() {
        let files = vec![json!({"datatype": "ACT"}), json!({"uuid": "u-1"})];
        let picked = pick_files(&files, &Config::default());
        assert_eq!(picked[0].id, "u-1");
        assert_eq!(picked[0].datatype, UNKNOWN_DATATYPE);
    }

    #[test]
    fn output_name_with_prefix() {
        assert_eq!(
            output_name(Some("statuts v2.pdf"), "f1", "552100554_ACT"),
            "552100554_ACT__statuts_v2.pdf"
        );
        assert_eq!(output_name(None, "f1", "552100554_ACT"), "552100554_ACT__f1.pdf");
        assert_eq!(output_name(Some("kbis"), "f1", "p"), "p__kbis.pdf");
        assert_eq!(output_name(None, "f1", ""), "f1.pdf");
    }

    #[test]
    fn prefixes() {
        let file = PickedFile {
            id: "f".into(),
            datatype: "ACT".into(),
        };
        assert_eq!(bulk_prefix("552100554", &file, 3, true), "552100554_ACT_03");
        assert_eq!(bulk_prefix("552100554", &file, 1, false), "552100554_ACT");
        assert_eq!(
            act_prefix("552100554", "2021/03/04", "Statuts mis à jour"),
            "552100554__ACT__2021-03-04__Statuts_mis_à_jour"
        );
        assert_eq!(act_prefix("", "", ""), "ACT");
    }
}
