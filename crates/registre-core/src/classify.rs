//! Keyword scoring of extracted page text.
//!
//! Flags pages that look like bank deposit certificates ("attestation de
//! dépôt des fonds", "certificat de dépôt") among the pages of a filing.
//! Text extraction itself happens upstream; input is plain text with one
//! `===== Page N =====` marker per page, or form-feed separated pages.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::filter::normalize;

pub const CORE_PHRASES: &[&str] = &[
    "certificat de depot",
    "certificat de depot negociable",
    "attestation de depot de fonds",
    "attestation de depot",
    "attestation bancaire",
    "attestation de blocage du capital",
    "attestation de blocage",
    "depot de capital",
    "depot du capital",
];

pub const KEYWORDS: &[&str] = &[
    "banque", "etablissement", "agence", "guichet", "adresse", "cedex",
    "compte special", "numero de compte", "compte n", "iban", "bic", "swift", "rib",
    "somme", "montant verse", "versement", "deposant", "mandataire", "signature",
    "rcs", "registre du commerce", "kbis", "greffe",
    "date de valeur", "date d'emission", "certificat d'immatriculation", "blocage", "bloquee",
    "taux", "rendement", "echeance", "maturite", "nominal", "emission",
];

/// Statute and legal-code vocabulary
pub const NEGATIVE_KEYWORDS: &[&str] = &[
    "statuts", "extrait des statuts", "statut",
    "article", "art.", "chapitre", "titre", "section", "clause",
];

const CORE_HIT_POINTS: i32 = 3;
const KEYWORD_POINTS: i32 = 1;
const NEGATIVE_POINTS: i32 = -1;
const KEEP_THRESHOLD: i32 = 4;
const SNIPPET_CHARS: usize = 180;

static PAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^=+\s*Page\s+(\d+)\s*=+\s*$").expect("valid regex"));

/// Score of one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageScore {
    pub score: i32,
    pub core_hits: usize,
    pub kw_hits: usize,
    pub neg_hits: usize,
}

impl PageScore {
    pub fn keep(&self) -> bool {
        self.score >= KEEP_THRESHOLD || (self.core_hits > 0 && self.kw_hits >= 1)
    }
}

pub fn score_page(text: &str) -> PageScore {
    let t = normalize(text);
    let count = |list: &[&str]| list.iter().filter(|p| t.contains(**p)).count();
    let core_hits = count(CORE_PHRASES);
    let kw_hits = count(KEYWORDS);
    let neg_hits = count(NEGATIVE_KEYWORDS);
    let score = core_hits as i32 * CORE_HIT_POINTS
        + kw_hits as i32 * KEYWORD_POINTS
        + neg_hits as i32 * NEGATIVE_POINTS;
    PageScore {
        score,
        core_hits,
        kw_hits,
        neg_hits,
    }
}

/// Split extracted text into `(page_number, text)` pairs.
///
/// Marker numbers are kept as written. Without markers, pages are split on
/// form feeds and numbered from 1.
pub fn split_pages(content: &str) -> Vec<(usize, String)> {
    let markers: Vec<_> = PAGE_MARKER.captures_iter(content).collect();
    if markers.is_empty() {
        return content
            .split('\u{c}')
            .enumerate()
            .filter(|(_, t)| !t.trim().is_empty())
            .map(|(i, t)| (i + 1, t.to_string()))
            .collect();
    }
    let mut pages = Vec::with_capacity(markers.len());
    for (idx, caps) in markers.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        let number = caps
            .get(1)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(idx + 1);
        let end = markers
            .get(idx + 1)
            .and_then(|c| c.get(0))
            .map_or(content.len(), |m| m.start());
        pages.push((number, content[whole.end()..end].trim().to_string()));
    }
    pages
}

/// One audit CSV row
#[derive(Debug, Clone, Serialize)]
pub struct AuditRow {
    pub page: usize,
    pub score: i32,
    pub core_hits: usize,
    pub kw_hits: usize,
    pub decision: &'static str,
    pub snippet: String,
}

pub fn classify_pages(content: &str) -> Vec<AuditRow> {
    split_pages(content)
        .into_iter()
        .map(|(page, text)| {
            let s = score_page(&text);
            AuditRow {
                page,
                score: s.score,
                core_hits: s.core_hits,
                kw_hits: s.kw_hits,
                decision: if s.keep() { "keep" } else { "other" },
                snippet: normalize(&text).chars().take(SNIPPET_CHARS).collect(),
            }
        })
        .collect()
}

pub fn write_audit(path: &Path, rows: &[AuditRow]) -> csv::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
