//! Text patterns for identity claims and knowledge-cutoff statements.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

const MODEL_NAME_PATTERN: &str = concat!(
    r"(?i)\b(",
    r"claude[- ]?\d[\w.\-]*(?:[- ](?:opus|sonnet|haiku)\b[\w.\-]*)?",
    r"|claude[- ](?:opus|sonnet|haiku)\b(?:[- ]\d[\w.\-]*)?",
    r"|(?:opus|sonnet|haiku)[- ]\d[\w.\-]*",
    r"|gpt[- ]?\d[\w.\-]*",
    r"|gemini[- ](?:\d[\w.\-]*|pro\b[\w.\-]*|ultra\b[\w.\-]*|flash\b[\w.\-]*|nano\b[\w.\-]*)",
    r"|llama[- ]?\d[\w.\-]*",
    r"|mistral(?:[- ](?:large|medium|small|tiny|\d)[\w.\-]*)?",
    r"|kimi(?:[- ]k?\d[\w.\-]*)?",
    r"|command[- ]r\b(?:\+|[- ]plus\b)?",
    r")",
);

const CUTOFF_PATTERN: &str = concat!(
    r"(?i)\b(?:cut-?off|knowledge|training)[\s\w:,'’]{0,60}?\b(?:",
    r"(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{4})",
    r"|(\d{4})[-/](\d{2})(?:[-/]\d{2})?",
    r")",
);

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!(error = %e, "failed to compile fingerprint pattern");
            None
        }
    })
    .as_ref()
}

fn model_name_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&CELL, MODEL_NAME_PATTERN)
}

fn cutoff_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&CELL, CUTOFF_PATTERN)
}

/// Lowercase a matched claim and strip trailing punctuation.
pub fn normalize_claim(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(|c: char| !c.is_alphanumeric() && c != '+')
        .to_lowercase()
}

/// Add every model identifier mentioned in `text` to `claims`.
pub fn collect_identity_claims(text: &str, claims: &mut BTreeMap<String, usize>) {
    let Some(re) = model_name_regex() else {
        return;
    };
    for m in re.find_iter(text) {
        let claim = normalize_claim(m.as_str());
        if !claim.is_empty() {
            *claims.entry(claim).or_insert(0) += 1;
        }
    }
}

/// Knowledge-cutoff dates mentioned in `text`, normalized to `YYYY-MM`.
pub fn extract_cutoffs(text: &str) -> Vec<String> {
    let Some(re) = cutoff_regex() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|caps| {
            if let (Some(month), Some(year)) = (caps.get(1), caps.get(2)) {
                let name = month.as_str().to_lowercase();
                let idx = MONTHS.iter().position(|m| *m == name)?;
                return Some(format!("{}-{:02}", year.as_str(), idx + 1));
            }
            let year = caps.get(3)?.as_str();
            let month: u32 = caps.get(4)?.as_str().parse().ok()?;
            (1..=12)
                .contains(&month)
                .then(|| format!("{year}-{month:02}"))
        })
        .collect()
}
