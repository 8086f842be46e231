//! Surface statistics over response texts: style ratios, vocabulary and
//! formatting markers.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Number of most frequent terms kept in a vocabulary profile.
pub const TOP_TERMS: usize = 50;

const HEDGING_PHRASES: [&str; 6] = [
    "perhaps",
    "maybe",
    "might",
    "could be",
    "it's possible",
    "arguably",
];

const CONFIDENCE_PHRASES: [&str; 5] = [
    "certainly",
    "definitely",
    "absolutely",
    "clearly",
    "obviously",
];

struct Patterns {
    markdown: Regex,
    bullet: Regex,
    numbered: Regex,
    greeting: Regex,
    closing_offer: Regex,
    heading: Regex,
    table_row: Regex,
    word: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static CELL: OnceLock<Option<Patterns>> = OnceLock::new();
    CELL.get_or_init(|| {
        let build = || -> Result<Patterns, regex::Error> {
            Ok(Patterns {
                markdown: Regex::new(r"[#*`\-|]")?,
                bullet: Regex::new(r"(?m)^[ \t]*[-*•]")?,
                numbered: Regex::new(r"(?m)^[ \t]*\d+[.)]\s")?,
                greeting: Regex::new(r"^(?:Hi|Hello|Hey|Sure|Of course|Great|Certainly)")?,
                closing_offer: Regex::new(
                    r"(?i)(?:let me know|feel free|happy to help|hope this helps|any questions)\s*[.!?]?\s*$",
                )?,
                heading: Regex::new(r"(?m)^[ ]{0,3}#{1,6}\s")?,
                table_row: Regex::new(r"(?m)^[ \t]*\|.*\|[ \t]*$")?,
                word: Regex::new(r"\b[a-zA-Z]+\b")?,
            })
        };
        match build() {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::error!(error = %e, "failed to compile style patterns");
                None
            }
        }
    })
    .as_ref()
}

/// Per-response averages and ratios. Ratios are the share of responses that
/// show the feature, in `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct StyleVector {
    pub avg_char_length: f64,
    pub avg_word_count: f64,
    pub markdown_ratio: f64,
    pub bullet_list_ratio: f64,
    pub numbered_list_ratio: f64,
    pub code_block_ratio: f64,
    pub greeting_ratio: f64,
    pub closing_offer_ratio: f64,
    pub hedging_ratio: f64,
    pub confidence_ratio: f64,
    pub avg_paragraph_count: f64,
}

impl StyleVector {
    /// Features in a fixed order, for element-wise comparison.
    pub fn features(&self) -> [f64; 11] {
        [
            self.avg_char_length,
            self.avg_word_count,
            self.markdown_ratio,
            self.bullet_list_ratio,
            self.numbered_list_ratio,
            self.code_block_ratio,
            self.greeting_ratio,
            self.closing_offer_ratio,
            self.hedging_ratio,
            self.confidence_ratio,
            self.avg_paragraph_count,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TermCount {
    pub term: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Vocabulary {
    pub total_words: usize,
    pub unique_words: usize,
    /// `unique_words / total_words`, 0 when there are no words.
    pub type_token_ratio: f64,
    /// Frequency descending, ties broken lexicographically.
    pub top_terms: Vec<TermCount>,
}

/// Raw formatting marker totals across all responses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FormattingMarkers {
    pub bullet_lines: usize,
    pub numbered_lines: usize,
    pub code_fences: usize,
    pub headings: usize,
    pub table_rows: usize,
}

fn ratio(hits: usize, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        hits as f64 / n as f64
    }
}

fn contains_any(text: &str, phrases: &[&str]) -> bool {
    let lower = text.to_lowercase();
    phrases.iter().any(|p| lower.contains(p))
}

fn share(texts: &[&str], pred: impl Fn(&str) -> bool) -> f64 {
    ratio(texts.iter().filter(|t| pred(t)).count(), texts.len())
}

pub fn style(texts: &[&str]) -> StyleVector {
    let Some(p) = patterns() else {
        return StyleVector::default();
    };
    let n = texts.len();
    if n == 0 {
        return StyleVector::default();
    }

    let chars: usize = texts.iter().map(|t| t.chars().count()).sum();
    let words: usize = texts.iter().map(|t| t.split_whitespace().count()).sum();
    let paragraphs: usize = texts.iter().map(|t| t.matches("\n\n").count() + 1).sum();

    StyleVector {
        avg_char_length: ratio(chars, n),
        avg_word_count: ratio(words, n),
        markdown_ratio: share(texts, |t| p.markdown.is_match(t)),
        bullet_list_ratio: share(texts, |t| p.bullet.is_match(t)),
        numbered_list_ratio: share(texts, |t| p.numbered.is_match(t)),
        code_block_ratio: share(texts, |t| t.contains("```")),
        greeting_ratio: share(texts, |t| p.greeting.is_match(t)),
        closing_offer_ratio: share(texts, |t| p.closing_offer.is_match(t)),
        hedging_ratio: share(texts, |t| contains_any(t, &HEDGING_PHRASES)),
        confidence_ratio: share(texts, |t| contains_any(t, &CONFIDENCE_PHRASES)),
        avg_paragraph_count: ratio(paragraphs, n),
    }
}

pub fn vocabulary(texts: &[&str]) -> Vocabulary {
    let Some(p) = patterns() else {
        return Vocabulary::default();
    };
    let mut freq: HashMap<String, usize> = HashMap::new();
    let mut total = 0usize;
    for text in texts {
        for m in p.word.find_iter(text) {
            total += 1;
            *freq.entry(m.as_str().to_lowercase()).or_insert(0) += 1;
        }
    }

    let unique = freq.len();
    let mut terms: Vec<TermCount> = freq
        .into_iter()
        .map(|(term, count)| TermCount { term, count })
        .collect();
    terms.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
    terms.truncate(TOP_TERMS);

    Vocabulary {
        total_words: total,
        unique_words: unique,
        type_token_ratio: ratio(unique, total),
        top_terms: terms,
    }
}

pub fn formatting(texts: &[&str]) -> FormattingMarkers {
    let Some(p) = patterns() else {
        return FormattingMarkers::default();
    };
    texts.iter().fold(FormattingMarkers::default(), |acc, t| FormattingMarkers {
        bullet_lines: acc.bullet_lines + p.bullet.find_iter(t).count(),
        numbered_lines: acc.numbered_lines + p.numbered.find_iter(t).count(),
        code_fences: acc.code_fences + t.matches("```").count(),
        headings: acc.headings + p.heading.find_iter(t).count(),
        table_rows: acc.table_rows + p.table_row.find_iter(t).count(),
    })
}
