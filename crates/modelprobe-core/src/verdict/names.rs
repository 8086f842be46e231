//! Fuzzy matching between a requested model name and a claimed one.
//!
//! Names are split into lowercase tokens on non-alphanumerics and on
//! letter/digit boundaries, so `"Opus 4.6"`, `"opus-4-6"` and `"Opus4.6"`
//! tokenize identically. Snapshot dates take no part in matching: digit runs
//! of six or more characters (`20241022`) and dashed dates (`2024-08-06`,
//! `2024-08`, a bare `2024`).

const VENDOR_WORDS: [&str; 12] = [
    "claude",
    "anthropic",
    "gpt",
    "chatgpt",
    "openai",
    "gemini",
    "google",
    "llama",
    "meta",
    "mistral",
    "kimi",
    "command",
];

/// Release-channel and size words (`70b`) that never distinguish two models.
const NEUTRAL_WORDS: [&str; 7] = ["latest", "preview", "instruct", "chat", "model", "v", "b"];

#[derive(Debug, Default, PartialEq, Eq)]
struct NameTokens {
    vendors: Vec<String>,
    families: Vec<String>,
    digits: Vec<String>,
}

fn split(name: &str) -> Vec<String> {
    let mut raw = Vec::new();
    let mut current = String::new();
    let mut prev_digit: Option<bool> = None;
    for c in name.chars().flat_map(char::to_lowercase) {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                raw.push(std::mem::take(&mut current));
            }
            prev_digit = None;
            continue;
        }
        let is_digit = c.is_ascii_digit();
        if prev_digit.is_some_and(|p| p != is_digit) && !current.is_empty() {
            raw.push(std::mem::take(&mut current));
        }
        current.push(c);
        prev_digit = Some(is_digit);
    }
    if !current.is_empty() {
        raw.push(current);
    }
    raw
}

fn is_digits(token: &str) -> bool {
    token.chars().all(|c| c.is_ascii_digit())
}

fn is_year(token: &str) -> bool {
    token.len() == 4 && is_digits(token) && token.starts_with("20")
}

fn tokenize(name: &str) -> NameTokens {
    let raw = split(name);
    let mut tokens = NameTokens::default();
    let mut i = 0;
    while i < raw.len() {
        let t = &raw[i];
        i += 1;
        if is_year(t) {
            // month and day that follow the year
            let mut rest = 0;
            while rest < 2 && i < raw.len() && raw[i].len() == 2 && is_digits(&raw[i]) {
                i += 1;
                rest += 1;
            }
            continue;
        }
        if is_digits(t) {
            if t.len() < 6 {
                tokens.digits.push(t.clone());
            }
        } else if VENDOR_WORDS.contains(&t.as_str()) {
            tokens.vendors.push(t.clone());
        } else if !NEUTRAL_WORDS.contains(&t.as_str()) {
            tokens.families.push(t.clone());
        }
    }
    tokens
}

fn contains_run(haystack: &[String], needle: &[String]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

/// Whether `claimed` plausibly names the model `requested`.
pub fn names_match(requested: &str, claimed: &str) -> bool {
    let req = tokenize(requested);
    let claim = tokenize(claimed);

    if req.families.is_empty() && req.vendors.is_empty() && req.digits.is_empty() {
        return false;
    }

    if req.families.is_empty() {
        if !req.vendors.is_empty() && !req.vendors.iter().any(|v| claim.vendors.contains(v)) {
            return false;
        }
        // `gpt-4` is not `gpt-4o` or `gpt-4-mini`
        if !claim.families.is_empty() {
            return false;
        }
    } else if !req.families.iter().all(|f| claim.families.contains(f)) {
        return false;
    }

    if !req.digits.is_empty() && !claim.digits.is_empty() {
        return contains_run(&claim.digits, &req.digits);
    }
    true
}

/// Whether `claimed` matches any of `accepted`.
pub fn matches_any<'a>(mut accepted: impl Iterator<Item = &'a str>, claimed: &str) -> bool {
    accepted.any(|name| names_match(name, claimed))
}
