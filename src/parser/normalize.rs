use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use scraper::Html;

use crate::config::ScaleTable;

static FIRST_INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static TAG_STRIP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([0-9]+(?:\.[0-9]+)?)\s*(TB|GB|MB)$").unwrap());
static CONTEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+(?:\.[0-9]+)?)([KMG]?)$").unwrap());
static PARAM_SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(e?\d+(?:\.\d+)?[bm]|\d+x\d+b)").unwrap());

static PAREN_EDITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(([^)]*?(?:Edition|Ed\.|Ed)\b[^)]*)\)").unwrap());
static ORDINAL_EDITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+(?:st|nd|rd|th)\s+Edition)\b").unwrap());
static WORD_EDITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(First|Second|Third|Fourth|Fifth|Sixth|Seventh|Eighth|Ninth|Tenth)\s+Edition\b")
        .unwrap()
});
static TRAILING_SEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-,:|\u{2014}\u{2013}]\s*$").unwrap());
static TIME_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(?:-|–|—|−|to)\s*").unwrap());
static NOON_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bNoon\b").unwrap());
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4})\b").unwrap());
static MONTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(January|Jan|February|Feb|March|Mar|April|Apr|May|June|Jun|July|Jul|August|Aug|September|Sept|Sep|October|Oct|November|Nov|December|Dec)\b",
    )
    .unwrap()
});
static MONTH_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][a-z]+) (\d{4})\b").unwrap());
static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+h(?:\s*\d+m)?|\d+m)\b").unwrap());

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const ORDINALS: [&str; 14] = [
    "first",
    "second",
    "third",
    "fourth",
    "fifth",
    "sixth",
    "seventh",
    "eighth",
    "ninth",
    "tenth",
    "eleventh",
    "twelfth",
    "thirteenth",
    "fourteenth",
];

// ── Shared ──

/// Shorthand count ("1.2K", "3M", "450 reviews") → integer. Unparsable → 0.
///
/// Decimal arithmetic is exact and truncates, so "1.2K" is 1200.
pub fn parse_count(text: &str, scale: &ScaleTable) -> u64 {
    if text.trim().is_empty() {
        return 0;
    }
    let pattern = format!(r"(\d+)(?:\.(\d+))?([{}])", regex::escape(&scale.suffixes()));
    if let Some(caps) = Regex::new(&pattern).ok().and_then(|re| re.captures(text)) {
        let suffix = caps[3].chars().next().unwrap_or_default();
        if let Some(mult) = scale.multiplier(suffix) {
            let whole: u64 = caps[1].parse().unwrap_or(0);
            let frac = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            return scaled(whole, frac, mult);
        }
    }
    FIRST_INT_RE
        .captures(text)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0)
}

fn scaled(whole: u64, frac: &str, mult: u64) -> u64 {
    let mut value = whole.saturating_mul(mult);
    let mut place = mult;
    for digit in frac.chars().filter_map(|c| c.to_digit(10)) {
        place /= 10;
        if place == 0 {
            break;
        }
        value = value.saturating_add(u64::from(digit) * place);
    }
    value
}

/// "Beginner · Course · 3 hours" → ("Beginner", "Course", "3 hours").
pub fn split_metadata(text: &str) -> (String, String, String) {
    let mut parts = text
        .split('·')
        .map(|p| p.trim().to_string());
    (
        parts.next().unwrap_or_default(),
        parts.next().unwrap_or_default(),
        parts.next().unwrap_or_default(),
    )
}

pub fn strip_prefix_label(text: &str, label: &str) -> String {
    let text = text.trim();
    text.strip_prefix(label).unwrap_or(text).trim().to_string()
}

/// `label` when `needle` occurs (case-sensitive), else "-".
pub fn flag(text: &str, needle: &str, label: &str) -> String {
    if text.contains(needle) {
        label.to_string()
    } else {
        "-".to_string()
    }
}

/// Decode entities and collapse whitespace.
pub fn clean_text(text: &str) -> String {
    let decoded = if text.contains('&') {
        Html::parse_fragment(text).root_element().text().collect::<String>()
    } else {
        text.to_string()
    };
    WS_RE.replace_all(&decoded, " ").trim().to_string()
}

pub fn strip_tags(text: &str) -> String {
    TAG_STRIP_RE.replace_all(text, " ").into_owned()
}

// ── Ollama ──

/// "4.7GB" → 4.7, "800MB" → 0.78125. `None` when absent or unparsable.
pub fn parse_size_gb(text: &str) -> Option<f64> {
    let s = text.trim();
    if s.is_empty() || s == "-" {
        return None;
    }
    let caps = SIZE_RE.captures(s)?;
    let value: f64 = caps[1].parse().ok()?;
    match caps[2].to_uppercase().as_str() {
        "MB" => Some(value / 1024.0),
        "TB" => Some(value * 1024.0),
        _ => Some(value),
    }
}

/// "128K" → 128000, "1M" → 1000000. `None` when unparsable.
pub fn parse_context_tokens(text: &str) -> Option<u64> {
    let upper = text.trim().to_uppercase();
    let caps = CONTEXT_RE.captures(&upper)?;
    let mult: u64 = match &caps[2] {
        "" => 1,
        "K" => 1_000,
        "M" => 1_000_000,
        "G" => 1_000_000_000,
        _ => return None,
    };
    let mut parts = caps[1].splitn(2, '.');
    let whole: u64 = parts.next()?.parse().ok()?;
    Some(scaled(whole, parts.next().unwrap_or(""), mult))
}

/// Parameter size from the tag part of "model:tag", lowercased.
pub fn param_size_from_version(model_version: &str) -> String {
    let Some((_, tag)) = model_version.split_once(':') else {
        return String::new();
    };
    PARAM_SIZE_RE
        .captures(tag)
        .map(|c| c[1].to_lowercase())
        .unwrap_or_default()
}

// ── O'Reilly ──

/// Remove an edition marker from a title. Returns (title, raw edition).
pub fn split_edition(title: &str) -> (String, Option<String>) {
    if title.is_empty() {
        return (String::new(), None);
    }
    let (mut cleaned, edition) = if let Some(caps) = PAREN_EDITION_RE.captures(title) {
        let edition = caps[1].trim().to_string();
        (title.replacen(&caps[0], "", 1).trim().to_string(), Some(edition))
    } else if let Some(caps) = ORDINAL_EDITION_RE
        .captures(title)
        .or_else(|| WORD_EDITION_RE.captures(title))
    {
        let edition = caps[1].trim().to_string();
        (title.replacen(&caps[0], "", 1).trim().to_string(), Some(edition))
    } else {
        (title.to_string(), None)
    };
    cleaned = TRAILING_SEP_RE.replace(&cleaned, "").trim().to_string();
    (cleaned, edition)
}

/// "2nd Edition" → "2", "Second Edition" → "2".
pub fn edition_number(edition: &str) -> Option<String> {
    let s = edition.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(caps) = FIRST_INT_RE.captures(s) {
        return caps[1].parse::<u32>().ok().map(|n| n.to_string());
    }
    let key: String = s
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase())
        .collect();
    let key = key.strip_suffix("edition").unwrap_or(&key);
    ORDINALS
        .iter()
        .position(|o| *o == key)
        .map(|i| (i + 1).to_string())
}

/// "7am-11am" → (Some("7am"), Some("11am")).
pub fn split_time_range(text: &str) -> (Option<String>, Option<String>) {
    let s = text.trim();
    if s.is_empty() {
        return (None, None);
    }
    let parts: Vec<&str> = TIME_SPLIT_RE.split(s).collect();
    let non_empty = |p: &str| {
        let p = p.trim();
        (!p.is_empty()).then(|| p.to_string())
    };
    if parts.len() == 1 {
        return (Some(parts[0].trim().to_string()), None);
    }
    (non_empty(parts[0]), non_empty(parts[1]))
}

pub fn normalize_noon(text: &str) -> String {
    NOON_RE.replace_all(text, "12pm").into_owned()
}

pub fn has_year(text: &str) -> bool {
    YEAR_RE.is_match(text)
}

pub fn year_of(text: &str) -> Option<String> {
    YEAR_RE.captures(text).map(|c| c[1].to_string())
}

/// First month token as written, e.g. "Nov" or "November".
pub fn month_token(text: &str) -> Option<String> {
    MONTH_RE.captures(text).map(|c| c[1].to_string())
}

fn month_number(token: &str) -> Option<u32> {
    let key = token.get(..3)?.to_lowercase();
    MONTHS.iter().position(|m| *m == key).map(|i| i as u32 + 1)
}

/// Append the year of the next occurrence of the date's month.
///
/// A month at or after `today`'s month is this year, earlier months roll over.
pub fn infer_year(date: &str, today: NaiveDate) -> String {
    if has_year(date) {
        return date.to_string();
    }
    let Some(month) = month_token(date).as_deref().and_then(month_number) else {
        return date.to_string();
    };
    let year = if month >= today.month() {
        today.year()
    } else {
        today.year() + 1
    };
    format!("{}, {}", date.trim(), year)
}

/// First "Month YYYY" in meta text, abbreviated: "December 2023" → "Dec 2023".
pub fn release_month(meta: &str) -> Option<String> {
    let caps = MONTH_YEAR_RE.captures(meta)?;
    let name = &caps[1];
    let abbr = match month_number(name) {
        Some(n) if name.len() >= 3 => {
            let m = MONTHS[n as usize - 1];
            let mut chars = m.chars();
            chars
                .next()
                .map(|c| c.to_ascii_uppercase().to_string() + chars.as_str())
                .unwrap_or_default()
        }
        _ => name.chars().take(3).collect(),
    };
    Some(format!("{} {}", abbr, &caps[2]))
}

pub fn duration_from_meta(meta: &str) -> Option<String> {
    DURATION_RE.captures(meta).map(|c| c[1].to_string())
}

/// Day numbers in a schedule date, excluding the year.
pub fn day_numbers(date: &str) -> Vec<u32> {
    static DAY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{1,2})\b").unwrap());
    DAY_RE
        .captures_iter(date)
        .filter_map(|c| c[1].parse().ok())
        .collect()
}
