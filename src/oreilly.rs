use std::io::Write;
use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use clap::ValueEnum;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::FetchConfig;
use crate::error::ScrapeError;
use crate::fetch::{is_url, read_local, HttpFetcher};
use crate::parser::normalize::{
    day_numbers, duration_from_meta, edition_number, infer_year, month_token, normalize_noon,
    release_month, split_edition, split_time_range, strip_prefix_label, year_of,
};
use crate::parser::rules::{FieldRule, RawRecord, RuleSet};
use crate::sink::{hyperlink, write_csv, write_json, Tabular};

const CARD_CONTAINER: &str = r#"article[data-testid^="search-card-"]"#;
const FETCHED_PAGE: &str = "fetched_search.html";
const OREILLY_PUBLISHER: &str = "O'Reilly Media, Inc.";

pub const COLUMNS: &[&str] = &[
    "publisher",
    "title",
    "edition",
    "format",
    "quiz",
    "release",
    "duration",
    "schedule_date",
    "start_time",
    "end_time",
    "url",
    "authors",
];

const CARD_RULES: &[FieldRule] = &[
    FieldRule::text("title", r#"[data-testid^="title-link-"] a"#),
    FieldRule::attr("href", r#"[data-testid^="title-link-"] a"#, "href"),
    FieldRule::text("title_box", r#"[data-testid^="title-link-"]"#),
    FieldRule::text("h3_title", "h3 a"),
    FieldRule::attr("h3_href", "h3 a", "href"),
    FieldRule::all("authors", r#"[data-testid^="search-card-authors-"] a"#),
    FieldRule::spaced(
        "description",
        r#"[data-testid^="search-card-description-"] .orm-ff-Description-Description"#,
    ),
    FieldRule::spaced("description_box", r#"[data-testid^="search-card-description-"]"#),
    FieldRule::spaced(
        "format",
        r#"[data-testid^="search-card-content-level-"] [data-testid^="format-label-"]"#,
    )
    .cleanup(strip_format_label),
    FieldRule::attr("cover", r#"[data-testid^="search-card-cover-image-"] img"#, "src"),
    FieldRule::attr("product_id", "button[data-product-id]", "data-product-id"),
    FieldRule::spaced("schedule", r#"[data-testid^="upcoming-events-"] li"#),
    FieldRule::text(
        "publisher",
        r#"[data-testid^="search-card-meta-content-"] a[href*="/publisher/"]"#,
    ),
    FieldRule::spaced("meta", r#"[data-testid^="search-card-meta-content-"]"#),
    FieldRule::exists("quiz", r#"[data-testid^="includes-quizzes-"]"#),
];

fn strip_format_label(text: &str) -> String {
    strip_prefix_label(text, "Format:")
}

/// One search result. Multi-day events become one item per day.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LearningItem {
    pub publisher: Option<String>,
    pub title: String,
    pub edition: Option<String>,
    pub format: Option<String>,
    pub quiz: bool,
    pub release: Option<String>,
    pub duration: Option<String>,
    pub schedule_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub url: String,
    pub authors: Vec<String>,
    pub product_id: Option<String>,
    pub cover: Option<String>,
    pub description: String,
}

impl Tabular for LearningItem {
    fn cell(&self, column: &str) -> Option<String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        let value = match column {
            "publisher" => opt(&self.publisher),
            "title" => self.title.clone(),
            "edition" => opt(&self.edition),
            "format" => opt(&self.format),
            "quiz" => (if self.quiz { "yes" } else { "" }).to_string(),
            "release" => opt(&self.release),
            "duration" => opt(&self.duration),
            "schedule_date" => opt(&self.schedule_date),
            "start_time" => opt(&self.start_time),
            "end_time" => opt(&self.end_time),
            "url" => hyperlink(&self.url, self.publisher.as_deref().unwrap_or("")),
            "authors" => self.authors.join(", "),
            _ => return None,
        };
        Some(value)
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn items_from_raw(raw: &RawRecord, today: NaiveDate) -> Vec<LearningItem> {
    let get = |field: &str| raw.get(field).map(String::as_str).unwrap_or("");

    let has_title_box = !get("title_box").is_empty() || !get("title").is_empty();
    let (title, url) = if has_title_box {
        let title = if get("title").is_empty() { get("title_box") } else { get("title") };
        (title, get("href"))
    } else {
        (get("h3_title"), get("h3_href"))
    };
    let (title, edition) = split_edition(title);
    let edition = edition.as_deref().and_then(edition_number);

    let description = match get("description") {
        "" => get("description_box"),
        d => d,
    };
    let publisher = non_empty(get("publisher")).map(|p| {
        if p == OREILLY_PUBLISHER {
            "O'Reilly".to_string()
        } else {
            p
        }
    });

    let (schedule_date, raw_time) = match get("schedule") {
        "" => (None, None),
        s => match s.split_once('•') {
            Some((date, time)) => (non_empty(date), non_empty(time).map(|t| normalize_noon(&t))),
            None => (non_empty(s), None),
        },
    };
    let schedule_date = schedule_date.map(|d| infer_year(&d, today));
    let (start_time, end_time) = raw_time
        .as_deref()
        .map(split_time_range)
        .unwrap_or((None, None));

    let meta = get("meta");
    let (release, duration) = if schedule_date.is_none() && !meta.is_empty() {
        (release_month(meta), duration_from_meta(meta))
    } else {
        (None, None)
    };

    let base = LearningItem {
        publisher,
        title: title.clone(),
        edition,
        format: non_empty(get("format")),
        quiz: get("quiz") == "true",
        release,
        duration,
        schedule_date: schedule_date.clone(),
        start_time,
        end_time,
        url: url.to_string(),
        authors: get("authors")
            .split(" | ")
            .filter_map(non_empty)
            .collect(),
        product_id: non_empty(get("product_id")),
        cover: non_empty(get("cover")),
        description: description.to_string(),
    };

    let Some(date) = schedule_date else {
        return vec![base];
    };
    let days = day_numbers(&date);
    if days.len() <= 1 {
        return vec![base];
    }
    let month = month_token(&date).unwrap_or_default();
    let year = year_of(&date);
    days.iter()
        .enumerate()
        .map(|(i, day)| {
            let mut date = format!("{month} {day}");
            if let Some(year) = &year {
                date = format!("{date}, {year}");
            }
            LearningItem {
                title: if title.is_empty() {
                    title.clone()
                } else {
                    format!("{title} (Day {})", i + 1)
                },
                schedule_date: Some(date),
                ..base.clone()
            }
        })
        .collect()
}

/// Parse a saved or fetched search page. Dates without a year are resolved against `today`.
pub fn parse_search_html(html: &str, today: NaiveDate) -> Result<Vec<LearningItem>> {
    let rules = RuleSet::compile(CARD_CONTAINER, CARD_RULES)?;
    let raw = match rules.extract(html) {
        Ok(raw) => raw,
        Err(e @ ScrapeError::DocumentFormat { .. }) => {
            warn!(error = %e, "no search cards");
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };
    info!(cards = raw.len(), "found search cards");
    Ok(raw.iter().flat_map(|r| items_from_raw(r, today)).collect())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

pub struct OreillyRun<'a> {
    pub source: &'a str,
    pub format: OutputFormat,
    pub outfile: Option<&'a Path>,
}

/// Load the search page from a URL or a local file.
async fn load_source(source: &str, fetch: &FetchConfig) -> Result<String> {
    if !is_url(source) {
        return Ok(read_local(Path::new(source))?);
    }
    println!("Fetching and parsing from URL");
    let html = HttpFetcher::new(fetch)?.fetch(source).await?;
    if let Err(e) = std::fs::write(FETCHED_PAGE, &html) {
        warn!(path = FETCHED_PAGE, error = %e, "could not save fetched page");
    }
    Ok(html)
}

/// Parse and emit json/csv. Text rendering is left to the caller.
pub async fn run(run: OreillyRun<'_>, fetch: &FetchConfig) -> Result<Vec<LearningItem>> {
    let html = load_source(run.source, fetch).await?;
    let today = chrono::Local::now().date_naive();
    let items = parse_search_html(&html, today)?;

    match (run.format, run.outfile) {
        (OutputFormat::Text, _) => {}
        (OutputFormat::Json, Some(path)) => crate::sink::write_json_file(path, &items)?,
        (OutputFormat::Csv, Some(path)) => crate::sink::write_csv_file(path, COLUMNS, &items)?,
        (OutputFormat::Json, None) => write_json(std::io::stdout().lock(), &items)?,
        (OutputFormat::Csv, None) => {
            let mut out = std::io::stdout().lock();
            write_csv(&mut out, COLUMNS, &items)?;
            out.flush()?;
        }
    }
    if let (Some(path), true) = (run.outfile, run.format != OutputFormat::Text) {
        info!(items = items.len(), path = %path.display(), "wrote results");
    }
    Ok(items)
}
