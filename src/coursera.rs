use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::config::{CourseraConfig, FetchConfig};
use crate::error::ScrapeError;
use crate::fetch::{read_local, HttpFetcher};
use crate::parser::filter::{Classify, InclusionRules};
use crate::parser::normalize::{flag, parse_count, split_metadata, strip_prefix_label};
use crate::parser::rules::{FieldRule, RawRecord, RuleSet};
use crate::selection::Selection;
use crate::sink::{hyperlink, write_csv_file, Tabular};

const SITE: &str = "https://www.coursera.org";
const CARD_CONTAINER: &str = "ul.cds-9.css-5t8l4v.cds-10 li";
const SKILLS_LABEL: &str = "Skills you'll gain:";

pub const COLUMNS: &[&str] = &[
    "idx",
    "selected",
    "partner",
    "title",
    "level",
    "type",
    "duration",
    "degree",
    "AI skills",
    "new",
    "rating",
    "reviews",
    "url",
];

const CARD_RULES: &[FieldRule] = &[
    FieldRule::text("title", "h3.cds-CommonCard-title"),
    FieldRule::text("partner", "p.cds-ProductCard-partnerNames"),
    FieldRule::text("rating", "span.css-4s48ix").or("-"),
    FieldRule::text("reviews", "div.css-vac8rf")
        .after("rating")
        .accept(mentions_reviews),
    FieldRule::text("skills", "div.cds-CommonCard-bodyContent p.css-vac8rf").cleanup(clean_skills),
    FieldRule::text("metadata", "div.cds-CommonCard-metadata p"),
    FieldRule::attr("href", "a.cds-CommonCard-titleLink", "href"),
    FieldRule::text("degree", "p.css-ls7ln4"),
    FieldRule::all("badges", "span.css-1ast7yb"),
];

fn mentions_reviews(text: &str) -> bool {
    text.to_lowercase().contains("reviews")
}

fn clean_skills(text: &str) -> String {
    strip_prefix_label(text, SKILLS_LABEL)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub idx: Option<usize>,
    pub selected: bool,
    pub partner: String,
    pub title: String,
    pub level: String,
    pub kind: String,
    pub duration: String,
    pub degree: String,
    pub ai_skills: String,
    pub new: String,
    pub rating: String,
    pub reviews: u64,
    pub skills: String,
    pub url: String,
}

impl Course {
    fn from_raw(raw: &RawRecord, config: &CourseraConfig) -> Self {
        let get = |field: &str| raw.get(field).cloned().unwrap_or_default();
        let (level, kind, duration) = split_metadata(&get("metadata"));
        let href = get("href");
        let badges = get("badges");
        Course {
            idx: None,
            selected: false,
            partner: get("partner"),
            title: get("title"),
            level,
            kind,
            duration,
            degree: flag(&get("degree"), "Build toward a degree", "degree"),
            ai_skills: flag(&badges, "AI skills", "AI skills"),
            new: flag(&badges, "New", "new"),
            rating: get("rating"),
            reviews: parse_count(&get("reviews"), &config.scale),
            skills: get("skills"),
            url: if href.is_empty() {
                String::new()
            } else {
                format!("{SITE}{href}")
            },
        }
    }
}

impl Classify for Course {
    fn match_text(&self) -> String {
        format!("{} {}", self.title, self.skills)
    }

    fn exclusion_key(&self) -> &str {
        &self.url
    }
}

impl Tabular for Course {
    fn cell(&self, column: &str) -> Option<String> {
        let value = match column {
            "idx" => self.idx.map(|i| i.to_string()).unwrap_or_default(),
            "selected" => (if self.selected { "selected" } else { "" }).to_string(),
            "partner" => self.partner.clone(),
            "title" => self.title.clone(),
            "level" => self.level.clone(),
            "type" => self.kind.clone(),
            "duration" => self.duration.clone(),
            "degree" => self.degree.clone(),
            "AI skills" => self.ai_skills.clone(),
            "new" => self.new.clone(),
            "rating" => self.rating.clone(),
            "reviews" => self.reviews.to_string(),
            "url" => hyperlink(&self.url, "url"),
            _ => return None,
        };
        Some(value)
    }
}

/// Search URL for the configured partners and product types.
pub fn search_url(config: &CourseraConfig) -> String {
    let encode = |s: &str| s.replace(' ', "%20");
    let partners = config
        .partners
        .iter()
        .map(|p| format!("partners={}", encode(p)))
        .collect::<Vec<_>>()
        .join("&");
    let product_types = config
        .product_types
        .iter()
        .map(|p| format!("productTypeDescription={}", encode(p)))
        .collect::<Vec<_>>()
        .join("&");
    let parts = [
        format!("language={}", config.language),
        partners,
        format!("isPartOfCourseraPlus={}", config.plus),
        product_types,
        format!("sortBy={}", config.sort_by),
    ];
    format!("{}{}", config.search_url, parts.join("&"))
}

/// Extract every course card. A page without the card list yields nothing.
pub fn extract_courses(html: &str, config: &CourseraConfig) -> Result<Vec<Course>> {
    let rules = RuleSet::compile(CARD_CONTAINER, CARD_RULES)?;
    let raw = match rules.extract(html) {
        Ok(raw) => raw,
        Err(e @ ScrapeError::DocumentFormat { .. }) => {
            warn!(error = %e, "no course cards");
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };
    info!(cards = raw.len(), "found course cards");
    Ok(raw.iter().map(|r| Course::from_raw(r, config)).collect())
}

pub fn inclusion_rules(config: &CourseraConfig) -> InclusionRules {
    InclusionRules::new(&config.tags_case, &config.tags_no_case, &config.skip_lang_tags)
}

/// Keep GenAI, English-language courses; number them and mark earlier picks.
pub fn select_courses(
    courses: Vec<Course>,
    rules: &InclusionRules,
    selection: &Selection,
) -> Vec<Course> {
    rules
        .filter(courses)
        .into_iter()
        .enumerate()
        .map(|(i, mut course)| {
            course.idx = Some(i + 1);
            course.selected = selection.contains(&course.partner, &course.title);
            course
        })
        .collect()
}

pub struct CourseraRun<'a> {
    pub html: Option<&'a Path>,
    pub selected: &'a Path,
    pub output: &'a Path,
}

pub async fn run(run: CourseraRun<'_>, fetch: &FetchConfig, config: &CourseraConfig) -> Result<usize> {
    let selection = Selection::load(run.selected)?;
    info!(entries = selection.len(), "loaded previous selection");

    let html = match run.html {
        Some(path) => {
            info!(path = %path.display(), "reading saved search page");
            read_local(path)?
        }
        None => {
            let url = search_url(config);
            println!("{url}");
            HttpFetcher::new(fetch)?.fetch(&url).await?
        }
    };

    let courses = extract_courses(&html, config)?;
    let picked = select_courses(courses, &inclusion_rules(config), &selection);
    if picked.is_empty() {
        println!("No courses found.");
        return Ok(0);
    }
    write_csv_file(run.output, COLUMNS, &picked)?;
    Ok(picked.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> String {
        std::fs::read_to_string("tests/fixtures/coursera_search.html").unwrap()
    }

    fn config() -> CourseraConfig {
        CourseraConfig::default()
    }

    #[test]
    fn search_url_shape() {
        let url = search_url(&config());
        assert!(url.starts_with("https://www.coursera.org/search?language=English&partners=IBM&"));
        assert!(url.contains("partners=Amazon%20Web%20Services"));
        assert!(url.contains("isPartOfCourseraPlus=true"));
        assert!(url.contains("productTypeDescription=Professional%20Certificates"));
        assert!(url.ends_with("&sortBy=NEW"));
    }

    #[test]
    fn intro_to_rag_end_to_end() {
        let courses = extract_courses(&fixture(), &config()).unwrap();
        let rag = courses.iter().find(|c| c.title == "Intro to RAG").unwrap();
        assert_eq!(rag.partner, "Google");
        assert_eq!(rag.skills, "Prompt Engineering, LangChain");

        let rules = InclusionRules::new(&["RAG".to_string()], &[], &[]);
        assert!(rules.includes(rag));
    }

    #[test]
    fn card_fields_are_normalized() {
        let courses = extract_courses(&fixture(), &config()).unwrap();
        assert_eq!(courses.len(), 3);

        let rag = &courses[0];
        assert_eq!(rag.rating, "4.8");
        assert_eq!(rag.reviews, 1200);
        assert_eq!(
            (rag.level.as_str(), rag.kind.as_str(), rag.duration.as_str()),
            ("Beginner", "Course", "3 hours")
        );
        assert_eq!(rag.url, "https://www.coursera.org/learn/intro-to-rag");
        assert_eq!(rag.degree, "-");
        assert_eq!(rag.ai_skills, "AI skills");
        assert_eq!(rag.new, "new");

        let ibm = &courses[1];
        assert_eq!(ibm.degree, "degree");
        assert_eq!(ibm.reviews, 3_000_000);
        assert_eq!(ibm.ai_skills, "-");
        assert_eq!(ibm.level, "Intermediate");
        assert_eq!(ibm.duration, "");

        let bare = &courses[2];
        assert_eq!(bare.rating, "-");
        assert_eq!(bare.reviews, 0);
        assert_eq!(bare.url, "");
        assert_eq!(bare.skills, "");
    }

    #[test]
    fn selection_numbers_and_marks() {
        let courses = extract_courses(&fixture(), &config()).unwrap();
        let selection =
            Selection::parse(r#"[{"partner": "Google", "title": "Intro to RAG"}]"#).unwrap();
        let picked = select_courses(courses, &inclusion_rules(&config()), &selection);

        // The Spanish variant is excluded by its URL suffix; the cooking course never matches.
        let titles: Vec<&str> = picked.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Intro to RAG"]);
        assert_eq!(picked[0].idx, Some(1));
        assert!(picked[0].selected);
    }

    #[test]
    fn page_without_cards_yields_nothing() {
        let courses = extract_courses("<html><body>Loading…</body></html>", &config()).unwrap();
        assert!(courses.is_empty());
    }

    #[test]
    fn csv_row_layout() {
        let courses = extract_courses(&fixture(), &config()).unwrap();
        let picked = select_courses(courses, &inclusion_rules(&config()), &Selection::default());
        let mut out = Vec::new();
        crate::sink::write_csv(&mut out, COLUMNS, &picked).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "idx,selected,partner,title,level,type,duration,degree,AI skills,new,rating,reviews,url"
        );
        assert_eq!(
            lines.next().unwrap(),
            r#"1,,Google,Intro to RAG,Beginner,Course,3 hours,-,AI skills,new,4.8,1200,"=HYPERLINK(""https://www.coursera.org/learn/intro-to-rag"", ""url"")""#
        );
    }
}
