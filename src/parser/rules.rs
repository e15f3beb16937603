use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};

use crate::error::{Result, ScrapeError};

/// One extracted item: field name → raw string. Every rule's field is present.
pub type RawRecord = BTreeMap<&'static str, String>;

/// What to read from the element a rule's selector finds.
#[derive(Debug, Clone, Copy)]
pub enum Locate {
    /// Trimmed text of the first match.
    Text,
    /// Text of the first match, text nodes joined by single spaces.
    Spaced,
    /// An attribute of the first match.
    Attr(&'static str),
    /// Text of every match, joined with `" | "`.
    All,
    /// `"true"` when anything matches.
    Exists,
}

/// Declarative locator → field mapping.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub selector: &'static str,
    pub locate: Locate,
    /// Only consider elements after this field's element, in document order.
    pub after: Option<&'static str>,
    /// Rejects a located value; rejected values fall back to `default`.
    pub accept: Option<fn(&str) -> bool>,
    pub cleanup: Option<fn(&str) -> String>,
    pub default: &'static str,
}

impl FieldRule {
    pub const fn text(field: &'static str, selector: &'static str) -> Self {
        FieldRule {
            field,
            selector,
            locate: Locate::Text,
            after: None,
            accept: None,
            cleanup: None,
            default: "",
        }
    }

    pub const fn spaced(field: &'static str, selector: &'static str) -> Self {
        FieldRule {
            locate: Locate::Spaced,
            ..FieldRule::text(field, selector)
        }
    }

    pub const fn attr(field: &'static str, selector: &'static str, name: &'static str) -> Self {
        FieldRule {
            locate: Locate::Attr(name),
            ..FieldRule::text(field, selector)
        }
    }

    pub const fn all(field: &'static str, selector: &'static str) -> Self {
        FieldRule {
            locate: Locate::All,
            ..FieldRule::text(field, selector)
        }
    }

    pub const fn exists(field: &'static str, selector: &'static str) -> Self {
        FieldRule {
            locate: Locate::Exists,
            ..FieldRule::text(field, selector)
        }
    }

    pub const fn or(self, default: &'static str) -> Self {
        FieldRule { default, ..self }
    }

    pub const fn after(self, anchor: &'static str) -> Self {
        FieldRule {
            after: Some(anchor),
            ..self
        }
    }

    pub const fn accept(self, accept: fn(&str) -> bool) -> Self {
        FieldRule {
            accept: Some(accept),
            ..self
        }
    }

    pub const fn cleanup(self, cleanup: fn(&str) -> String) -> Self {
        FieldRule {
            cleanup: Some(cleanup),
            ..self
        }
    }
}

struct CompiledRule {
    rule: FieldRule,
    selector: Selector,
}

/// A rule table with its selectors parsed, ready to run over many documents.
pub struct RuleSet {
    container_css: &'static str,
    container: Selector,
    rules: Vec<CompiledRule>,
}

pub fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScrapeError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

impl RuleSet {
    pub fn compile(container: &'static str, rules: &[FieldRule]) -> Result<Self> {
        for rule in rules {
            if let Some(anchor) = rule.after {
                if !rules.iter().any(|r| r.field == anchor) {
                    return Err(ScrapeError::Selector {
                        selector: rule.selector.to_string(),
                        message: format!("anchor field `{anchor}` is not declared"),
                    });
                }
            }
        }
        let compiled = rules
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    rule: *rule,
                    selector: parse_selector(rule.selector)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RuleSet {
            container_css: container,
            container: parse_selector(container)?,
            rules: compiled,
        })
    }

    /// Parse `html` and extract one record per container.
    ///
    /// A document without any container is a [`ScrapeError::DocumentFormat`];
    /// it never produces partial records.
    pub fn extract(&self, html: &str) -> Result<Vec<RawRecord>> {
        let doc = Html::parse_document(html);
        let containers: Vec<ElementRef> = doc.select(&self.container).collect();
        if containers.is_empty() {
            return Err(ScrapeError::DocumentFormat {
                container: self.container_css.to_string(),
            });
        }
        Ok(containers.into_iter().map(|c| self.extract_one(c)).collect())
    }

    /// Apply every rule to a single container element.
    pub fn extract_one(&self, container: ElementRef) -> RawRecord {
        let mut record = RawRecord::new();
        for compiled in &self.rules {
            let rule = &compiled.rule;
            let candidates: Vec<ElementRef> = match rule.after.and_then(|a| self.anchor(container, a)) {
                Some(anchor) => following(container, anchor, &compiled.selector),
                None if rule.after.is_some() => Vec::new(),
                None => container.select(&compiled.selector).collect(),
            };

            let located = match rule.locate {
                Locate::Text => candidates.first().map(|el| element_text(*el)),
                Locate::Spaced => candidates.first().map(|el| element_text_spaced(*el)),
                Locate::Attr(name) => candidates
                    .first()
                    .and_then(|el| el.value().attr(name))
                    .map(|v| v.trim().to_string()),
                Locate::All if candidates.is_empty() => None,
                Locate::All => Some(
                    candidates
                        .iter()
                        .map(|el| element_text(*el))
                        .collect::<Vec<_>>()
                        .join(" | "),
                ),
                Locate::Exists => (!candidates.is_empty()).then(|| "true".to_string()),
            };

            let value = located
                .filter(|v| rule.accept.map_or(true, |accept| accept(v)))
                .map(|v| match rule.cleanup {
                    Some(cleanup) => cleanup(&v),
                    None => v,
                })
                .unwrap_or_else(|| rule.default.to_string());
            record.insert(rule.field, value);
        }
        record
    }

    fn anchor<'a>(&self, container: ElementRef<'a>, field: &str) -> Option<ElementRef<'a>> {
        let anchor = self.rules.iter().find(|c| c.rule.field == field)?;
        container.select(&anchor.selector).next()
    }
}

/// Matches of `selector` that come after `anchor` inside `container`.
fn following<'a>(
    container: ElementRef<'a>,
    anchor: ElementRef<'a>,
    selector: &Selector,
) -> Vec<ElementRef<'a>> {
    let anchor_id = anchor.id();
    container
        .descendants()
        .skip_while(|node| node.id() != anchor_id)
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(|el| selector.matches(el))
        .collect()
}

/// Text of an element with each text node trimmed and joined without separator.
pub fn element_text(el: ElementRef) -> String {
    el.text().map(str::trim).filter(|t| !t.is_empty()).collect()
}

/// Text of an element with text nodes joined by single spaces.
pub fn element_text_spaced(el: ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD_RULES: &[FieldRule] = &[
        FieldRule::text("title", "h3"),
        FieldRule::text("rating", "span.rating").or("-"),
        FieldRule::text("reviews", "div.note")
            .after("rating")
            .accept(mentions_reviews),
        FieldRule::attr("url", "a.link", "href"),
        FieldRule::all("badges", "span.badge"),
        FieldRule::exists("quiz", ".quiz"),
        FieldRule::spaced("heading", "h3"),
    ];

    const HTML: &str = r#"
        <ul>
          <li class="card">
            <div class="note">Sponsored</div>
            <h3> Intro <b>to</b> RAG </h3>
            <span class="rating">4.7</span>
            <div class="note">(1.2K reviews)</div>
            <a class="link" href="/learn/rag">go</a>
            <span class="badge">New</span><span class="badge">AI skills</span>
          </li>
          <li class="card">
            <div class="note">12 reviews but no rating</div>
            <h3>Bare</h3>
            <span class="quiz"></span>
          </li>
        </ul>"#;

    fn mentions_reviews(text: &str) -> bool {
        text.to_lowercase().contains("reviews")
    }

    fn shout(text: &str) -> String {
        text.to_uppercase()
    }

    fn rules() -> RuleSet {
        RuleSet::compile("li.card", CARD_RULES).unwrap()
    }

    #[test]
    fn extracts_each_container() {
        let records = rules().extract(HTML).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first["title"], "IntrotoRAG");
        assert_eq!(first["rating"], "4.7");
        assert_eq!(first["reviews"], "(1.2K reviews)");
        assert_eq!(first["url"], "/learn/rag");
        assert_eq!(first["badges"], "New | AI skills");
        assert_eq!(first["quiz"], "");
        assert_eq!(first["heading"], "Intro to RAG");
    }

    #[test]
    fn missing_fields_use_defaults() {
        let records = rules().extract(HTML).unwrap();
        let second = &records[1];
        assert_eq!(second["rating"], "-");
        // Anchor absent: the earlier "reviews" div must not be picked up.
        assert_eq!(second["reviews"], "");
        assert_eq!(second["url"], "");
        assert_eq!(second["quiz"], "true");
        for record in &records {
            assert_eq!(record.len(), CARD_RULES.len());
        }
    }

    #[test]
    fn anchored_rule_ignores_elements_before_anchor() {
        let records = rules().extract(HTML).unwrap();
        assert_ne!(records[0]["reviews"], "Sponsored");
    }

    #[test]
    fn missing_container_is_format_error() {
        let err = rules().extract("<html><body><p>nothing</p></body></html>").unwrap_err();
        assert!(matches!(err, ScrapeError::DocumentFormat { ref container } if container == "li.card"));
    }

    #[test]
    fn bad_selector_rejected_at_compile() {
        let bad = [FieldRule::text("x", "div[")];
        assert!(matches!(
            RuleSet::compile("li", &bad),
            Err(ScrapeError::Selector { .. })
        ));
    }

    #[test]
    fn undeclared_anchor_rejected() {
        let bad = [FieldRule::text("x", "div").after("nope")];
        assert!(RuleSet::compile("li", &bad).is_err());
    }

    #[test]
    fn cleanup_applies_to_located_values_only() {
        const RULES: &[FieldRule] = &[
            FieldRule::text("name", "p").cleanup(shout).or("none"),
        ];
        let set = RuleSet::compile("div", RULES).unwrap();
        let records = set.extract("<div><p>abc</p></div><div></div>").unwrap();
        assert_eq!(records[0]["name"], "ABC");
        assert_eq!(records[1]["name"], "none");
    }
}
