/// How a keyword is compared against record text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseRule {
    Sensitive,
    Insensitive,
}

#[derive(Debug, Clone)]
pub struct Keyword {
    pub text: String,
    pub case: CaseRule,
}

impl Keyword {
    pub fn new(text: impl Into<String>, case: CaseRule) -> Self {
        Keyword {
            text: text.into(),
            case,
        }
    }

    pub fn matches(&self, haystack: &str) -> bool {
        match self.case {
            CaseRule::Sensitive => haystack.contains(&self.text),
            CaseRule::Insensitive => haystack
                .to_lowercase()
                .contains(&self.text.to_lowercase()),
        }
    }
}

/// Records that expose the text the classifier looks at.
pub trait Classify {
    /// Text searched for allow-list keywords.
    fn match_text(&self) -> String;
    /// Value tested against deny-list suffixes.
    fn exclusion_key(&self) -> &str;
}

/// Included iff ANY allow keyword matches AND no deny suffix ends the key.
#[derive(Debug, Clone, Default)]
pub struct InclusionRules {
    pub allow: Vec<Keyword>,
    pub deny_suffixes: Vec<String>,
}

impl InclusionRules {
    pub fn new(case_sensitive: &[String], case_insensitive: &[String], deny_suffixes: &[String]) -> Self {
        let allow = case_sensitive
            .iter()
            .map(|k| Keyword::new(k.clone(), CaseRule::Sensitive))
            .chain(
                case_insensitive
                    .iter()
                    .map(|k| Keyword::new(k.clone(), CaseRule::Insensitive)),
            )
            .collect();
        InclusionRules {
            allow,
            deny_suffixes: deny_suffixes.to_vec(),
        }
    }

    pub fn allows(&self, text: &str) -> bool {
        self.allow.iter().any(|k| k.matches(text))
    }

    pub fn denies(&self, key: &str) -> bool {
        self.deny_suffixes.iter().any(|s| key.ends_with(s.as_str()))
    }

    pub fn includes<R: Classify>(&self, record: &R) -> bool {
        self.allows(&record.match_text()) && !self.denies(record.exclusion_key())
    }

    /// Keep included records, preserving order.
    pub fn filter<R: Classify>(&self, records: Vec<R>) -> Vec<R> {
        records.into_iter().filter(|r| self.includes(r)).collect()
    }
}
