use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
struct SelectedEntry {
    partner: String,
    title: String,
}

/// (partner, title) pairs picked in an earlier run.
#[derive(Debug, Default)]
pub struct Selection(HashSet<(String, String)>);

impl Selection {
    /// Load a `[{"partner": .., "title": ..}]` file. A missing file is an empty selection.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no previous selection");
            return Ok(Selection::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read selection file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid selection file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let entries: Vec<SelectedEntry> = serde_json::from_str(text)?;
        Ok(Selection(
            entries.into_iter().map(|e| (e.partner, e.title)).collect(),
        ))
    }

    pub fn contains(&self, partner: &str, title: &str) -> bool {
        self.0.contains(&(partner.to_string(), title.to_string()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_and_ignores_extra_fields() {
        let sel = Selection::parse(
            r#"[{"partner": "Google", "title": "Intro to RAG", "url": "x"},
                {"partner": "IBM", "title": "RAG and Agentic AI"}]"#,
        )
        .unwrap();
        assert_eq!(sel.len(), 2);
        assert!(sel.contains("Google", "Intro to RAG"));
        assert!(!sel.contains("IBM", "Intro to RAG"));
    }

    #[test]
    fn missing_file_is_empty() {
        let sel = Selection::load(Path::new("definitely/missing/selected.json")).unwrap();
        assert_eq!(sel.len(), 0);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selected.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Selection::load(&path).is_err());
    }
}
