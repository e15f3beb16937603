use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Suffix → multiplier table for shorthand counts such as "1.2K".
#[derive(Debug, Clone, Deserialize)]
pub struct ScaleTable(pub Vec<(char, u64)>);

impl Default for ScaleTable {
    fn default() -> Self {
        ScaleTable(vec![('K', 1_000), ('M', 1_000_000)])
    }
}

impl ScaleTable {
    pub fn multiplier(&self, suffix: char) -> Option<u64> {
        self.0.iter().find(|(s, _)| *s == suffix).map(|(_, m)| *m)
    }

    pub fn suffixes(&self) -> String {
        self.0.iter().map(|(s, _)| *s).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) catalog-scraper/0.1".to_string(),
            timeout_secs: 30,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CourseraConfig {
    pub search_url: String,
    pub language: String,
    pub plus: bool,
    pub sort_by: String,
    pub partners: Vec<String>,
    pub product_types: Vec<String>,
    /// Matched case-sensitively so "RAG" does not hit "leverage".
    pub tags_case: Vec<String>,
    pub tags_no_case: Vec<String>,
    pub skip_lang_tags: Vec<String>,
    pub scale: ScaleTable,
}

impl Default for CourseraConfig {
    fn default() -> Self {
        CourseraConfig {
            search_url: "https://www.coursera.org/search?".to_string(),
            language: "English".to_string(),
            plus: true,
            sort_by: "NEW".to_string(),
            partners: strings(&[
                "IBM",
                "Google",
                "Google Cloud",
                "Microsoft",
                "Amazon Web Services",
                "Meta",
                "Alberta Machine Intelligence Institute",
                "Anthropic",
            ]),
            product_types: strings(&["Professional Certificates", "Specializations"]),
            tags_case: strings(&["RAG", "MCP", "LLM"]),
            tags_no_case: strings(&[
                "Generative AI",
                "AI Dev",
                "AI Agent",
                "AI Engineer",
                "Agents",
                "Agentic",
                "Prompt",
                "GenAI",
                "LangGraph",
                "LangChain",
                "Hugging Face",
                "OpenAI",
                "Retrieval-Augmented Generation",
            ]),
            skip_lang_tags: strings(&[
                "-tr", "-ja", "-jp", "-fr", "-ko", "-br", "-es", "-bhid", "-zeka",
            ]),
            scale: ScaleTable::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub search_url: String,
    pub site_url: String,
    pub known_tags: Vec<String>,
    pub select_providers: Vec<String>,
    pub max_search_pages: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        OllamaConfig {
            search_url: "https://ollama.com/search".to_string(),
            site_url: "https://ollama.com".to_string(),
            known_tags: strings(&["cloud", "embedding", "thinking", "tools", "vision"]),
            select_providers: strings(&[
                "Google",
                "IBM",
                "Meta",
                "Microsoft",
                "NVIDIA",
                "OpenAI",
                "Mistral",
                "Moonshot AI",
            ]),
            max_search_pages: 100,
        }
    }
}

/// Everything a `--rules` file may override. Missing sections keep defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Rules {
    pub fetch: FetchConfig,
    pub coursera: CourseraConfig,
    pub ollama: OllamaConfig,
}

impl Rules {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Rules::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file {}", path.display()))?;
        let rules = serde_json::from_str(&text)
            .with_context(|| format!("Invalid rules file {}", path.display()))?;
        Ok(rules)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
