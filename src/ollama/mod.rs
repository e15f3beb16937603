pub mod export;
pub mod library;
pub mod providers;
pub mod search;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{FetchConfig, OllamaConfig};
use crate::fetch::{HttpFetcher, PageCache};
use crate::sink::write_json_file;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(20);
const MODEL_TIMEOUT: Duration = Duration::from_secs(25);

pub const DEFAULT_CACHE_DIR: &str = ".cache/ollama_library";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelVersion {
    pub model_version: String,
    pub param_size: String,
    pub version_href: String,
    pub version_link: String,
    pub size_display: String,
    pub size_gb: Option<f64>,
    pub context_display: String,
    pub context_tokens: Option<u64>,
    pub input: Vec<String>,
    pub hash: String,
    pub updated: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelEntry {
    pub provider: String,
    pub model_name: String,
    pub model_link: String,
    pub description: String,
    pub page_tags: Vec<String>,
    pub versions: Vec<ModelVersion>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub generated_at: DateTime<Utc>,
    pub tag_columns: Vec<String>,
    pub model_count: usize,
    pub model_version_count: usize,
    pub models: Vec<ModelEntry>,
}

impl Dataset {
    pub fn new(models: Vec<ModelEntry>, tag_columns: Vec<String>) -> Self {
        Dataset {
            generated_at: Utc::now(),
            tag_columns,
            model_count: models.len(),
            model_version_count: models.iter().map(|m| m.versions.len()).sum(),
            models,
        }
    }
}

/// Last path segment of a library URL.
pub fn model_name_from_url(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}

async fn scrape_model(
    fetcher: &HttpFetcher,
    cache: &PageCache,
    config: &OllamaConfig,
    url: &str,
) -> crate::error::Result<ModelEntry> {
    let name = model_name_from_url(url);
    let page = cache.fetch_cached(fetcher, url, name, "").await?;
    let tags_url = format!("{url}/tags");
    let tags_page = cache.fetch_cached(fetcher, &tags_url, name, "tags").await?;

    let page_tags = library::extract_page_tags(&page, &config.known_tags);
    let versions = library::extract_versions(&tags_page, &config.site_url, &page_tags, Some(name));
    Ok(ModelEntry {
        provider: providers::infer_provider(name),
        model_name: name.to_string(),
        model_link: url.to_string(),
        description: library::extract_description(&page),
        page_tags,
        versions,
    })
}

pub struct OllamaRun<'a> {
    pub cache_dir: &'a Path,
    pub output: &'a Path,
    pub limit: Option<usize>,
}

/// Walk the search listing, scrape each model and write the dataset JSON.
pub async fn run(run: OllamaRun<'_>, fetch: &FetchConfig, config: &OllamaConfig) -> Result<usize> {
    let fetcher = HttpFetcher::new(fetch)?;
    let search_fetcher = fetcher.with_timeout(SEARCH_TIMEOUT);
    let model_fetcher = fetcher.with_timeout(MODEL_TIMEOUT);

    let mut urls =
        search::collect_model_urls(&search_fetcher, &config.search_url, config.max_search_pages)
            .await;
    if let Some(limit) = run.limit {
        urls.truncate(limit);
    }
    if urls.is_empty() {
        println!("No models found.");
        return Ok(0);
    }

    let cache = PageCache::open(run.cache_dir)?;
    info!(models = urls.len(), cache = %run.cache_dir.display(), "scraping model pages");

    let pb = ProgressBar::new(urls.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut models = Vec::with_capacity(urls.len());
    for url in &urls {
        match scrape_model(&model_fetcher, &cache, config, url).await {
            Ok(entry) => models.push(entry),
            Err(e) => warn!(url = %url, error = %e, "skipping model"),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let dataset = Dataset::new(models, config.known_tags.clone());
    write_json_file(run.output, &dataset)?;
    println!(
        "Wrote {} models ({} versions) to {}",
        dataset.model_count,
        dataset.model_version_count,
        run.output.display()
    );
    Ok(dataset.model_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_name_is_last_segment() {
        assert_eq!(model_name_from_url("https://ollama.com/library/llama3.2"), "llama3.2");
        assert_eq!(model_name_from_url("https://ollama.com/library/gemma3/"), "gemma3");
    }

    #[tokio::test]
    async fn cached_pages_build_an_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PageCache::open(dir.path()).unwrap();
        let read = |name: &str| std::fs::read_to_string(format!("tests/fixtures/{name}.html")).unwrap();
        cache.put("llama3.2", "", &read("ollama_model")).unwrap();
        cache.put("llama3.2", "tags", &read("ollama_tags")).unwrap();

        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        let config = OllamaConfig::default();
        let entry = scrape_model(&fetcher, &cache, &config, "https://ollama.com/library/llama3.2")
            .await
            .unwrap();

        assert_eq!(entry.provider, "Meta");
        assert_eq!(entry.model_name, "llama3.2");
        assert_eq!(entry.page_tags, vec!["tools".to_string(), "vision".to_string()]);
        assert_eq!(entry.versions.len(), 3);

        let dataset = Dataset::new(vec![entry], config.known_tags.clone());
        assert_eq!(dataset.model_count, 1);
        assert_eq!(dataset.model_version_count, 3);
        let json = serde_json::to_value(&dataset).unwrap();
        assert_eq!(json["models"][0]["versions"][2]["size_gb"], 1.3);
        assert!(json["models"][0]["versions"][0]["context_tokens"].is_u64());
    }
}
