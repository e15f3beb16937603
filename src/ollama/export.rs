use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::{Dataset, ModelEntry, ModelVersion};
use crate::config::OllamaConfig;
use crate::fetch::read_local;
use crate::sink::{hyperlink, write_csv_file, Tabular};

const LEADING_COLUMNS: &[&str] = &[
    "select",
    "provider",
    "model_name",
    "model_version",
    "param_size",
    "size_gb",
    "context",
];
const TRAILING_COLUMNS: &[&str] = &["link", "description"];

/// Tags present on any version: canonical order first, then the rest sorted.
pub fn tag_columns(models: &[ModelEntry], canonical: &[String]) -> Vec<String> {
    let found: BTreeSet<String> = models
        .iter()
        .flat_map(|m| &m.versions)
        .flat_map(|v| &v.tags)
        .map(|t| t.to_lowercase())
        .collect();
    let mut columns: Vec<String> = canonical
        .iter()
        .filter(|t| found.contains(*t))
        .cloned()
        .collect();
    columns.extend(found.into_iter().filter(|t| !canonical.contains(t)));
    columns
}

pub fn schema(tag_columns: &[String]) -> Vec<&str> {
    LEADING_COLUMNS
        .iter()
        .copied()
        .chain(tag_columns.iter().map(String::as_str))
        .chain(TRAILING_COLUMNS.iter().copied())
        .collect()
}

pub struct VersionRow<'a> {
    model: &'a ModelEntry,
    version: &'a ModelVersion,
    tag: &'a str,
    selected: bool,
}

impl Tabular for VersionRow<'_> {
    fn cell(&self, column: &str) -> Option<String> {
        let v = self.version;
        let value = match column {
            "select" => (if self.selected { "select" } else { "" }).to_string(),
            "provider" => self.model.provider.trim().to_string(),
            "model_name" => self.model.model_name.trim().to_string(),
            "model_version" => self.tag.to_string(),
            "param_size" => v.param_size.trim().to_lowercase(),
            "size_gb" => v.size_gb.map(|gb| format!("{gb:?}")).unwrap_or_default(),
            "context" => v.context_display.clone(),
            "link" => hyperlink(&v.version_link, "link"),
            "description" => self.model.description.trim().to_string(),
            "cloud" => present(self.tag.to_lowercase().contains("cloud"), column),
            "vision" => present(v.input.iter().any(|i| i == "Image"), column),
            tag => present(v.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)), tag),
        };
        Some(value)
    }
}

fn present(yes: bool, tag: &str) -> String {
    if yes {
        tag.to_string()
    } else {
        String::new()
    }
}

/// One row per non-`latest` version, sorted by provider, model and version.
pub fn version_rows<'a>(dataset: &'a Dataset, config: &OllamaConfig) -> Vec<VersionRow<'a>> {
    let mut models: Vec<&ModelEntry> = dataset.models.iter().collect();
    models.sort_by_key(|m| {
        (
            m.provider.trim().to_lowercase(),
            m.model_name.trim().to_lowercase(),
        )
    });

    let mut rows = Vec::new();
    for model in models {
        let selected = config
            .select_providers
            .iter()
            .any(|p| p == model.provider.trim());
        let mut versions: Vec<&ModelVersion> = model.versions.iter().collect();
        versions.sort_by_key(|v| v.model_version.trim().to_lowercase());
        for version in versions {
            let tag = version
                .model_version
                .trim()
                .split_once(':')
                .map_or("", |(_, tag)| tag.trim());
            if tag.eq_ignore_ascii_case("latest") {
                continue;
            }
            rows.push(VersionRow {
                model,
                version,
                tag,
                selected,
            });
        }
    }
    rows
}

/// Convert `models_data.json` into the review spreadsheet.
pub fn run(input: &Path, output: &Path, config: &OllamaConfig) -> Result<usize> {
    let text = read_local(input)?;
    let dataset: Dataset = serde_json::from_str(&text)
        .with_context(|| format!("Invalid model dataset {}", input.display()))?;

    let tags = tag_columns(&dataset.models, &config.known_tags);
    let rows = version_rows(&dataset, config);
    write_csv_file(output, &schema(&tags), &rows)?;
    info!(rows = rows.len(), tag_columns = tags.len(), "exported versions");
    println!("wrote {}", output.display());
    Ok(rows.len())
}
