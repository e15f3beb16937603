use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;

use super::ModelVersion;
use crate::parser::normalize::{
    clean_text, param_size_from_version, parse_context_tokens, parse_size_gb, strip_tags,
};

/// Only the page head carries the capability badges.
const TAG_SCAN_LIMIT: usize = 50_000;

static DESC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+name="description"\s+content="([^"]*)"\s*/?>"#).unwrap()
});
// Short single-word text nodes; badges are picked out by the caller's tag list.
static BADGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s*([A-Za-z][\w-]{0,31})\s*<").unwrap());
// Desktop table rows on the /tags page.
static VERSION_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?is)<div class="grid grid-cols-12[^>]*>\s*"#,
        r#".*?<a href="(?P<href>/library/[^"]+)"[^>]*>(?P<name>[^<]+)</a>"#,
        r#".*?<p[^>]*text-neutral-500[^>]*>\s*(?P<size>[^<]+?)\s*</p>"#,
        r#".*?<p[^>]*text-neutral-500[^>]*>\s*(?P<context>[^<]+?)\s*</p>"#,
        r#".*?<div[^>]*text-neutral-500[^>]*>\s*(?P<input>.*?)\s*</div>"#,
        r#".*?<span class="font-mono[^>]*>\s*(?P<hash>[^<]+?)\s*</span>\s*&nbsp;\s*·\s*&nbsp;\s*(?P<updated>[^<]+?)\s*<"#,
        r#".*?</div>"#,
    ))
    .unwrap()
});
static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a[^>]+href="(?P<href>/library/[^"]+)"[^>]*>(?P<name>[^<]+)</a>"#).unwrap()
});

pub fn extract_description(html: &str) -> String {
    DESC_RE
        .captures(html)
        .map(|c| clean_text(&c[1]))
        .unwrap_or_default()
}

/// Capability badges on a model page, in `known` order.
pub fn extract_page_tags(html: &str, known: &[String]) -> Vec<String> {
    let mut end = html.len().min(TAG_SCAN_LIMIT);
    while !html.is_char_boundary(end) {
        end -= 1;
    }
    let found: BTreeSet<String> = BADGE_RE
        .captures_iter(&html[..end])
        .map(|c| c[1].to_lowercase())
        .collect();
    known
        .iter()
        .filter(|t| found.contains(&t.to_lowercase()))
        .cloned()
        .collect()
}

fn version_names(html: &str) -> Vec<String> {
    let names: Vec<String> = VERSION_ROW_RE
        .captures_iter(html)
        .map(|c| clean_text(&c["name"]))
        .collect();
    if !names.is_empty() {
        return names;
    }
    ANCHOR_RE
        .captures_iter(html)
        .map(|c| clean_text(&c["name"]))
        .collect()
}

/// Parse the version table of a `/library/<model>/tags` page.
pub fn extract_versions(
    html: &str,
    site_url: &str,
    page_tags: &[String],
    model_name: Option<&str>,
) -> Vec<ModelVersion> {
    let has_page_tag = |t: &str| page_tags.iter().any(|p| p == t);

    let names = version_names(html);
    let has_thinking_version = has_page_tag("thinking")
        && names
            .iter()
            .any(|n| !n.is_empty() && n.to_lowercase().contains("think"));
    let has_no_cloud = has_page_tag("cloud")
        && names
            .iter()
            .filter(|n| !n.is_empty())
            .all(|n| !n.to_lowercase().contains("cloud"));

    let expected_prefix = model_name.map(|m| format!("/library/{m}"));
    let mut versions: Vec<ModelVersion> = VERSION_ROW_RE
        .captures_iter(html)
        .filter(|c| {
            expected_prefix
                .as_deref()
                .map_or(true, |prefix| c["href"].starts_with(prefix))
        })
        .map(|c| {
            let name = clean_text(&c["name"]);
            let href = c["href"].to_string();
            let size = clean_text(&c["size"]);
            let context = clean_text(&c["context"]);
            let input = clean_text(&strip_tags(&c["input"]))
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            ModelVersion {
                param_size: param_size_from_version(&name),
                version_link: format!("{site_url}{href}"),
                version_href: href,
                size_gb: parse_size_gb(&size),
                size_display: size,
                context_tokens: parse_context_tokens(&context),
                context_display: context,
                input,
                hash: clean_text(&c["hash"]),
                updated: clean_text(&c["updated"]),
                model_version: name,
                tags: Vec::new(),
            }
        })
        .collect();

    // Versions sharing a hash are aliases; their tag names are judged together.
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, v) in versions.iter().enumerate() {
        let key = if v.hash.trim().is_empty() {
            format!("nohash:{}", v.model_version.trim())
        } else {
            v.hash.trim().to_string()
        };
        groups.entry(key).or_default().push(i);
    }

    for members in groups.values() {
        let group_versions = members
            .iter()
            .map(|&i| {
                let name = versions[i].model_version.trim();
                name.split_once(':').map_or(name, |(_, tag)| tag.trim())
            })
            .collect::<Vec<_>>()
            .join(" ");
        for &i in members {
            let tags = infer_version_tags(&TagEvidence {
                model_name: model_name.unwrap_or(""),
                model_versions: &group_versions,
                input_types: &versions[i].input,
                page_tags,
                has_thinking_version,
                has_no_cloud,
            });
            versions[i].tags = tags.into_iter().collect();
        }
    }

    versions
}

pub struct TagEvidence<'a> {
    pub model_name: &'a str,
    /// Space-joined tag names of one hash group, e.g. "8b 8b-instruct".
    pub model_versions: &'a str,
    pub input_types: &'a [String],
    pub page_tags: &'a [String],
    pub has_thinking_version: bool,
    pub has_no_cloud: bool,
}

/// Per-version capability tags derived from page badges and version names.
///
/// The cloud rule is a heuristic: when no version name mentions "cloud" the
/// page badge applies to every version, otherwise only to groups that do.
pub fn infer_version_tags(ev: &TagEvidence) -> BTreeSet<String> {
    let mut tags: BTreeSet<String> = ev.page_tags.iter().cloned().collect();
    let model_name = ev.model_name.to_lowercase();
    let versions = ev.model_versions;
    let inputs: Vec<String> = ev.input_types.iter().map(|t| t.to_lowercase()).collect();

    if tags.contains("thinking")
        && ((ev.has_thinking_version && !versions.contains("think")) || versions.contains("instruct"))
    {
        tags.remove("thinking");
    }

    if tags.contains("cloud") && !ev.has_no_cloud && !versions.contains("cloud") {
        tags.remove("cloud");
    }

    if model_name.contains("embed") || versions.contains("embed") {
        tags.insert("embedding".into());
    }
    if model_name.contains("thinking") || versions.contains("thinking") {
        tags.insert("thinking".into());
    }
    if model_name.contains("tool")
        || versions.contains("tool")
        || inputs.iter().any(|t| t.contains("tool"))
    {
        tags.insert("tools".into());
    }
    if model_name.contains("vision")
        || versions.contains("vision")
        || inputs.iter().any(|t| t.contains("image") || t.contains("vision"))
    {
        tags.insert("vision".into());
    }
    if versions.contains("instruct") {
        tags.insert("instruct".into());
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> Vec<String> {
        ["cloud", "embedding", "thinking", "tools", "vision"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{name}.html")).unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn model_page_description_and_tags() {
        let html = fixture("ollama_model");
        assert_eq!(
            extract_description(&html),
            "Meta's Llama 3.2 goes small with 1B and 3B models."
        );
        assert_eq!(extract_page_tags(&html, &known()), strings(&["tools", "vision"]));
    }

    #[test]
    fn page_tags_ignore_body_text_past_limit() {
        let mut html = "x".repeat(TAG_SCAN_LIMIT);
        html.push_str("<span>cloud</span>");
        assert!(extract_page_tags(&html, &known()).is_empty());
        assert!(extract_description("<html></html>").is_empty());
    }

    #[test]
    fn version_rows() {
        let html = fixture("ollama_tags");
        let page_tags = strings(&["tools"]);
        let versions = extract_versions(&html, "https://ollama.com", &page_tags, Some("llama3.2"));
        assert_eq!(versions.len(), 3);

        let latest = &versions[0];
        assert_eq!(latest.model_version, "llama3.2:latest");
        assert_eq!(latest.version_link, "https://ollama.com/library/llama3.2:latest");
        assert_eq!(latest.size_display, "2.0GB");
        assert_eq!(latest.size_gb, Some(2.0));
        assert_eq!(latest.context_tokens, Some(128_000));
        assert_eq!(latest.input, strings(&["Text"]));
        assert_eq!(latest.hash, "a80c4f17acd5");
        assert_eq!(latest.updated, "1 year ago");
        assert_eq!(latest.param_size, "");

        let small = &versions[2];
        assert_eq!(small.model_version, "llama3.2:1b");
        assert_eq!(small.param_size, "1b");
        assert_eq!(small.size_gb, Some(1.3));

        // "latest" and "3b" share a hash, so both see "latest 3b".
        assert_eq!(versions[0].tags, strings(&["tools"]));
        assert_eq!(versions[1].tags, strings(&["tools"]));
    }

    #[test]
    fn configured_tags_are_detected() {
        let html = r#"<div><span class="badge">Audio</span><span>tools</span></div>"#;
        let mut known = known();
        known.push("audio".to_string());
        assert_eq!(extract_page_tags(html, &known), strings(&["tools", "audio"]));
        assert_eq!(extract_page_tags(html, &strings(&["vision"])), Vec::<String>::new());
    }

    #[test]
    fn mixed_cloud_family_keeps_cloud_on_cloud_versions() {
        let html = fixture("ollama_tags_qwen3");
        let page_tags = strings(&["cloud", "thinking"]);
        let versions = extract_versions(&html, "https://ollama.com", &page_tags, Some("qwen3"));
        let tags: Vec<(&str, Vec<String>)> = versions
            .iter()
            .map(|v| (v.model_version.as_str(), v.tags.clone()))
            .collect();
        assert_eq!(
            tags,
            vec![
                ("qwen3:latest", vec![]),
                ("qwen3:8b", vec![]),
                ("qwen3:4b-thinking", strings(&["thinking"])),
                ("qwen3:480b-cloud", strings(&["cloud"])),
            ]
        );
    }

    #[test]
    fn cloud_only_family_keeps_cloud_everywhere() {
        let html = fixture("ollama_tags_kimi");
        let page_tags = strings(&["cloud"]);
        let versions = extract_versions(&html, "https://ollama.com", &page_tags, Some("kimi-k2"));
        assert_eq!(versions.len(), 3);
        assert!(versions.iter().all(|v| v.tags == strings(&["cloud"])));
    }

    #[test]
    fn foreign_rows_are_skipped() {
        let html = fixture("ollama_tags");
        let versions = extract_versions(&html, "https://ollama.com", &[], Some("gemma3"));
        assert!(versions.is_empty());
    }

    fn evidence<'a>(
        versions: &'a str,
        inputs: &'a [String],
        page_tags: &'a [String],
        has_thinking_version: bool,
        has_no_cloud: bool,
    ) -> TagEvidence<'a> {
        TagEvidence {
            model_name: "qwen3",
            model_versions: versions,
            input_types: inputs,
            page_tags,
            has_thinking_version,
            has_no_cloud,
        }
    }

    #[test]
    fn cloud_badge_applies_to_all_when_no_cloud_versions() {
        let page = strings(&["cloud", "tools"]);
        let tags = infer_version_tags(&evidence("8b", &[], &page, false, true));
        assert!(tags.contains("cloud"));
    }

    #[test]
    fn cloud_badge_limited_to_cloud_versions_in_mixed_family() {
        let page = strings(&["cloud"]);
        let local = infer_version_tags(&evidence("8b", &[], &page, false, false));
        assert!(!local.contains("cloud"));
        let remote = infer_version_tags(&evidence("480b-cloud", &[], &page, false, false));
        assert!(remote.contains("cloud"));
    }

    #[test]
    fn thinking_badge_rules() {
        let page = strings(&["thinking"]);
        // Family has explicit thinking variants: plain versions lose the badge.
        let plain = infer_version_tags(&evidence("30b", &[], &page, true, false));
        assert!(!plain.contains("thinking"));
        let think = infer_version_tags(&evidence("30b-thinking", &[], &page, true, false));
        assert!(think.contains("thinking"));
        // Instruct builds never think.
        let instruct = infer_version_tags(&evidence("4b-instruct", &[], &page, false, false));
        assert!(!instruct.contains("thinking"));
        assert!(instruct.contains("instruct"));
    }

    #[test]
    fn derived_tags_from_names_and_inputs() {
        let inputs = strings(&["Text", "Image"]);
        let tags = infer_version_tags(&evidence("embed-8b", &inputs, &[], false, false));
        assert!(tags.contains("embedding"));
        assert!(tags.contains("vision"));
        assert!(!tags.contains("tools"));
    }
}
