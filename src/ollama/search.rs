use std::cell::RefCell;
use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::time::Duration;

use reqwest::Url;
use scraper::Html;
use tracing::{info, warn};

use crate::fetch::HttpFetcher;
use crate::parser::rules::parse_selector;
use crate::poll::{poll_until_stable, Settled};

const LIBRARY_PREFIX: &str = "/library/";

/// Absolute `/library/<model>` URLs linked from a search page, sorted.
pub fn extract_model_urls(html: &str, base_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let Ok(anchors) = parse_selector("a[href]") else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);
    doc.select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .filter(|url| {
            url.path()
                .strip_prefix(LIBRARY_PREFIX)
                .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
        })
        .map(|mut url| {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Walk `?page=1,2,...` until a page adds no new model URLs.
///
/// A failed fetch or an empty page ends the walk with what was collected.
pub async fn collect_model_urls(
    fetcher: &HttpFetcher,
    search_url: &str,
    max_pages: usize,
) -> Vec<String> {
    let urls = RefCell::new(BTreeSet::new());

    let settled = poll_until_stable(max_pages, Duration::ZERO, |page| {
        let urls = &urls;
        async move {
            let page_url = format!("{search_url}?page={page}");
            let found = match fetcher.fetch(&page_url).await {
                Ok(html) => extract_model_urls(&html, &page_url),
                Err(e) => {
                    warn!(url = %page_url, error = %e, "search page failed");
                    Vec::new()
                }
            };
            let mut urls = urls.borrow_mut();
            if found.is_empty() {
                return ControlFlow::Break(urls.len() as u64);
            }
            urls.extend(found);
            ControlFlow::Continue(urls.len() as u64)
        }
    })
    .await;

    if let Settled::Exhausted(_) = settled {
        warn!(max_pages, "stopped at page limit");
    }
    info!(models = settled.value(), "collected model URLs");
    urls.into_inner().into_iter().collect()
}
