use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info};

use crate::config::FetchConfig;
use crate::error::{Result, ScrapeError};

static UNSAFE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9._-]").unwrap());

/// Plain HTTP(S) fetcher. One timeout per request, no retries.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|source| ScrapeError::Fetch {
                url: String::new(),
                source,
            })?;
        Ok(HttpFetcher {
            client,
            timeout: config.timeout(),
        })
    }

    /// Same client, different per-request timeout.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        HttpFetcher {
            client: self.client.clone(),
            timeout,
        }
    }

    pub async fn fetch(&self, url: &str) -> Result<String> {
        debug!(url, "GET");
        let fetch_err = |source| ScrapeError::Fetch {
            url: url.to_string(),
            source,
        };
        let response = self
            .client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .timeout(self.timeout)
            .send()
            .await
            .map_err(fetch_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status,
            });
        }

        let bytes = response.bytes().await.map_err(fetch_err)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Read a local document, replacing invalid UTF-8.
pub fn read_local(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|source| ScrapeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Treat `source` as a URL when it has an http(s) scheme, else as a file path.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Path-keyed on-disk page cache. Written once, never invalidated.
pub struct PageCache {
    dir: PathBuf,
}

impl PageCache {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| ScrapeError::SinkWrite {
            path: dir.clone(),
            source,
        })?;
        Ok(PageCache { dir })
    }

    pub fn path_for(&self, name: &str, suffix: &str) -> PathBuf {
        let safe = UNSAFE_NAME_RE.replace_all(name, "_");
        let suffix = suffix.trim();
        let file = match suffix {
            "" => format!("{safe}.html"),
            s if s.starts_with('.') => format!("{safe}{s}.html"),
            s => format!("{safe}.{s}.html"),
        };
        self.dir.join(file)
    }

    pub fn get(&self, name: &str, suffix: &str) -> Option<String> {
        let path = self.path_for(name, suffix);
        if !path.exists() {
            return None;
        }
        read_local(&path).ok()
    }

    pub fn put(&self, name: &str, suffix: &str, body: &str) -> Result<()> {
        let path = self.path_for(name, suffix);
        std::fs::write(&path, body).map_err(|source| ScrapeError::SinkWrite { path, source })
    }

    /// Cache hit, or fetch and store.
    pub async fn fetch_cached(
        &self,
        fetcher: &HttpFetcher,
        url: &str,
        name: &str,
        suffix: &str,
    ) -> Result<String> {
        if let Some(body) = self.get(name, suffix) {
            debug!(url, "cache hit");
            return Ok(body);
        }
        info!(url, "fetch");
        let body = fetcher.fetch(url).await?;
        self.put(name, suffix, &body)?;
        Ok(body)
    }
}
