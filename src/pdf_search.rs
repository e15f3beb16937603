use std::any::Any;
use std::panic;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::ScrapeError;

pub const DEFAULT_WORKERS: usize = 20;

/// Every `*.pdf` under `root`, extension matched case-insensitively, sorted.
pub fn find_pdfs(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Case-insensitive literal match for `sentence`.
pub fn sentence_pattern(sentence: &str) -> Result<Regex> {
    RegexBuilder::new(&regex::escape(sentence))
        .case_insensitive(true)
        .build()
        .with_context(|| format!("Invalid search sentence {sentence:?}"))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "pdf parser panicked".to_string()
    }
}

/// Extract all text of one PDF. Parser panics are reported as [`ScrapeError::Pdf`].
pub fn extract_text(path: &Path) -> crate::error::Result<String> {
    let bytes = std::fs::read(path).map_err(|source| ScrapeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let pdf_err = |message: String| ScrapeError::Pdf {
        path: path.to_path_buf(),
        message,
    };
    match panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(pdf_err(e.to_string())),
        Err(payload) => Err(pdf_err(panic_message(payload))),
    }
}

pub fn search_file(path: &Path, pattern: &Regex) -> crate::error::Result<bool> {
    Ok(pattern.is_match(&extract_text(path)?))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Search `files` on a pool of `workers` threads. Returns the matching files, sorted.
///
/// A file that cannot be read or parsed is logged and counts as not found.
pub fn search_all(files: &[PathBuf], pattern: &Regex, workers: usize) -> Result<Vec<PathBuf>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .context("Failed to build PDF search pool")?;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut hits: Vec<PathBuf> = pool.install(|| {
        files
            .par_iter()
            .filter(|path| {
                let name = file_name(path);
                debug!(file = %name, "Searching in");
                let found = match search_file(path, pattern) {
                    Ok(found) => found,
                    Err(e) => {
                        warn!(file = %name, error = %e, "skipping unreadable PDF");
                        false
                    }
                };
                if found {
                    pb.println(format!("Found in: {name}"));
                }
                pb.inc(1);
                found
            })
            .cloned()
            .collect()
    });
    pb.finish_and_clear();

    hits.sort();
    Ok(hits)
}

pub fn run(folder: &Path, sentence: &str, workers: usize) -> Result<Vec<PathBuf>> {
    let pattern = sentence_pattern(sentence)?;
    let files = find_pdfs(folder);
    info!(files = files.len(), workers, folder = %folder.display(), "searching PDFs");
    if files.is_empty() {
        println!("No PDF files under {}", folder.display());
        return Ok(Vec::new());
    }
    let hits = search_all(&files, &pattern, workers)?;
    println!("{} of {} files contain {:?}", hits.len(), files.len(), sentence);
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_is_case_insensitive_and_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("books/rust");
        std::fs::create_dir_all(&nested).unwrap();
        for path in [
            dir.path().join("a.pdf"),
            dir.path().join("B.PDF"),
            nested.join("c.Pdf"),
            dir.path().join("notes.txt"),
            dir.path().join("pdf"),
        ] {
            std::fs::write(path, b"x").unwrap();
        }

        let names: Vec<String> = find_pdfs(dir.path()).iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["B.PDF", "a.pdf", "c.Pdf"]);
    }

    #[test]
    fn literal_case_insensitive_pattern() {
        let pattern = sentence_pattern("ThreadPoolExecutor.map(").unwrap();
        assert!(pattern.is_match("use threadpoolexecutor.MAP(fn, items)"));
        assert!(!pattern.is_match("ThreadPoolExecutorXmap("));
    }

    #[test]
    fn broken_files_do_not_abort_the_search() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<PathBuf> = (0..4)
            .map(|i| {
                let path = dir.path().join(format!("broken-{i}.pdf"));
                std::fs::write(&path, b"%PDF-1.4 truncated").unwrap();
                path
            })
            .collect();
        let mut all = files.clone();
        all.push(dir.path().join("missing.pdf"));

        let pattern = sentence_pattern("anything").unwrap();
        let hits = search_all(&all, &pattern, 2).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = extract_text(Path::new("no/such/book.pdf")).unwrap_err();
        assert!(matches!(err, ScrapeError::Read { .. }));
    }
}
