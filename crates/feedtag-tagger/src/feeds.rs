//! Feed list parsing and per-feed CSV download into the raw directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;

use crate::error::TaggerError;

const FEED_TITLE_COLUMN: &str = "Feed Title";
const MAX_STEM_LEN: usize = 120;

/// Read the feed list: one feed id or URL per line. Blank lines and lines
/// starting with `#` are skipped.
///
/// # Errors
///
/// Returns [`TaggerError::Io`] if the file cannot be read.
pub fn read_feed_list(path: &Path) -> Result<Vec<String>, TaggerError> {
    let text = std::fs::read_to_string(path).map_err(|e| TaggerError::io(path, e))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// CSV export URL for a feed: the first `/feed/` segment becomes `/feeds/`
/// and `.csv` is appended unless already present.
#[must_use]
pub fn feed_csv_url(feed: &str) -> String {
    let url = feed.trim().replacen("/feed/", "/feeds/", 1);
    if url.to_ascii_lowercase().ends_with(".csv") {
        url
    } else {
        format!("{url}.csv")
    }
}

/// Make `raw` safe to use as a file stem.
///
/// Path separators and other characters outside `[A-Za-z0-9 ._-]` become `_`;
/// leading dots are dropped so the file is never hidden.
#[must_use]
pub fn sanitize_file_stem(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_LEN)
        .collect();

    let cleaned = cleaned.trim().trim_start_matches('.').trim();
    if cleaned.is_empty() {
        "feed".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Value of the `Feed Title` column on the first data row, if any.
fn feed_title(body: &[u8]) -> Option<String> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body);
    let idx = reader
        .headers()
        .ok()?
        .iter()
        .position(|h| h.trim() == FEED_TITLE_COLUMN)?;
    let first = reader.records().next()?.ok()?;
    first
        .get(idx)
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
}

/// Fallback name: the last non-empty path segment of the feed id.
fn feed_id_stem(feed: &str) -> String {
    let trimmed = feed.trim().trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    last.strip_suffix(".csv").unwrap_or(last).to_string()
}

/// Choose a file name under which to save `body`, unique within `taken`.
fn unique_file_name(feed: &str, body: &[u8], taken: &mut HashSet<String>) -> String {
    let stem = sanitize_file_stem(&feed_title(body).unwrap_or_else(|| feed_id_stem(feed)));

    let mut name = format!("{stem}.csv");
    let mut suffix = 2;
    while !taken.insert(name.to_ascii_lowercase()) {
        name = format!("{stem}_{suffix}.csv");
        suffix += 1;
    }
    name
}

/// Remove every regular file in `dir`, creating it if missing.
///
/// # Errors
///
/// Returns [`TaggerError::Io`] if the directory cannot be created, listed or
/// cleared.
pub fn prepare_raw_dir(dir: &Path) -> Result<(), TaggerError> {
    std::fs::create_dir_all(dir).map_err(|e| TaggerError::io(dir, e))?;
    for entry in std::fs::read_dir(dir).map_err(|e| TaggerError::io(dir, e))? {
        let path = entry.map_err(|e| TaggerError::io(dir, e))?.path();
        if path.is_file() {
            std::fs::remove_file(&path).map_err(|e| TaggerError::io(&path, e))?;
        }
    }
    Ok(())
}

/// Per-run download result.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub saved: Vec<PathBuf>,
    pub failed: usize,
}

/// Downloads feed CSV exports over HTTP.
pub struct FeedDownloader {
    client: Client,
}

impl FeedDownloader {
    /// # Errors
    ///
    /// Returns [`TaggerError::Http`] if the HTTP client cannot be constructed.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, TaggerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch one feed's CSV body.
    ///
    /// # Errors
    ///
    /// Returns [`TaggerError::Http`] on network failure or
    /// [`TaggerError::UnexpectedStatus`] on a non-2xx response.
    pub async fn fetch(&self, feed: &str) -> Result<Vec<u8>, TaggerError> {
        let url = feed_csv_url(feed);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TaggerError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Clear `raw_dir` and download every feed into it, one at a time.
    ///
    /// A feed that fails to download is logged and counted; the others are
    /// still fetched.
    ///
    /// # Errors
    ///
    /// Returns [`TaggerError::Io`] if `raw_dir` cannot be prepared. Failures to
    /// write an individual file are counted like download failures.
    pub async fn download_all(
        &self,
        feeds: &[String],
        raw_dir: &Path,
    ) -> Result<DownloadReport, TaggerError> {
        prepare_raw_dir(raw_dir)?;

        let mut report = DownloadReport::default();
        let mut taken = HashSet::new();
        for feed in feeds {
            let body = match self.fetch(feed).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(feed = %feed, error = %e, "feed download failed");
                    report.failed += 1;
                    continue;
                }
            };

            let path = raw_dir.join(unique_file_name(feed, &body, &mut taken));
            if let Err(e) = std::fs::write(&path, &body) {
                tracing::warn!(feed = %feed, file = %path.display(), error = %e, "failed to save feed");
                report.failed += 1;
                continue;
            }
            tracing::debug!(feed = %feed, file = %path.display(), bytes = body.len(), "saved feed");
            report.saved.push(path);
        }

        tracing::info!(
            saved = report.saved.len(),
            failed = report.failed,
            "feed download complete"
        );
        Ok(report)
    }
}
