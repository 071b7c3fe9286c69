//! Run orchestration: download, window, tag and export, with a run summary.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use feedtag_core::{AppConfig, TaggedRecord};
use serde::Serialize;

use crate::batch::{tag_interval_file, BatchStage, BatchState, PersistTargets};
use crate::csv_io::{read_tagged_csv, write_interval_csv};
use crate::feeds::{read_feed_list, FeedDownloader};
use crate::predictor::{Corpus, PredictOptions};
use crate::sheet::CodaClient;
use crate::shortener::LinkShortener;
use crate::window::{window_directory, window_duration};

/// Paths and tuning for one pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub feed_list: PathBuf,
    pub raw_dir: PathBuf,
    pub interval_file: PathBuf,
    pub backend_file: PathBuf,
    pub window: Duration,
    pub predict: PredictOptions,
}

impl PipelineSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            feed_list: config.feed_list_path.clone(),
            raw_dir: config.raw_dir.clone(),
            interval_file: config.interval_file.clone(),
            backend_file: config.backend_file.clone(),
            window: window_duration(config.interval_secs),
            predict: PredictOptions {
                query_tokens: config.query_token_limit,
                top_k: config.prediction_top_k,
            },
        }
    }

    fn targets(&self) -> PersistTargets<'_> {
        PersistTargets {
            interval_file: &self.interval_file,
            backend_file: &self.backend_file,
        }
    }
}

/// Final disposition of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    CompletedWithWarnings,
    Failed,
}

impl RunStatus {
    /// Value stored in `pipeline_runs.status`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::CompletedWithWarnings => "completed_with_warnings",
            Self::Failed => "failed",
        }
    }

    /// Process exit code: 0 success, 2 completed with warnings, 1 failed.
    #[must_use]
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Succeeded => 0,
            Self::CompletedWithWarnings => 2,
            Self::Failed => 1,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters and messages accumulated over a run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunSummary {
    pub feeds_listed: usize,
    pub feeds_downloaded: usize,
    pub feeds_failed: usize,
    pub files_windowed: usize,
    pub files_skipped: usize,
    pub records_windowed: usize,
    pub records_tagged: usize,
    pub prediction_failures: usize,
    pub shortening_failures: usize,
    pub backend_rows_appended: Option<usize>,
    pub corpus_rows_stored: Option<usize>,
    pub rows_exported: Option<usize>,
    /// Recovered failures.
    pub warnings: Vec<String>,
    /// Failures that stopped the run.
    pub failures: Vec<String>,
}

impl RunSummary {
    fn warn(&mut self, step: &str, message: impl std::fmt::Display) {
        tracing::warn!(step, error = %message, "pipeline step completed with warnings");
        self.warnings.push(format!("{step}: {message}"));
    }

    fn fail(&mut self, step: &str, message: impl std::fmt::Display) {
        tracing::error!(step, error = %message, "pipeline step failed");
        self.failures.push(format!("{step}: {message}"));
    }

    #[must_use]
    pub fn status(&self) -> RunStatus {
        if !self.failures.is_empty() {
            RunStatus::Failed
        } else if !self.warnings.is_empty()
            || self.feeds_failed > 0
            || self.files_skipped > 0
            || self.prediction_failures > 0
            || self.shortening_failures > 0
        {
            RunStatus::CompletedWithWarnings
        } else {
            RunStatus::Succeeded
        }
    }
}

/// The collaborators a run needs, constructed once and borrowed.
pub struct Pipeline<'a, C, S> {
    pub settings: &'a PipelineSettings,
    pub downloader: &'a FeedDownloader,
    pub corpus: &'a C,
    pub shortener: &'a S,
    /// `None` skips the spreadsheet export.
    pub sheet: Option<&'a CodaClient>,
}

impl<C: Corpus, S: LinkShortener> Pipeline<'_, C, S> {
    /// Download every listed feed into the raw directory.
    ///
    /// Returns `false` when the feed list is unreadable, the raw directory
    /// cannot be prepared, or every listed feed failed.
    pub async fn download(&self, summary: &mut RunSummary) -> bool {
        let feeds = match read_feed_list(&self.settings.feed_list) {
            Ok(feeds) => feeds,
            Err(e) => {
                summary.fail("download", e);
                return false;
            }
        };
        summary.feeds_listed = feeds.len();
        if feeds.is_empty() {
            summary.warn("download", "feed list is empty");
        }

        match self.downloader.download_all(&feeds, &self.settings.raw_dir).await {
            Ok(report) => {
                summary.feeds_downloaded = report.saved.len();
                summary.feeds_failed = report.failed;
                if !feeds.is_empty() && report.saved.is_empty() {
                    summary.fail("download", "no feed could be downloaded");
                    return false;
                }
                true
            }
            Err(e) => {
                summary.fail("download", e);
                false
            }
        }
    }

    /// Window the raw directory and write the interval file.
    pub fn window(&self, now: DateTime<Utc>, summary: &mut RunSummary) -> bool {
        let outcome = match window_directory(&self.settings.raw_dir, now, self.settings.window) {
            Ok(outcome) => outcome,
            Err(e) => {
                summary.fail("window", e);
                return false;
            }
        };
        summary.files_windowed = outcome.files_windowed;
        summary.files_skipped = outcome.files_skipped;
        summary.records_windowed = outcome.records.len();

        if let Err(e) = write_interval_csv(&self.settings.interval_file, &outcome.records) {
            summary.fail("window", e);
            return false;
        }

        tracing::info!(
            files = outcome.files_windowed,
            skipped = outcome.files_skipped,
            records = outcome.records.len(),
            window_secs = self.settings.window.num_seconds(),
            "interval file written"
        );
        true
    }

    /// Tag the interval file and persist the tagged rows.
    ///
    /// Returns the tagged rows, or `None` if the interval file could not be
    /// loaded.
    pub async fn tag(&self, summary: &mut RunSummary) -> Option<Vec<TaggedRecord>> {
        let (tagged, report) = tag_interval_file(
            self.corpus,
            self.shortener,
            self.settings.predict,
            self.settings.targets(),
        )
        .await;

        summary.records_tagged = tagged.len();
        summary.prediction_failures = report.prediction_failures;
        summary.shortening_failures = report.shortening_failures;
        summary.backend_rows_appended = report.backend_rows_appended;
        summary.corpus_rows_stored = report.corpus_rows_stored;

        for error in &report.errors {
            let step = format!("tag/{}", error.stage);
            if error.stage == BatchStage::Persist {
                summary.warn(&step, &error.message);
            } else {
                summary.fail(&step, &error.message);
            }
        }

        match report.state {
            BatchState::Errored(_) => None,
            _ => Some(tagged),
        }
    }

    /// Send `records` to the spreadsheet, if one is configured.
    pub async fn export(&self, records: &[TaggedRecord], summary: &mut RunSummary) {
        let Some(sheet) = self.sheet else {
            tracing::warn!("CODA_TOKEN not set; skipping spreadsheet export");
            return;
        };

        match sheet.append_rows(records).await {
            Ok(sent) => {
                tracing::info!(rows = sent, "spreadsheet export complete");
                summary.rows_exported = Some(sent);
            }
            Err(e) => summary.warn("export", e),
        }
    }

    /// Export the tagged interval file on its own.
    pub async fn export_interval_file(&self, summary: &mut RunSummary) {
        match read_tagged_csv(&self.settings.interval_file) {
            Ok(records) => self.export(&records, summary).await,
            Err(e) => summary.fail("export", e),
        }
    }

    /// Run every step in order, stopping after a step whose output the next
    /// one needs has failed.
    pub async fn run(&self, now: DateTime<Utc>) -> RunSummary {
        let mut summary = RunSummary::default();

        if !self.download(&mut summary).await {
            return summary;
        }
        if !self.window(now, &mut summary) {
            return summary;
        }
        let Some(tagged) = self.tag(&mut summary).await else {
            return summary;
        };
        self.export(&tagged, &mut summary).await;

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reflects_failures_then_warnings() {
        let mut summary = RunSummary::default();
        assert_eq!(summary.status(), RunStatus::Succeeded);

        summary.shortening_failures = 1;
        assert_eq!(summary.status(), RunStatus::CompletedWithWarnings);

        summary.fail("window", "raw directory missing");
        assert_eq!(summary.status(), RunStatus::Failed);
    }

    #[test]
    fn status_strings_and_exit_codes() {
        assert_eq!(RunStatus::Succeeded.as_str(), "succeeded");
        assert_eq!(RunStatus::CompletedWithWarnings.as_str(), "completed_with_warnings");
        assert_eq!(RunStatus::Failed.as_str(), "failed");
        assert_eq!(RunStatus::Succeeded.exit_code(), 0);
        assert_eq!(RunStatus::CompletedWithWarnings.exit_code(), 2);
        assert_eq!(RunStatus::Failed.exit_code(), 1);
    }

    #[test]
    fn summary_serializes_for_the_run_ledger() {
        let summary = RunSummary {
            records_tagged: 2,
            corpus_rows_stored: Some(2),
            ..RunSummary::default()
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["records_tagged"], 2);
        assert_eq!(json["corpus_rows_stored"], 2);
        assert!(json["rows_exported"].is_null());
    }
}
