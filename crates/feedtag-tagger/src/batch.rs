//! Batch tagging: prepare, predict, reshape and persist one interval of records.

use std::fmt;
use std::path::Path;

use feedtag_core::records::{
    MODEL_MARKER, OFFICIAL_STATUS_FINAL_CHECK, PUBLISHED_DATE_FORMAT, WZS_APPROVED,
};
use feedtag_core::{CorpusDocument, FeedRecord, Prediction, TaggedRecord};

use crate::csv_io::{append_backend_csv, read_interval_csv, write_tagged_csv};
use crate::predictor::{try_predict, Corpus, PredictOptions};
use crate::shortener::LinkShortener;
use crate::window::parse_local_timestamp;

/// A feed record with its description filled and its date normalized.
///
/// Only [`reshape`] turns this into a [`TaggedRecord`], so a record cannot be
/// reshaped twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRecord {
    pub title: String,
    pub link: String,
    /// Never blank when `title` is not.
    pub plain_description: String,
    pub author: String,
    pub published_date: String,
}

/// Fill an empty description from the title and normalize the date.
#[must_use]
pub fn prepare(record: FeedRecord) -> PreparedRecord {
    let plain_description = if record.plain_description.trim().is_empty() {
        record.title.clone()
    } else {
        record.plain_description
    };

    PreparedRecord {
        published_date: normalize_date(&record.date),
        title: record.title,
        link: record.link,
        plain_description,
        author: record.author,
    }
}

/// Format a feed date as `%m/%d/%Y` in the feed's own offset; unparseable
/// values are kept verbatim.
#[must_use]
pub fn normalize_date(raw: &str) -> String {
    parse_local_timestamp(raw).map_or_else(
        || raw.to_string(),
        |ts| ts.format(PUBLISHED_DATE_FORMAT).to_string(),
    )
}

/// Predict tags for each record in order, using its description as query text.
///
/// Returns the predictions and the number of records whose prediction failed
/// (those get an empty [`Prediction`]).
pub async fn predict_all<C: Corpus>(
    corpus: &C,
    records: &[PreparedRecord],
    options: PredictOptions,
) -> (Vec<Prediction>, usize) {
    let mut predictions = Vec::with_capacity(records.len());
    let mut failures = 0;

    for (idx, record) in records.iter().enumerate() {
        match try_predict(corpus, &record.plain_description, options).await {
            Ok(prediction) => predictions.push(prediction),
            Err(e) => {
                tracing::warn!(row = idx, title = %record.title, error = %e, "prediction failed");
                failures += 1;
                predictions.push(Prediction::empty());
            }
        }
    }

    (predictions, failures)
}

/// Merge `prediction` into the record and shape it for the destinations.
///
/// The link is kept in `Original Source` and replaced in `Live Source` by its
/// short form (absent if shortening fails). `Official Status` becomes
/// `Final Check`, the workflow columns get the model marker, and
/// `Status for WZS` is cleared unless it is `Yes`.
pub async fn reshape<S: LinkShortener>(
    record: PreparedRecord,
    prediction: &Prediction,
    shortener: &S,
) -> TaggedRecord {
    let live_source = shortener.shorten(&record.link).await;

    let mut tagged = TaggedRecord {
        heading: record.title,
        live_source,
        content: record.plain_description,
        author: record.author,
        published_date: record.published_date,
        original_source: record.link,
        ..TaggedRecord::default()
    };
    tagged.apply_prediction(prediction);

    tagged.official_status = OFFICIAL_STATUS_FINAL_CHECK.to_string();
    tagged.attachments = String::new();
    tagged.source_button = MODEL_MARKER.to_string();
    tagged.publish_for_wzs = MODEL_MARKER.to_string();
    tagged.archive = MODEL_MARKER.to_string();
    if tagged.status_for_wzs != WZS_APPROVED {
        tagged.status_for_wzs.clear();
    }

    tagged
}

/// A step of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStage {
    Load,
    Predict,
    Reshape,
    Persist,
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Predict => "predict",
            Self::Reshape => "reshape",
            Self::Persist => "persist",
        })
    }
}

/// How far a batch got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchState {
    #[default]
    Pending,
    Loaded,
    Predicted,
    Reshaped,
    Persisted,
    Done,
    /// A step whose output the next step needs failed; nothing after it ran.
    Errored(BatchStage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub stage: BatchStage,
    pub message: String,
}

/// Files written by the persist step.
#[derive(Debug, Clone, Copy)]
pub struct PersistTargets<'a> {
    /// Overwritten with the tagged rows.
    pub interval_file: &'a Path,
    /// Appended to, skipping rows already present.
    pub backend_file: &'a Path,
}

/// Outcome of one batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub state: BatchState,
    pub records: usize,
    pub prediction_failures: usize,
    pub shortening_failures: usize,
    pub backend_rows_appended: Option<usize>,
    pub corpus_rows_stored: Option<usize>,
    /// Failures that were recovered from, in the order they happened.
    pub errors: Vec<StageError>,
}

impl BatchReport {
    fn record_error(&mut self, stage: BatchStage, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(stage = %stage, error = %message, "batch step failed");
        self.errors.push(StageError { stage, message });
    }

    /// `true` when the batch finished without any recovered failure.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.state == BatchState::Done
            && self.errors.is_empty()
            && self.prediction_failures == 0
            && self.shortening_failures == 0
    }
}

/// Tag `records` and persist the result to every destination.
///
/// Each destination is written independently; a failure is recorded in the
/// report and the others are still attempted.
pub async fn tag_batch<C: Corpus, S: LinkShortener>(
    corpus: &C,
    shortener: &S,
    records: Vec<FeedRecord>,
    options: PredictOptions,
    targets: PersistTargets<'_>,
) -> (Vec<TaggedRecord>, BatchReport) {
    let mut report = BatchReport {
        state: BatchState::Loaded,
        records: records.len(),
        ..BatchReport::default()
    };

    let prepared: Vec<PreparedRecord> = records.into_iter().map(prepare).collect();
    let (predictions, prediction_failures) = predict_all(corpus, &prepared, options).await;
    report.prediction_failures = prediction_failures;
    report.state = BatchState::Predicted;

    let mut tagged = Vec::with_capacity(prepared.len());
    for (record, prediction) in prepared.into_iter().zip(&predictions) {
        let shaped = reshape(record, prediction, shortener).await;
        if shaped.live_source.is_none() && !shaped.original_source.trim().is_empty() {
            report.shortening_failures += 1;
        }
        tagged.push(shaped);
    }
    report.state = BatchState::Reshaped;

    persist(corpus, &tagged, targets, &mut report).await;
    report.state = BatchState::Persisted;

    tracing::info!(
        records = report.records,
        prediction_failures = report.prediction_failures,
        shortening_failures = report.shortening_failures,
        backend_rows = ?report.backend_rows_appended,
        stored = ?report.corpus_rows_stored,
        "batch tagged"
    );
    report.state = BatchState::Done;
    (tagged, report)
}

/// Load the interval file and run [`tag_batch`] on it.
///
/// If the interval file cannot be read the batch stops in
/// [`BatchState::Errored`] and nothing is written.
pub async fn tag_interval_file<C: Corpus, S: LinkShortener>(
    corpus: &C,
    shortener: &S,
    options: PredictOptions,
    targets: PersistTargets<'_>,
) -> (Vec<TaggedRecord>, BatchReport) {
    match read_interval_csv(targets.interval_file) {
        Ok(records) => tag_batch(corpus, shortener, records, options, targets).await,
        Err(e) => {
            let mut report = BatchReport::default();
            report.record_error(BatchStage::Load, e.to_string());
            report.state = BatchState::Errored(BatchStage::Load);
            (Vec::new(), report)
        }
    }
}

async fn persist<C: Corpus>(
    corpus: &C,
    tagged: &[TaggedRecord],
    targets: PersistTargets<'_>,
    report: &mut BatchReport,
) {
    if let Err(e) = write_tagged_csv(targets.interval_file, tagged) {
        report.record_error(BatchStage::Persist, e.to_string());
    }

    match append_backend_csv(targets.backend_file, tagged) {
        Ok(appended) => report.backend_rows_appended = Some(appended),
        Err(e) => report.record_error(BatchStage::Persist, e.to_string()),
    }

    let docs: Vec<CorpusDocument> = tagged.iter().map(TaggedRecord::to_corpus_document).collect();
    match corpus.append(&docs).await {
        Ok(stored) => report.corpus_rows_stored = Some(stored),
        Err(e) => report.record_error(BatchStage::Persist, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use feedtag_core::{CorpusMatch, TagField};

    use super::*;
    use crate::error::TaggerError;
    use crate::shortener::PassthroughShortener;

    #[derive(Default)]
    struct FakeCorpus {
        hits: Vec<CorpusMatch>,
        fail_search_for: Option<&'static str>,
        appended: RefCell<Vec<CorpusDocument>>,
    }

    impl Corpus for FakeCorpus {
        async fn search(
            &self,
            tokens: &[String],
            limit: usize,
        ) -> Result<Vec<CorpusMatch>, TaggerError> {
            if let Some(poison) = self.fail_search_for {
                if tokens.iter().any(|t| t == poison) {
                    return Err(TaggerError::Corpus("query failed".to_string()));
                }
            }
            Ok(self.hits.iter().take(limit).cloned().collect())
        }

        async fn append(&self, docs: &[CorpusDocument]) -> Result<usize, TaggerError> {
            self.appended.borrow_mut().extend_from_slice(docs);
            Ok(docs.len())
        }
    }

    struct NoShortLinks;

    impl LinkShortener for NoShortLinks {
        async fn shorten(&self, _long_url: &str) -> Option<String> {
            None
        }
    }

    fn feed(title: &str, description: &str) -> FeedRecord {
        FeedRecord {
            title: title.to_string(),
            link: format!("https://e.com/{}", title.to_lowercase().replace(' ', "-")),
            plain_description: description.to_string(),
            author: "Ann".to_string(),
            date: "2024-05-01 11:30:00".to_string(),
        }
    }

    #[test]
    fn prepare_falls_back_to_title() {
        let prepared = prepare(feed("Storm warning issued", "   "));
        assert_eq!(prepared.plain_description, "Storm warning issued");
        assert_eq!(prepared.published_date, "05/01/2024");
    }

    #[test]
    fn prepare_keeps_unparseable_date() {
        let mut record = feed("Storm", "Body");
        record.date = "sometime".to_string();
        assert_eq!(prepare(record).published_date, "sometime");
    }

    #[test]
    fn normalize_date_keeps_the_feed_calendar_day() {
        assert_eq!(normalize_date("Wed, 01 May 2024 22:30:00 -0500"), "05/01/2024");
        assert_eq!(normalize_date("2024-05-01T01:15:00+09:00"), "05/01/2024");
        assert_eq!(normalize_date("2024-05-01 23:59:00"), "05/01/2024");
    }

    #[tokio::test]
    async fn reshape_applies_sentinels_and_keeps_original_link() {
        let prediction = Prediction::empty()
            .with(TagField::OfficialStatus, "Published")
            .with(TagField::StatusForWzs, "No")
            .with(TagField::Region, "EMEA");
        let tagged = reshape(
            prepare(feed("Storm", "Heavy rain")),
            &prediction,
            &PassthroughShortener,
        )
        .await;

        assert_eq!(tagged.heading, "Storm");
        assert_eq!(tagged.content, "Heavy rain");
        assert_eq!(tagged.original_source, "https://e.com/storm");
        assert_eq!(tagged.live_source.as_deref(), Some("https://e.com/storm"));
        assert_eq!(tagged.official_status, "Final Check");
        assert_eq!(tagged.status_for_wzs, "");
        assert_eq!(tagged.region, "EMEA");
        assert_eq!(tagged.attachments, "");
        assert_eq!(tagged.source_button, "model");
        assert_eq!(tagged.publish_for_wzs, "model");
        assert_eq!(tagged.archive, "model");
    }

    #[tokio::test]
    async fn reshape_keeps_approved_wzs_status() {
        let prediction = Prediction::empty().with(TagField::StatusForWzs, "Yes");
        let tagged = reshape(prepare(feed("Storm", "")), &prediction, &NoShortLinks).await;
        assert_eq!(tagged.status_for_wzs, "Yes");
        assert_eq!(tagged.live_source, None);
        assert_eq!(tagged.original_source, "https://e.com/storm");
    }

    #[tokio::test]
    async fn predict_all_isolates_failures_and_keeps_order() {
        let corpus = FakeCorpus {
            hits: vec![CorpusMatch::new().with(TagField::Type, "Alert")],
            fail_search_for: Some("poison"),
            ..FakeCorpus::default()
        };
        let prepared: Vec<PreparedRecord> = [
            feed("Flood alert", ""),
            feed("Poison pill", ""),
            feed("Wind alert", ""),
        ]
        .into_iter()
        .map(prepare)
        .collect();

        let (predictions, failures) =
            predict_all(&corpus, &prepared, PredictOptions::default()).await;
        assert_eq!(failures, 1);
        assert_eq!(predictions.len(), 3);
        assert_eq!(predictions[0].get(TagField::Type), "Alert");
        assert!(predictions[1].is_empty());
        assert_eq!(predictions[2].get(TagField::Type), "Alert");
    }

    #[tokio::test]
    async fn tag_batch_persists_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let interval = dir.path().join("interval.csv");
        let backend = dir.path().join("backend.csv");
        let corpus = FakeCorpus {
            hits: vec![CorpusMatch::new().with(TagField::Region, "APAC")],
            ..FakeCorpus::default()
        };

        let (tagged, report) = tag_batch(
            &corpus,
            &NoShortLinks,
            vec![feed("Storm", "Heavy rain"), feed("Flood", "")],
            PredictOptions::default(),
            PersistTargets {
                interval_file: &interval,
                backend_file: &backend,
            },
        )
        .await;

        assert_eq!(report.state, BatchState::Done);
        assert_eq!(report.records, 2);
        assert_eq!(report.shortening_failures, 2);
        assert_eq!(report.backend_rows_appended, Some(2));
        assert_eq!(report.corpus_rows_stored, Some(2));
        assert!(report.errors.is_empty());
        assert!(!report.is_clean());

        assert_eq!(tagged.len(), 2);
        assert!(tagged.iter().all(|r| r.region == "APAC"));
        assert_eq!(crate::csv_io::read_tagged_csv(&interval).unwrap(), tagged);
        assert_eq!(corpus.appended.borrow()[1].content, "Flood");
    }

    #[tokio::test]
    async fn missing_interval_file_stops_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let interval = dir.path().join("missing.csv");
        let backend = dir.path().join("backend.csv");
        let corpus = FakeCorpus::default();

        let (tagged, report) = tag_interval_file(
            &corpus,
            &PassthroughShortener,
            PredictOptions::default(),
            PersistTargets {
                interval_file: &interval,
                backend_file: &backend,
            },
        )
        .await;

        assert!(tagged.is_empty());
        assert_eq!(report.state, BatchState::Errored(BatchStage::Load));
        assert_eq!(report.errors.len(), 1);
        assert!(!backend.exists());
        assert!(corpus.appended.borrow().is_empty());
    }
}
