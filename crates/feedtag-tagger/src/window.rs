//! Trailing-window selection of feed records.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use feedtag_core::FeedRecord;

use crate::csv_io::read_feed_csv;
use crate::error::TaggerError;

/// Default window length: one hour.
pub const DEFAULT_WINDOW_SECS: u64 = 60 * 60;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parse a feed timestamp, keeping the feed's own offset. Naive values get
/// a zero offset.
#[must_use]
pub fn parse_local_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt);
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    for format in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| naive.and_utc().fixed_offset());
        }
    }
    None
}

/// Parse a feed timestamp as an instant. Offsets are honoured; naive values
/// are taken as UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    parse_local_timestamp(raw).map(|dt| dt.with_timezone(&Utc))
}

/// Convert a window length in seconds to a [`Duration`], saturating on overflow.
#[must_use]
pub fn window_duration(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// Keep the records published strictly after `now - window`.
///
/// Every record's date must parse; the first one that does not fails the
/// whole set so the caller can skip the source file.
///
/// # Errors
///
/// Returns [`TaggerError::Timestamp`] naming `source` and the 1-based data row.
pub fn window_records(
    records: Vec<FeedRecord>,
    now: DateTime<Utc>,
    window: Duration,
    source: &Path,
) -> Result<Vec<FeedRecord>, TaggerError> {
    let cutoff = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);

    let mut stamped = Vec::with_capacity(records.len());
    for (idx, record) in records.into_iter().enumerate() {
        let Some(published) = parse_timestamp(&record.date) else {
            return Err(TaggerError::Timestamp {
                path: source.to_path_buf(),
                row: idx + 1,
                value: record.date,
            });
        };
        stamped.push((published, record));
    }

    Ok(stamped
        .into_iter()
        .filter(|(published, _)| *published > cutoff)
        .map(|(_, record)| record)
        .collect())
}

/// Result of windowing every feed file in a directory.
#[derive(Debug, Default)]
pub struct WindowOutcome {
    pub records: Vec<FeedRecord>,
    pub files_windowed: usize,
    pub files_skipped: usize,
}

/// Window every `*.csv` file in `raw_dir`, in file-name order.
///
/// Files that cannot be read or contain an unparseable date are logged and
/// contribute nothing.
///
/// # Errors
///
/// Returns [`TaggerError::Io`] only if `raw_dir` itself cannot be listed.
pub fn window_directory(
    raw_dir: &Path,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<WindowOutcome, TaggerError> {
    let entries = std::fs::read_dir(raw_dir).map_err(|e| TaggerError::io(raw_dir, e))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();

    let mut outcome = WindowOutcome::default();
    for path in files {
        let windowed =
            read_feed_csv(&path).and_then(|records| window_records(records, now, window, &path));
        match windowed {
            Ok(records) => {
                tracing::debug!(
                    file = %path.display(),
                    count = records.len(),
                    "windowed feed file"
                );
                outcome.files_windowed += 1;
                outcome.records.extend(records);
            }
            Err(e) => {
                tracing::warn!(
                    file = %path.display(),
                    error = %e,
                    "skipping feed file"
                );
                outcome.files_skipped += 1;
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record(date: &str) -> FeedRecord {
        FeedRecord {
            title: format!("item at {date}"),
            date: date.to_string(),
            ..FeedRecord::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_common_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 11, 30, 0).unwrap();
        for raw in [
            "2024-05-01T11:30:00Z",
            "2024-05-01T13:30:00+02:00",
            "Wed, 01 May 2024 11:30:00 +0000",
            "2024-05-01 11:30:00",
            "2024-05-01T11:30:00",
            "2024-05-01 11:30",
            "05/01/2024 11:30:00",
        ] {
            assert_eq!(parse_timestamp(raw), Some(expected), "{raw}");
        }
        assert_eq!(
            parse_timestamp("2024-05-01"),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn local_timestamp_keeps_the_offset() {
        let local = parse_local_timestamp("Wed, 01 May 2024 22:30:00 -0500").unwrap();
        assert_eq!(local.offset().local_minus_utc(), -5 * 3600);
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(
            parse_timestamp("Wed, 01 May 2024 22:30:00 -0500"),
            Some(Utc.with_ymd_and_hms(2024, 5, 2, 3, 30, 0).unwrap())
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-13-45 99:00:00"), None);
    }

    #[test]
    fn boundary_is_exclusive() {
        let window = Duration::hours(1);
        let at_boundary = record("2024-05-01 11:00:00");
        let just_inside = record("2024-05-01 11:00:01");

        let kept = window_records(
            vec![at_boundary, just_inside.clone()],
            now(),
            window,
            Path::new("feed.csv"),
        )
        .unwrap();
        assert_eq!(kept, vec![just_inside]);
    }

    #[test]
    fn keeps_input_order() {
        let kept = window_records(
            vec![
                record("2024-05-01 11:50:00"),
                record("2024-05-01 09:00:00"),
                record("2024-05-01 11:10:00"),
            ],
            now(),
            Duration::hours(1),
            Path::new("feed.csv"),
        )
        .unwrap();
        let dates: Vec<&str> = kept.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-05-01 11:50:00", "2024-05-01 11:10:00"]);
    }

    #[test]
    fn one_bad_date_fails_the_file() {
        let err = window_records(
            vec![record("2024-05-01 11:50:00"), record("not a date")],
            now(),
            Duration::hours(1),
            Path::new("feed.csv"),
        )
        .unwrap_err();
        assert!(
            matches!(err, TaggerError::Timestamp { row: 2, ref value, .. } if value == "not a date"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn window_duration_saturates() {
        assert_eq!(window_duration(3600), Duration::hours(1));
        assert_eq!(window_duration(u64::MAX), Duration::MAX);
    }

    #[test]
    fn directory_skips_bad_files_and_non_csv() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.csv"),
            "Title,Link,Plain Description,Author,Date\n\
             Fresh,https://e.com/1,,Ann,2024-05-01 11:30:00\n\
             Stale,https://e.com/2,,Ann,2024-05-01 08:00:00\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.csv"),
            "Title,Link,Plain Description,Author,Date\n\
             Broken,https://e.com/3,,Bob,someday\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let outcome = window_directory(dir.path(), now(), Duration::hours(1)).unwrap();
        assert_eq!(outcome.files_windowed, 1);
        assert_eq!(outcome.files_skipped, 1);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].title, "Fresh");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            window_directory(&missing, now(), Duration::hours(1)),
            Err(TaggerError::Io { .. })
        ));
    }
}
