//! Header-addressed CSV reading and writing for feed, interval and backend files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use feedtag_core::{CorpusDocument, FeedRecord, TaggedRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::TaggerError;

/// Column order of an untagged interval file.
pub const FEED_COLUMNS: [&str; 5] = ["Title", "Link", "Plain Description", "Author", "Date"];

const ORIGINAL_SOURCE: &str = "Original Source";

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, TaggerError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| TaggerError::csv(path, e))?;

    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| TaggerError::csv(path, e))
}

/// Write `rows` under an explicit header so an empty file still carries one.
fn write_rows<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<(), TaggerError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| TaggerError::csv(path, e))?;

    writer
        .write_record(header)
        .map_err(|e| TaggerError::csv(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| TaggerError::csv(path, e))?;
    }
    writer.flush().map_err(|e| TaggerError::io(path, e))
}

/// Read a downloaded feed file. Extra columns are ignored; `Date` is required.
///
/// # Errors
///
/// Returns [`TaggerError::Csv`] if the file is unreadable or a row lacks a `Date`.
pub fn read_feed_csv(path: &Path) -> Result<Vec<FeedRecord>, TaggerError> {
    read_rows(path)
}

/// Write the windowed (untagged) interval file.
///
/// # Errors
///
/// Returns [`TaggerError::Csv`] or [`TaggerError::Io`] on write failure.
pub fn write_interval_csv(path: &Path, records: &[FeedRecord]) -> Result<(), TaggerError> {
    write_rows(path, &FEED_COLUMNS, records)
}

/// Read the untagged interval file back for tagging.
///
/// # Errors
///
/// Returns [`TaggerError::Csv`] if the file is missing or malformed.
pub fn read_interval_csv(path: &Path) -> Result<Vec<FeedRecord>, TaggerError> {
    read_rows(path)
}

/// Overwrite `path` with tagged rows in destination column order.
///
/// # Errors
///
/// Returns [`TaggerError::Csv`] or [`TaggerError::Io`] on write failure.
pub fn write_tagged_csv(path: &Path, records: &[TaggedRecord]) -> Result<(), TaggerError> {
    write_rows(path, &TaggedRecord::COLUMNS, records)
}

/// # Errors
///
/// Returns [`TaggerError::Csv`] if the file is missing or malformed.
pub fn read_tagged_csv(path: &Path) -> Result<Vec<TaggedRecord>, TaggerError> {
    read_rows(path)
}

/// Read corpus documents from any CSV carrying the store columns, such as the
/// backend file. Rows without heading or content are dropped.
///
/// # Errors
///
/// Returns [`TaggerError::Csv`] if the file is missing or malformed.
pub fn read_corpus_documents(path: &Path) -> Result<Vec<CorpusDocument>, TaggerError> {
    let docs: Vec<CorpusDocument> = read_rows(path)?;
    Ok(docs.into_iter().filter(CorpusDocument::is_storable).collect())
}

/// Append tagged rows to the cumulative backend file.
///
/// The existing header order is kept and any missing destination column is
/// added at the end. Cells beyond an existing row's header get unnamed
/// columns so they are kept. Rows whose `Original Source` already appears in the file
/// (or earlier in `records`) are skipped, so re-running a batch is harmless.
/// The file is rewritten through a sibling temporary file.
///
/// Returns the number of rows appended.
///
/// # Errors
///
/// Returns [`TaggerError::Csv`] or [`TaggerError::Io`] on read or write failure.
pub fn append_backend_csv(path: &Path, records: &[TaggedRecord]) -> Result<usize, TaggerError> {
    let (mut header, mut rows) = if path.exists() {
        read_raw(path)?
    } else {
        (Vec::new(), Vec::new())
    };

    let widest = rows.iter().map(Vec::len).max().unwrap_or(0);
    if widest > header.len() {
        header.resize(widest, String::new());
    }
    for column in TaggedRecord::COLUMNS {
        if !header.iter().any(|h| h == column) {
            header.push(column.to_string());
        }
    }
    for row in &mut rows {
        row.resize(header.len(), String::new());
    }

    let source_idx = header.iter().position(|h| h == ORIGINAL_SOURCE);
    let mut seen: HashSet<String> = source_idx
        .map(|idx| {
            rows.iter()
                .map(|row| row[idx].trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let mut appended = 0;
    for record in records {
        let source = record.original_source.trim();
        if !source.is_empty() && !seen.insert(source.to_string()) {
            tracing::debug!(source, "row already in backend file; skipping");
            continue;
        }

        let cells = record.cells();
        let row = header
            .iter()
            .map(|column| {
                cells
                    .iter()
                    .find(|(name, _)| *name == column.as_str())
                    .map(|(_, value)| value.clone())
                    .unwrap_or_default()
            })
            .collect();
        rows.push(row);
        appended += 1;
    }

    if appended > 0 || !path.exists() {
        write_raw(path, &header, &rows)?;
    }
    Ok(appended)
}

fn read_raw(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), TaggerError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| TaggerError::csv(path, e))?;

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| TaggerError::csv(path, e))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| TaggerError::csv(path, e))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok((header, rows))
}

fn write_raw(path: &Path, header: &[String], rows: &[Vec<String>]) -> Result<(), TaggerError> {
    let tmp = temp_path(path);
    {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&tmp)
            .map_err(|e| TaggerError::csv(&tmp, e))?;
        writer
            .write_record(header)
            .map_err(|e| TaggerError::csv(&tmp, e))?;
        for row in rows {
            writer
                .write_record(row)
                .map_err(|e| TaggerError::csv(&tmp, e))?;
        }
        writer.flush().map_err(|e| TaggerError::io(&tmp, e))?;
    }
    std::fs::rename(&tmp, path).map_err(|e| TaggerError::io(path, e))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(heading: &str, source: &str) -> TaggedRecord {
        TaggedRecord {
            heading: heading.to_string(),
            content: format!("{heading} body"),
            live_source: Some(format!("https://sho.rt/{heading}")),
            official_status: "Final Check".to_string(),
            region: "EMEA".to_string(),
            original_source: source.to_string(),
            ..TaggedRecord::default()
        }
    }

    #[test]
    fn interval_file_round_trips_and_keeps_header_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interval.csv");

        write_interval_csv(&path, &[]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), "Title,Link,Plain Description,Author,Date");
        assert!(read_interval_csv(&path).unwrap().is_empty());

        let record = FeedRecord {
            title: "Storm, warning".to_string(),
            link: "https://e.com/a".to_string(),
            plain_description: "Heavy \"rain\"".to_string(),
            author: "Ann".to_string(),
            date: "2024-05-01 11:30:00".to_string(),
        };
        write_interval_csv(&path, std::slice::from_ref(&record)).unwrap();
        assert_eq!(read_interval_csv(&path).unwrap(), vec![record]);
    }

    #[test]
    fn tagged_file_uses_destination_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagged.csv");
        let mut record = tagged("storm", "https://e.com/storm");
        record.live_source = None;
        write_tagged_csv(&path, std::slice::from_ref(&record)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Heading,Live Source,Content,Author,Published Date"));
        assert_eq!(read_tagged_csv(&path).unwrap(), vec![record]);
    }

    #[test]
    fn backend_append_creates_file_and_skips_known_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.csv");

        let first = append_backend_csv(
            &path,
            &[tagged("a", "https://e.com/a"), tagged("b", "https://e.com/b")],
        )
        .unwrap();
        assert_eq!(first, 2);

        let second = append_backend_csv(
            &path,
            &[tagged("b", "https://e.com/b"), tagged("c", "https://e.com/c")],
        )
        .unwrap();
        assert_eq!(second, 1);

        let rows = read_tagged_csv(&path).unwrap();
        let headings: Vec<&str> = rows.iter().map(|r| r.heading.as_str()).collect();
        assert_eq!(headings, vec!["a", "b", "c"]);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn backend_append_preserves_existing_header_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.csv");
        std::fs::write(
            &path,
            "Notes,Original Source,Heading\nkeep me,https://e.com/old,Old\n",
        )
        .unwrap();

        let appended = append_backend_csv(&path, &[tagged("new", "https://e.com/new")]).unwrap();
        assert_eq!(appended, 1);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let header: Vec<String> = reader
            .headers()
            .unwrap()
            .iter()
            .map(str::to_string)
            .collect();
        assert_eq!(&header[..3], &["Notes", "Original Source", "Heading"]);
        assert_eq!(header.len(), 3 + TaggedRecord::COLUMNS.len() - 2);

        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "keep me");
        assert_eq!(&rows[1][0], "");
        assert_eq!(&rows[1][2], "new");
    }

    #[test]
    fn backend_append_keeps_cells_beyond_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.csv");
        std::fs::write(
            &path,
            "Heading,Original Source
Old,https://e.com/old,stray note,second
",
        )
        .unwrap();

        append_backend_csv(&path, &[tagged("new", "https://e.com/new")]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let header: Vec<String> = reader
            .headers()
            .unwrap()
            .iter()
            .map(str::to_string)
            .collect();
        assert_eq!(&header[..4], &["Heading", "Original Source", "", ""]);
        assert_eq!(header.len(), 4 + TaggedRecord::COLUMNS.len() - 2);

        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(&rows[0][2], "stray note");
        assert_eq!(&rows[0][3], "second");
        assert_eq!(&rows[1][0], "new");
        assert_eq!(&rows[1][2], "");
        assert_eq!(rows[1].len(), header.len());
    }

    #[test]
    fn backend_append_with_only_duplicates_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.csv");
        append_backend_csv(&path, &[tagged("a", "https://e.com/a")]).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let appended = append_backend_csv(&path, &[tagged("a", "https://e.com/a")]).unwrap();
        assert_eq!(appended, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn corpus_documents_drop_incomplete_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.csv");
        std::fs::write(
            &path,
            "Heading,Content,Region,Type,Live Source\n\
             Flood alert,River levels rising,EMEA,Alert,https://sho.rt/x\n\
             No body,,APAC,Notice,\n",
        )
        .unwrap();

        let docs = read_corpus_documents(&path).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].heading, "Flood alert");
        assert_eq!(docs[0].region, "EMEA");
        assert_eq!(docs[0].kind, "Alert");
        assert_eq!(docs[0].platform, "");
    }

    #[test]
    fn feed_csv_requires_date_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.csv");
        std::fs::write(&path, "Title,Link\nStorm,https://e.com/a\n").unwrap();
        assert!(matches!(read_feed_csv(&path), Err(TaggerError::Csv { .. })));
    }
}
