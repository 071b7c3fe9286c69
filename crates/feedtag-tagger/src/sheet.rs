//! Row export to a Coda table.

use std::time::Duration;

use feedtag_core::{SheetConfig, TaggedRecord};
use reqwest::Client;
use serde::Serialize;

use crate::error::TaggerError;

/// Maximum rows per insert request.
pub const ROWS_PER_REQUEST: usize = 100;

#[derive(Serialize)]
struct Cell {
    column: &'static str,
    value: String,
}

#[derive(Serialize)]
struct Row {
    cells: Vec<Cell>,
}

#[derive(Serialize)]
struct InsertRows {
    rows: Vec<Row>,
}

impl From<&TaggedRecord> for Row {
    fn from(record: &TaggedRecord) -> Self {
        Self {
            cells: record
                .cells()
                .into_iter()
                .map(|(column, value)| Cell { column, value })
                .collect(),
        }
    }
}

/// Client for appending rows to one Coda table.
pub struct CodaClient {
    client: Client,
    rows_url: String,
    token: String,
}

impl CodaClient {
    /// # Errors
    ///
    /// Returns [`TaggerError::Http`] if the HTTP client cannot be constructed.
    pub fn new(config: &SheetConfig, timeout_secs: u64) -> Result<Self, TaggerError> {
        Self::with_base_url(
            &config.token,
            &config.doc_id,
            &config.table_id,
            timeout_secs,
            &config.base_url,
        )
    }

    /// # Errors
    ///
    /// Returns [`TaggerError::Http`] if the HTTP client cannot be constructed.
    pub fn with_base_url(
        token: &str,
        doc_id: &str,
        table_id: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, TaggerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            rows_url: format!(
                "{}/docs/{doc_id}/tables/{table_id}/rows",
                base_url.trim_end_matches('/')
            ),
            token: token.to_owned(),
        })
    }

    /// Append `records` to the table in chunks of [`ROWS_PER_REQUEST`].
    ///
    /// Returns the number of rows sent. Empty input sends nothing. A failing
    /// chunk stops the export; rows from earlier chunks stay in the table.
    ///
    /// # Errors
    ///
    /// - [`TaggerError::Http`] on network failure.
    /// - [`TaggerError::UnexpectedStatus`] on a non-2xx response.
    pub async fn append_rows(&self, records: &[TaggedRecord]) -> Result<usize, TaggerError> {
        let mut sent = 0;
        for chunk in records.chunks(ROWS_PER_REQUEST) {
            let body = InsertRows {
                rows: chunk.iter().map(Row::from).collect(),
            };

            let response = self
                .client
                .post(&self.rows_url)
                .bearer_auth(&self.token)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(TaggerError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: self.rows_url.clone(),
                });
            }

            sent += chunk.len();
            tracing::debug!(rows = chunk.len(), total = sent, "exported rows to sheet");
        }
        Ok(sent)
    }
}
