//! Database operations for the `corpus_documents` table.
//!
//! The table is both the durable store for tagged records and the reference
//! corpus searched when predicting tags for new ones.

use feedtag_core::{CorpusDocument, CorpusMatch, TagField};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// The tag projection of a `corpus_documents` row returned by [`search_corpus`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CorpusMatchRow {
    pub id: i64,
    pub official_status: String,
    pub platform: String,
    pub priority_level: String,
    pub region: String,
    pub status_for_wzs: String,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub category: String,
    pub rank: f32,
}

impl From<CorpusMatchRow> for CorpusMatch {
    fn from(row: CorpusMatchRow) -> Self {
        CorpusMatch::new()
            .with(TagField::OfficialStatus, row.official_status)
            .with(TagField::Platform, row.platform)
            .with(TagField::PriorityLevel, row.priority_level)
            .with(TagField::Region, row.region)
            .with(TagField::StatusForWzs, row.status_for_wzs)
            .with(TagField::Type, row.kind)
            .with(TagField::Category, row.category)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Stable duplicate-detection key: hex SHA-256 of `heading + "\n" + content`.
#[must_use]
pub fn dedup_key(doc: &CorpusDocument) -> String {
    let mut hasher = Sha256::new();
    hasher.update(doc.heading.trim().as_bytes());
    hasher.update(b"\n");
    hasher.update(doc.content.trim().as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Build a `to_tsquery` expression matching any of `tokens`.
///
/// Characters that are not alphanumeric are dropped so that tsquery operators
/// can never be injected through a token. Returns `None` when nothing is left.
#[must_use]
pub fn build_or_query(tokens: &[String]) -> Option<String> {
    let terms: Vec<String> = tokens
        .iter()
        .map(|t| t.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|t| !t.is_empty())
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" | "))
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Insert documents, skipping any without heading and content and any whose
/// [`dedup_key`] is already stored.
///
/// All inserts run inside a single transaction. Returns the number of rows
/// actually inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn insert_corpus_documents(
    pool: &PgPool,
    docs: &[CorpusDocument],
) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for doc in docs.iter().filter(|d| d.is_storable()) {
        let result = sqlx::query(
            "INSERT INTO corpus_documents \
                 (heading, content, status_for_wzs, official_status, region, \
                  priority_level, type, category, platform, dedup_key) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (dedup_key) DO NOTHING",
        )
        .bind(&doc.heading)
        .bind(&doc.content)
        .bind(&doc.status_for_wzs)
        .bind(&doc.official_status)
        .bind(&doc.region)
        .bind(&doc.priority_level)
        .bind(&doc.kind)
        .bind(&doc.category)
        .bind(&doc.platform)
        .bind(dedup_key(doc))
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Full-text search over every text column, OR-ing the given tokens.
///
/// Results are ordered by `ts_rank DESC` then `id ASC` and capped at `limit`.
/// An empty token list returns no rows without touching the database.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn search_corpus(
    pool: &PgPool,
    tokens: &[String],
    limit: usize,
) -> Result<Vec<CorpusMatchRow>, DbError> {
    let Some(query) = build_or_query(tokens) else {
        return Ok(Vec::new());
    };
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let rows = sqlx::query_as::<_, CorpusMatchRow>(
        "SELECT id, official_status, platform, priority_level, region, \
                status_for_wzs, type, category, \
                ts_rank(search_vector, query) AS rank \
         FROM corpus_documents, to_tsquery('simple', $1) AS query \
         WHERE search_vector @@ query \
         ORDER BY rank DESC, id ASC \
         LIMIT $2",
    )
    .bind(query)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Number of documents currently in the corpus.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_corpus_documents(pool: &PgPool) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM corpus_documents")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Bootstrap an empty corpus from previously tagged documents.
///
/// Does nothing and returns `Ok(None)` if the corpus already holds rows;
/// otherwise returns the number inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_corpus_if_empty(
    pool: &PgPool,
    docs: &[CorpusDocument],
) -> Result<Option<usize>, DbError> {
    if count_corpus_documents(pool).await? > 0 {
        return Ok(None);
    }
    insert_corpus_documents(pool, docs).await.map(Some)
}
