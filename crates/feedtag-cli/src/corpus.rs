//! Postgres-backed reference corpus for the tagger.

use feedtag_core::{CorpusDocument, CorpusMatch};
use feedtag_db::DbError;
use feedtag_tagger::{Corpus, TaggerError};
use sqlx::PgPool;

/// `pool` is `None` when the store was unreachable at startup; every call
/// then fails fast and the tagger falls back to empty predictions.
pub(crate) struct PgCorpus<'a> {
    pool: Option<&'a PgPool>,
}

impl<'a> PgCorpus<'a> {
    pub(crate) fn new(pool: Option<&'a PgPool>) -> Self {
        Self { pool }
    }

    fn pool(&self) -> Result<&'a PgPool, TaggerError> {
        self.pool
            .ok_or_else(|| TaggerError::Corpus("corpus store unavailable".to_string()))
    }
}

fn corpus_error(e: DbError) -> TaggerError {
    TaggerError::Corpus(e.to_string())
}

impl Corpus for PgCorpus<'_> {
    async fn search(&self, tokens: &[String], limit: usize) -> Result<Vec<CorpusMatch>, TaggerError> {
        let rows = feedtag_db::search_corpus(self.pool()?, tokens, limit)
            .await
            .map_err(corpus_error)?;
        tracing::debug!(tokens = tokens.len(), hits = rows.len(), "corpus search");
        Ok(rows.into_iter().map(CorpusMatch::from).collect())
    }

    async fn append(&self, docs: &[CorpusDocument]) -> Result<usize, TaggerError> {
        feedtag_db::insert_corpus_documents(self.pool()?, docs)
            .await
            .map_err(corpus_error)
    }
}
