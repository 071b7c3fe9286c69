//! Tag prediction by full-text match against the reference corpus.

use std::collections::HashMap;

use feedtag_core::{CorpusDocument, CorpusMatch, Prediction, TagField};

use crate::error::TaggerError;
use crate::normalizer::top_tokens;

/// Number of normalized tokens sent to the corpus per query.
pub const DEFAULT_QUERY_TOKENS: usize = 800;

/// The reference corpus: searchable, and appended to with newly tagged rows.
#[allow(async_fn_in_trait)]
pub trait Corpus {
    /// Return up to `limit` documents matching any of `tokens` in any field,
    /// best match first.
    async fn search(&self, tokens: &[String], limit: usize)
        -> Result<Vec<CorpusMatch>, TaggerError>;

    /// Append documents; returns how many were stored.
    async fn append(&self, docs: &[CorpusDocument]) -> Result<usize, TaggerError>;
}

/// Query settings for [`try_predict`].
#[derive(Debug, Clone, Copy)]
pub struct PredictOptions {
    pub query_tokens: usize,
    pub top_k: usize,
}

impl Default for PredictOptions {
    fn default() -> Self {
        Self {
            query_tokens: DEFAULT_QUERY_TOKENS,
            top_k: 1,
        }
    }
}

/// Predict tags for `text`, surfacing corpus failures.
///
/// Text without any usable token yields an empty [`Prediction`] without
/// querying the corpus.
///
/// # Errors
///
/// Returns whatever error the corpus search produced.
pub async fn try_predict<C: Corpus>(
    corpus: &C,
    text: &str,
    options: PredictOptions,
) -> Result<Prediction, TaggerError> {
    let tokens = top_tokens(text, options.query_tokens);
    if tokens.is_empty() {
        return Ok(Prediction::empty());
    }

    let hits = corpus.search(&tokens, options.top_k.max(1)).await?;
    Ok(reduce_matches(&hits))
}

/// Predict tags for `text`; any corpus failure is logged and yields an empty
/// [`Prediction`].
pub async fn predict<C: Corpus>(corpus: &C, text: &str, options: PredictOptions) -> Prediction {
    match try_predict(corpus, text, options).await {
        Ok(prediction) => prediction,
        Err(e) => {
            tracing::warn!(error = %e, "tag prediction failed; using empty prediction");
            Prediction::empty()
        }
    }
}

/// Per field, the most frequent non-blank value across `hits`.
///
/// Ties go to the value seen first, i.e. the higher-ranked hit. Fields with no
/// value in any hit stay empty.
#[must_use]
pub fn reduce_matches(hits: &[CorpusMatch]) -> Prediction {
    let mut prediction = Prediction::empty();

    for field in TagField::ALL {
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
        for (rank, value) in hits.iter().filter_map(|h| h.get(field)).enumerate() {
            counts.entry(value).or_insert((0, rank)).0 += 1;
        }

        let mode = counts
            .into_iter()
            .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.1 .1.cmp(&a.1 .1)))
            .map(|(value, _)| value);

        if let Some(value) = mode {
            prediction.set(field, value);
        }
    }

    prediction
}
