//! Free-text cleanup into a frequency-ranked token list.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::LazyLock;

use regex::Regex;

use crate::stopwords::is_stopword;

/// Characters deleted outright. Apostrophes are not among them: they split
/// contractions into stopword halves (`don't` becomes `don` and `t`).
const PUNCTUATION: &str = "@#!?+&*[]-%.:/();$=><|{}^_";

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?://|www\.)\S+").expect("valid url regex"));

static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^<>]*>").expect("valid html tag regex"));

/// Emoticons, pictographs, transport symbols, flags, dingbats and enclosed characters.
const EMOJI_RANGES: [RangeInclusive<u32>; 6] = [
    0x1F600..=0x1F64F,
    0x1F300..=0x1F5FF,
    0x1F680..=0x1F6FF,
    0x1F1E0..=0x1F1FF,
    0x2702..=0x27B0,
    0x24C2..=0x1F251,
];

fn is_emoji(c: char) -> bool {
    let code = u32::from(c);
    EMOJI_RANGES.iter().any(|range| range.contains(&code))
}

/// Return up to `n` distinct tokens from `text`, most frequent first.
///
/// The text is lowercased; URLs, HTML tags, punctuation and emoji are
/// removed; any other character that is not an ASCII letter separates
/// tokens. Stopwords are dropped. Ties keep first-occurrence order.
///
/// Every returned token is non-empty and purely `a-z`.
#[must_use]
pub fn top_tokens(text: &str, n: usize) -> Vec<String> {
    if n == 0 || text.trim().is_empty() {
        return Vec::new();
    }

    let lowered = text.to_lowercase();
    let without_urls = URL_RE.replace_all(&lowered, " ");
    let without_tags = HTML_TAG_RE.replace_all(&without_urls, " ");

    let cleaned: String = without_tags
        .chars()
        .filter(|c| !PUNCTUATION.contains(*c) && !is_emoji(*c))
        .map(|c| if c.is_ascii_lowercase() { c } else { ' ' })
        .collect();

    // token -> (count, first position)
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, token) in cleaned
        .split_whitespace()
        .filter(|t| !is_stopword(t))
        .enumerate()
    {
        counts.entry(token).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(token, (count, first))| (token, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .take(n)
        .map(|(token, _, _)| token.to_string())
        .collect()
}
