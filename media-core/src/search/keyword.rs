//! Keyword matching: tokenization, normalized scoring, snippets.

/// Lowercase a query and split it into distinct terms, preserving order.
#[must_use]
pub fn tokenize(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for token in query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        if !terms.iter().any(|existing| existing == token) {
            terms.push(token.to_string());
        }
    }
    terms
}

/// Normalized keyword relevance: the fraction of distinct query terms that
/// occur in the text, in `[0, 1]`. Matching more of the query ranks higher;
/// a bare single-term match never collapses to a full score unless the
/// query had a single term.
#[must_use]
pub fn keyword_score(text: &str, terms: &[String]) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let haystack = text.to_lowercase();
    let matched = terms
        .iter()
        .filter(|term| haystack.contains(term.as_str()))
        .count();
    #[allow(clippy::cast_precision_loss)]
    let coverage = matched as f32 / terms.len() as f32;
    coverage
}

/// Build a display snippet around the first term occurrence, truncated to
/// roughly `max_chars`. Falls back to a prefix when nothing matches.
#[must_use]
pub fn build_snippet(text: &str, terms: &[String], max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }

    let haystack = text.to_lowercase();
    let match_pos = terms
        .iter()
        .filter_map(|term| haystack.find(term.as_str()))
        .min()
        .map(|byte_pos| haystack[..byte_pos].chars().count())
        .unwrap_or(0);

    let start = match_pos.saturating_sub(max_chars / 2).min(chars.len());
    let end = (start + max_chars).min(chars.len());
    let mut snippet = String::new();
    if start > 0 {
        snippet.push('…');
    }
    snippet.extend(&chars[start..end]);
    if end < chars.len() {
        snippet.push('…');
    }
    snippet
}
