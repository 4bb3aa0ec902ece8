//! Pattern matching capability.
//!
//! # Responsibilities
//! - Define the search interface shared by every matching strategy
//! - Define prompt and pattern normalization
//!
//! # Design Decisions
//! - Matching is case-insensitive via lower-casing, done by the caller
//! - Strategies never re-normalize the text they are given
//! - Patterns are trimmed and lower-cased once, when a strategy is built
//! - Substring containment only; no regex, no tokenization

use crate::routing::types::MatchCandidate;

/// A strategy that reports every occurrence of its reference patterns.
///
/// Implementations are immutable once built and shared across threads.
pub trait PatternMatcher: Send + Sync + std::fmt::Debug {
    /// Report every occurrence (overlapping included) of every pattern in
    /// `text`. `text` must already be normalized with [`normalize_prompt`].
    fn search<'a>(&'a self, text: &str) -> Vec<MatchCandidate<'a>>;

    /// Number of reference patterns this strategy searches for.
    fn pattern_count(&self) -> usize;
}

/// Normalize a prompt before searching.
pub fn normalize_prompt(prompt: &str) -> String {
    prompt.to_lowercase()
}

/// Normalize a reference pattern. May return an empty string.
pub fn normalize_pattern(pattern: &str) -> String {
    pattern.trim().to_lowercase()
}
