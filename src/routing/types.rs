//! Routing data model.
//!
//! # Responsibilities
//! - Reference items (pattern → task) as delivered by a reference source
//! - Match candidates produced by a search pass
//! - Routing results and the externally visible response shape
//! - Deterministic best-candidate selection

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A canonical reference phrase associated with exactly one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceItem {
    /// Phrase searched for as a substring of the prompt.
    pub pattern: String,
    /// Task identifier returned when the phrase wins.
    pub task: String,
}

impl ReferenceItem {
    pub fn new(pattern: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            task: task.into(),
        }
    }
}

/// One occurrence of a reference pattern inside a normalized prompt.
///
/// Offsets and lengths are measured in characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchCandidate<'a> {
    /// Normalized pattern text.
    pub pattern: &'a str,
    /// Task of the reference item the pattern came from.
    pub task: &'a str,
    /// Character offset of the first matched character.
    pub start_offset: usize,
    /// Pattern length in characters.
    pub length: usize,
    /// Position of the reference item in the loaded snapshot.
    pub item_index: usize,
}

impl MatchCandidate<'_> {
    /// Precedence used by best-match selection: longer wins, then earlier
    /// start, then earlier reference item. `Greater` means `self` wins.
    pub fn precedence(&self, other: &Self) -> Ordering {
        self.length
            .cmp(&other.length)
            .then_with(|| other.start_offset.cmp(&self.start_offset))
            .then_with(|| other.item_index.cmp(&self.item_index))
    }
}

/// Select the winning candidate, or `None` for an empty slice.
pub fn select_best<'a, 'b>(candidates: &'b [MatchCandidate<'a>]) -> Option<&'b MatchCandidate<'a>> {
    candidates.iter().max_by(|a, b| a.precedence(b))
}

/// Outcome classification of a routing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    /// A task was selected.
    Routed,
    /// No reference pattern occurs in the prompt.
    NoMatch,
    /// A pattern occurs but its coverage is under the threshold.
    BelowThreshold,
    /// Reference data could not be loaded; nothing to match against.
    MatcherUnavailable,
}

impl RouteStatus {
    /// Error string for the external response, `None` when routed.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            RouteStatus::Routed => None,
            RouteStatus::NoMatch => Some("no_match"),
            RouteStatus::BelowThreshold => Some("below_threshold"),
            RouteStatus::MatcherUnavailable => Some("matcher_unavailable"),
        }
    }

    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        self.error_code().unwrap_or("routed")
    }
}

impl std::fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full result of routing one prompt.
///
/// Invariant: `task.is_some()` exactly when `status == Routed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingResult {
    pub task: Option<String>,
    pub score: Option<f64>,
    pub matched_pattern: Option<String>,
    #[serde(rename = "error")]
    pub status: RouteStatus,
}

impl RoutingResult {
    pub fn routed(task: impl Into<String>, score: f64, matched_pattern: impl Into<String>) -> Self {
        Self {
            task: Some(task.into()),
            score: Some(score),
            matched_pattern: Some(matched_pattern.into()),
            status: RouteStatus::Routed,
        }
    }

    /// Score and pattern are kept for diagnostics even though routing failed.
    pub fn below_threshold(score: f64, matched_pattern: impl Into<String>) -> Self {
        Self {
            task: None,
            score: Some(score),
            matched_pattern: Some(matched_pattern.into()),
            status: RouteStatus::BelowThreshold,
        }
    }

    pub fn no_match() -> Self {
        Self::failed(RouteStatus::NoMatch)
    }

    pub fn unavailable() -> Self {
        Self::failed(RouteStatus::MatcherUnavailable)
    }

    fn failed(status: RouteStatus) -> Self {
        Self {
            task: None,
            score: None,
            matched_pattern: None,
            status,
        }
    }

    pub fn is_routed(&self) -> bool {
        self.status == RouteStatus::Routed
    }
}

/// The inbound-call response: `{ task, score, error }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    pub task: Option<String>,
    pub score: Option<f64>,
    pub error: Option<String>,
}

impl From<&RoutingResult> for RouteResponse {
    fn from(result: &RoutingResult) -> Self {
        Self {
            task: result.task.clone(),
            score: result.score,
            error: result.status.error_code().map(str::to_string),
        }
    }
}

impl From<RoutingResult> for RouteResponse {
    fn from(result: RoutingResult) -> Self {
        Self {
            error: result.status.error_code().map(str::to_string),
            task: result.task,
            score: result.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(pattern: &str, start: usize, item: usize) -> MatchCandidate<'_> {
        MatchCandidate {
            pattern,
            task: "t",
            start_offset: start,
            length: pattern.chars().count(),
            item_index: item,
        }
    }

    #[test]
    fn test_longest_candidate_wins() {
        let cands = [candidate("a", 1, 0), candidate("ab", 1, 1)];
        assert_eq!(select_best(&cands).unwrap().pattern, "ab");
    }

    #[test]
    fn test_tie_breaks_on_offset_then_insertion_order() {
        let cands = [candidate("xy", 5, 0), candidate("ab", 2, 3), candidate("cd", 2, 1)];
        let best = select_best(&cands).unwrap();
        assert_eq!(best.pattern, "cd");
        assert_eq!(best.item_index, 1);
    }

    #[test]
    fn test_select_best_empty() {
        assert!(select_best(&[]).is_none());
    }

    #[test]
    fn test_response_shape() {
        let ok = RouteResponse::from(RoutingResult::routed("task.greet", 1.0, "hello world"));
        assert_eq!(ok.task.as_deref(), Some("task.greet"));
        assert!(ok.error.is_none());

        let below = RouteResponse::from(RoutingResult::below_threshold(0.275, "hello world"));
        assert_eq!(below.error.as_deref(), Some("below_threshold"));
        assert_eq!(below.score, Some(0.275));
        assert!(below.task.is_none());

        let json = serde_json::to_value(RouteResponse::from(RoutingResult::no_match())).unwrap();
        assert_eq!(json["error"], "no_match");
        assert!(json["task"].is_null());
        assert!(json["score"].is_null());
    }

    #[test]
    fn test_status_serializes_as_error_field() {
        let json = serde_json::to_value(RoutingResult::unavailable()).unwrap();
        assert_eq!(json["error"], "matcher_unavailable");
    }
}
