//! Naive substring scanner.
//!
//! Substitute for the automaton when it cannot be built. Reports exactly the
//! occurrences the automaton would, at O(patterns × text) cost.

use crate::routing::matcher::{normalize_pattern, PatternMatcher};
use crate::routing::types::{MatchCandidate, ReferenceItem};

#[derive(Debug)]
struct ScanEntry {
    pattern: String,
    task: String,
    length: usize,
    item_index: usize,
}

/// Scanner over a normalized copy of the reference snapshot.
#[derive(Debug, Default)]
pub struct FallbackScanner {
    entries: Vec<ScanEntry>,
}

impl FallbackScanner {
    /// Patterns that are empty after normalization are skipped; item indices
    /// still refer to the original positions in `items`.
    pub fn new(items: &[ReferenceItem]) -> Self {
        let entries = items
            .iter()
            .enumerate()
            .filter_map(|(item_index, item)| {
                let pattern = normalize_pattern(&item.pattern);
                if pattern.is_empty() {
                    return None;
                }
                Some(ScanEntry {
                    length: pattern.chars().count(),
                    pattern,
                    task: item.task.clone(),
                    item_index,
                })
            })
            .collect();

        Self { entries }
    }
}

/// One-off scan without keeping a scanner around.
///
/// Candidates borrow the original items: `pattern` is the item's pattern as
/// given, while offsets and lengths refer to its normalized form.
pub fn scan<'a>(text: &str, items: &'a [ReferenceItem]) -> Vec<MatchCandidate<'a>> {
    let char_starts = char_starts(text);
    let mut found = Vec::new();
    for (item_index, item) in items.iter().enumerate() {
        let pattern = normalize_pattern(&item.pattern);
        if pattern.is_empty() {
            continue;
        }
        let length = pattern.chars().count();
        for start_offset in occurrences(text, &char_starts, &pattern) {
            found.push(MatchCandidate {
                pattern: &item.pattern,
                task: &item.task,
                start_offset,
                length,
                item_index,
            });
        }
    }
    found
}

fn char_starts(text: &str) -> Vec<usize> {
    text.char_indices().map(|(b, _)| b).collect()
}

/// Char offsets of every occurrence of `pattern`, overlaps included.
/// `match_indices` skips overlaps, so every char boundary is tried.
fn occurrences<'t>(
    text: &'t str,
    char_starts: &'t [usize],
    pattern: &'t str,
) -> impl Iterator<Item = usize> + 't {
    char_starts
        .iter()
        .enumerate()
        .filter(move |&(_, &byte)| text[byte..].starts_with(pattern))
        .map(|(char_pos, _)| char_pos)
}

impl PatternMatcher for FallbackScanner {
    fn search<'a>(&'a self, text: &str) -> Vec<MatchCandidate<'a>> {
        let char_starts = char_starts(text);

        let mut found = Vec::new();
        for entry in &self.entries {
            for start_offset in occurrences(text, &char_starts, &entry.pattern) {
                found.push(MatchCandidate {
                    pattern: &entry.pattern,
                    task: &entry.task,
                    start_offset,
                    length: entry.length,
                    item_index: entry.item_index,
                });
            }
        }
        found
    }

    fn pattern_count(&self) -> usize {
        self.entries.len()
    }
}
