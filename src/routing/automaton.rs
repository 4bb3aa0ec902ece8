//! Aho–Corasick automaton over reference patterns.
//!
//! # Responsibilities
//! - Compile (pattern, task) pairs into a shared trie with failure links
//! - Report every pattern occurrence in one left-to-right pass
//!
//! # Design Decisions
//! - Arena allocation: nodes live in one Vec and link to each other by index
//! - Children kept sorted by char, looked up by binary search
//! - Output links skip failure-chain nodes that terminate nothing, so a
//!   search costs O(text + matches)
//! - Nodes terminating several identical patterns keep insertion order
//! - Transitions are on chars, so offsets and lengths are char counts

use std::collections::{HashSet, VecDeque};

use thiserror::Error;

use crate::routing::matcher::{normalize_pattern, PatternMatcher};
use crate::routing::types::{MatchCandidate, ReferenceItem};

/// Reasons the automaton cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// No reference items were supplied.
    #[error("reference set is empty")]
    EmptyReferenceSet,

    /// A reference pattern is empty after normalization.
    #[error("reference item {index} for task {task:?} has an empty pattern")]
    EmptyPattern { index: usize, task: String },
}

/// Index into the node arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
struct NodeIdx(u32);

impl NodeIdx {
    const ROOT: NodeIdx = NodeIdx(0);

    fn get(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Default)]
struct Node {
    /// (char, child) pairs sorted by char.
    children: Vec<(char, NodeIdx)>,
    /// Longest proper suffix of this node's path that is also a trie path.
    fail: NodeIdx,
    /// Nearest node on the failure chain with a non-empty `terminals`.
    output_link: Option<NodeIdx>,
    /// Entries whose pattern ends exactly here, in insertion order.
    terminals: Vec<u32>,
}

#[derive(Debug)]
struct PatternEntry {
    pattern: String,
    task: String,
    length: usize,
}

/// Compiled multi-pattern matcher. Read-only after [`build`].
#[derive(Debug)]
pub struct Automaton {
    nodes: Vec<Node>,
    entries: Vec<PatternEntry>,
}

/// Compile `items` into an automaton.
///
/// Entry indices equal item indices, which keeps insertion-order
/// tie-breaking aligned with the source snapshot.
pub fn build(items: &[ReferenceItem]) -> Result<Automaton, BuildError> {
    if items.is_empty() {
        return Err(BuildError::EmptyReferenceSet);
    }

    let mut automaton = Automaton {
        nodes: vec![Node::default()],
        entries: Vec::with_capacity(items.len()),
    };

    for (index, item) in items.iter().enumerate() {
        let pattern = normalize_pattern(&item.pattern);
        if pattern.is_empty() {
            return Err(BuildError::EmptyPattern {
                index,
                task: item.task.clone(),
            });
        }
        automaton.insert(pattern, item.task.clone());
    }

    automaton.link_failures();
    Ok(automaton)
}

impl Automaton {
    fn alloc(&mut self) -> NodeIdx {
        let idx = NodeIdx(self.nodes.len() as u32);
        self.nodes.push(Node::default());
        idx
    }

    fn child(&self, node: NodeIdx, ch: char) -> Option<NodeIdx> {
        let children = &self.nodes[node.get()].children;
        children
            .binary_search_by_key(&ch, |&(c, _)| c)
            .ok()
            .map(|pos| children[pos].1)
    }

    fn get_or_create_child(&mut self, parent: NodeIdx, ch: char) -> NodeIdx {
        let children = &self.nodes[parent.get()].children;
        match children.binary_search_by_key(&ch, |&(c, _)| c) {
            Ok(pos) => children[pos].1,
            Err(pos) => {
                let child = self.alloc();
                self.nodes[parent.get()].children.insert(pos, (ch, child));
                child
            }
        }
    }

    fn insert(&mut self, pattern: String, task: String) {
        let mut node = NodeIdx::ROOT;
        let mut length = 0;
        for ch in pattern.chars() {
            node = self.get_or_create_child(node, ch);
            length += 1;
        }

        let entry = self.entries.len() as u32;
        self.entries.push(PatternEntry {
            pattern,
            task,
            length,
        });
        self.nodes[node.get()].terminals.push(entry);
    }

    /// Breadth-first pass computing failure and output links. A node's
    /// failure target is always shallower, so it is finished first.
    fn link_failures(&mut self) {
        let mut queue = VecDeque::new();

        let root_children = self.nodes[NodeIdx::ROOT.get()].children.clone();
        for (_, child) in root_children {
            self.nodes[child.get()].fail = NodeIdx::ROOT;
            queue.push_back(child);
        }

        while let Some(node) = queue.pop_front() {
            let children = self.nodes[node.get()].children.clone();
            for (ch, child) in children {
                queue.push_back(child);

                let mut f = self.nodes[node.get()].fail;
                let fail = loop {
                    if let Some(next) = self.child(f, ch) {
                        break next;
                    }
                    if f == NodeIdx::ROOT {
                        break NodeIdx::ROOT;
                    }
                    f = self.nodes[f.get()].fail;
                };

                let target = &self.nodes[fail.get()];
                let output_link = if target.terminals.is_empty() {
                    target.output_link
                } else {
                    Some(fail)
                };

                let child_node = &mut self.nodes[child.get()];
                child_node.fail = fail;
                child_node.output_link = output_link;
            }
        }
    }

    fn step(&self, mut state: NodeIdx, ch: char) -> NodeIdx {
        loop {
            if let Some(next) = self.child(state, ch) {
                return next;
            }
            if state == NodeIdx::ROOT {
                return NodeIdx::ROOT;
            }
            state = self.nodes[state.get()].fail;
        }
    }

    /// Number of trie nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of distinct task identifiers.
    pub fn task_count(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.task.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

impl PatternMatcher for Automaton {
    fn search<'a>(&'a self, text: &str) -> Vec<MatchCandidate<'a>> {
        let mut found = Vec::new();
        let mut state = NodeIdx::ROOT;

        for (pos, ch) in text.chars().enumerate() {
            state = self.step(state, ch);
            let end = pos + 1;

            let mut node = Some(state);
            while let Some(idx) = node {
                let current = &self.nodes[idx.get()];
                for &entry_idx in &current.terminals {
                    let entry = &self.entries[entry_idx as usize];
                    found.push(MatchCandidate {
                        pattern: &entry.pattern,
                        task: &entry.task,
                        start_offset: end - entry.length,
                        length: entry.length,
                        item_index: entry_idx as usize,
                    });
                }
                node = current.output_link;
            }
        }

        found
    }

    fn pattern_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(pairs: &[(&str, &str)]) -> Vec<ReferenceItem> {
        pairs.iter().map(|(p, t)| ReferenceItem::new(*p, *t)).collect()
    }

    fn occurrences(automaton: &Automaton, text: &str) -> Vec<(String, usize)> {
        let mut found: Vec<_> = automaton
            .search(text)
            .into_iter()
            .map(|c| (c.pattern.to_string(), c.start_offset))
            .collect();
        found.sort();
        found
    }

    #[test]
    fn test_empty_set_is_rejected() {
        assert_eq!(build(&[]).unwrap_err(), BuildError::EmptyReferenceSet);
    }

    #[test]
    fn test_blank_pattern_is_rejected() {
        let err = build(&items(&[("fix bug", "a"), ("  ", "b")])).unwrap_err();
        assert_eq!(
            err,
            BuildError::EmptyPattern {
                index: 1,
                task: "b".into()
            }
        );
    }

    #[test]
    fn test_overlapping_occurrences() {
        let automaton = build(&items(&[("he", "1"), ("she", "2"), ("his", "3"), ("hers", "4")])).unwrap();
        assert_eq!(
            occurrences(&automaton, "ushers"),
            vec![("he".into(), 2), ("hers".into(), 2), ("she".into(), 1)]
        );
    }

    #[test]
    fn test_repeated_and_self_overlapping() {
        let automaton = build(&items(&[("aa", "t")])).unwrap();
        assert_eq!(
            occurrences(&automaton, "aaaa"),
            vec![("aa".into(), 0), ("aa".into(), 1), ("aa".into(), 2)]
        );
    }

    #[test]
    fn test_patterns_are_normalized() {
        let automaton = build(&items(&[("  Fix BUG ", "dev")])).unwrap();
        let found = automaton.search("please fix bug now");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pattern, "fix bug");
        assert_eq!(found[0].start_offset, 7);
        assert_eq!(found[0].length, 7);
    }

    #[test]
    fn test_identical_patterns_keep_insertion_order() {
        let automaton = build(&items(&[
            ("investigate incident logs", "Production_Support"),
            ("investigate incident logs", "Incident_Resolution"),
        ]))
        .unwrap();
        let found = automaton.search("investigate incident logs");
        let tasks: Vec<_> = found.iter().map(|c| (c.task, c.item_index)).collect();
        assert_eq!(
            tasks,
            vec![("Production_Support", 0), ("Incident_Resolution", 1)]
        );
    }

    #[test]
    fn test_offsets_count_chars() {
        let automaton = build(&items(&[("café", "food")])).unwrap();
        let found = automaton.search("ünë café");
        assert_eq!(found[0].start_offset, 4);
        assert_eq!(found[0].length, 4);
    }

    #[test]
    fn test_no_match_is_empty() {
        let automaton = build(&items(&[("refund", "billing.refund")])).unwrap();
        assert!(automaton.search("what is the weather").is_empty());
        assert!(automaton.search("").is_empty());
    }

    #[test]
    fn test_stats() {
        let automaton = build(&items(&[("ab", "x"), ("ac", "x"), ("b", "y")])).unwrap();
        assert_eq!(automaton.pattern_count(), 3);
        assert_eq!(automaton.task_count(), 2);
        // root, a, ab, ac, b
        assert_eq!(automaton.node_count(), 5);
    }
}
