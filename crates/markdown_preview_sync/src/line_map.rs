//! Precomputed source line to preview path table.
//!
//! Building the table is a single pass over the tokens, the result for every
//! line is the same path [`path_to_token`](crate::path_to_token) computes.

use crate::sync::{decode_tag, truncate_at_table, PathEntry, TagCounter};
use crate::token::{Nesting, Token};
use serde::Serialize;
use std::ops::Range;

/// Path of every source line, indexed by 0-based line number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LineMap {
    paths: Vec<Vec<PathEntry>>,
}

impl LineMap {
    pub fn build(tokens: &[Token]) -> Self {
        let line_count = tokens
            .iter()
            .filter_map(|token| token.map.map(|[_, end]| end))
            .max()
            .unwrap_or(0);

        let mut paths = vec![Vec::new(); line_count];
        let mut counter = TagCounter::new();
        let mut frames = vec![Frame {
            level: 0,
            prefix: Vec::new(),
            lines: LineSet::new(0..line_count),
        }];

        for token in tokens {
            while frames.len() > 1 && token.level < frames[frames.len() - 1].level {
                frames.pop();
                counter.ascend();
            }
            if token.hidden || token.nesting == Nesting::Close {
                continue;
            }
            let Some(tag) = decode_tag(token) else {
                continue;
            };
            let Some(frame) = frames.last_mut() else {
                break;
            };
            if token.level != frame.level {
                continue;
            }

            let entry = PathEntry::new(tag, counter.get(tag));
            counter.bump(tag);

            let Some([start, end]) = token.map else {
                continue;
            };
            let chosen = frame.lines.take(start..end);
            if chosen.is_empty() {
                continue;
            }

            let mut prefix = frame.prefix.clone();
            prefix.push(entry);
            truncate_at_table(&mut prefix);
            for line in chosen.iter() {
                paths[line].clone_from(&prefix);
            }

            if token.nesting == Nesting::Open && tag != "table" {
                let level = frame.level + 1;
                frames.push(Frame {
                    level,
                    prefix,
                    lines: chosen,
                });
                counter.descend();
            }
        }

        tracing::trace!(lines = line_count, tokens = tokens.len(), "Built line map");

        Self { paths }
    }

    /// Path of `line`, empty when the line maps to nothing.
    pub fn path(&self, line: usize) -> &[PathEntry] {
        self.paths.get(line).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of lines covered by the token stream.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[PathEntry])> {
        self.paths
            .iter()
            .enumerate()
            .map(|(line, path)| (line, path.as_slice()))
    }
}

/// An open container and the lines whose walk descended into it.
struct Frame {
    level: usize,
    prefix: Vec<PathEntry>,
    lines: LineSet,
}

/// Sorted, disjoint line ranges.
#[derive(Debug, Default, PartialEq, Eq)]
struct LineSet {
    ranges: Vec<Range<usize>>,
}

impl LineSet {
    fn new(range: Range<usize>) -> Self {
        let mut set = Self::default();
        if !range.is_empty() {
            set.ranges.push(range);
        }
        set
    }

    fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Removes the lines in `range` from the set and returns them.
    fn take(&mut self, range: Range<usize>) -> LineSet {
        let mut taken = LineSet::default();
        let mut kept = Vec::with_capacity(self.ranges.len() + 1);

        for current in self.ranges.drain(..) {
            let start = current.start.max(range.start);
            let end = current.end.min(range.end);
            if start >= end {
                kept.push(current);
                continue;
            }
            if current.start < start {
                kept.push(current.start..start);
            }
            taken.ranges.push(start..end);
            if end < current.end {
                kept.push(end..current.end);
            }
        }

        self.ranges = kept;
        taken
    }

    fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.ranges.iter().flat_map(Clone::clone)
    }
}
