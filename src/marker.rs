/*
    MIT License

    Copyright (c) 2020 Lars Krueger <lars_e_krueger@gmx.de>

    Permission is hereby granted, free of charge, to any person obtaining a copy
    of this software and associated documentation files (the "Software"), to deal
    in the Software without restriction, including without limitation the rights
    to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
    copies of the Software, and to permit persons to whom the Software is
    furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in all
    copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
    OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
    SOFTWARE.
*/

//! Diagnostics and styling: the wire-facing annotations a parse attaches to
//! spans of the source text.
//!
//! `Styles` prefers the longest, most specific match the way a style lookup
//! over a node's ancestor path would, but does it the other way around:
//! since the navigator materializes a concrete tree rather than looking
//! styles up incrementally, `Styles::flatten` walks that tree in source
//! order and flattens overlapping node styles into non-overlapping ranges,
//! preferring whichever span is deepest at each point.

use std::cmp::Ordering;

/// Severity of a [`Marker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// The kind of condition a marker reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerKind {
    /// A token the lexer produced that no production could ever consume.
    UnknownToken,
    /// A zero-width token synthesized by the Insertion repair strategy.
    InsertedToken,
    /// A token the Deletion repair strategy treated as absent.
    MissingToken,
    /// A token the Mutation repair strategy treated as if it matched.
    TokenMutation,
    /// More than one derivation survived reduction at this span.
    Ambiguous,
}

/// A diagnostic attached to a span of the source text.
#[derive(Debug, Clone)]
pub struct Marker {
    pub offset: usize,
    pub length: usize,
    pub kind: MarkerKind,
    pub message: String,
    pub severity: Severity,
}

impl Marker {
    pub fn new(offset: usize, length: usize, kind: MarkerKind, message: impl Into<String>, severity: Severity) -> Self {
        Marker {
            offset,
            length,
            kind,
            message: message.into(),
            severity,
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// An opaque style tag a reduction action or post-processor can attach to a
/// node or token; this crate does not interpret the contents, only carries
/// and flattens it.
pub type Style = String;

/// A flattened, non-overlapping styled span of the source text, ready for a
/// caller to render.
#[derive(Debug, Clone)]
pub struct StyleRange {
    pub offset: usize,
    pub length: usize,
    pub style: Style,
}

/// One node's contribution to the style walk: its span and its style, if any.
pub struct StyledSpan {
    pub offset: usize,
    pub length: usize,
    pub style: Option<Style>,
    pub depth: usize,
}

/// Flattens a tree-order sequence of (possibly overlapping, possibly
/// depth-nested) styled spans into non-overlapping [`StyleRange`]s,
/// preferring the deepest (innermost) style covering each point.
pub struct Styles;

impl Styles {
    pub fn flatten(mut spans: Vec<StyledSpan>) -> Vec<StyleRange> {
        // Deepest spans must be carved into `ranges` before their shallower
        // ancestors, or an ancestor starting at a smaller offset claims the
        // whole point range before the descendant is ever visited.
        spans.sort_by(|a, b| match b.depth.cmp(&a.depth) {
            Ordering::Equal => a.offset.cmp(&b.offset),
            other => other,
        });

        let mut ranges: Vec<StyleRange> = Vec::new();
        for span in spans {
            let style = match span.style {
                Some(s) => s,
                None => continue,
            };
            if span.length == 0 {
                continue;
            }

            let new_end = span.offset + span.length;
            let mut cursor = span.offset;
            // Carve out any part of this span not already covered by a
            // deeper (already-inserted) range.
            while cursor < new_end {
                let overlapping = ranges
                    .iter()
                    .position(|r| r.offset <= cursor && cursor < r.offset + r.length);
                match overlapping {
                    Some(idx) => cursor = ranges[idx].offset + ranges[idx].length,
                    None => {
                        let next_boundary = ranges
                            .iter()
                            .map(|r| r.offset)
                            .filter(|&o| o > cursor && o < new_end)
                            .min()
                            .unwrap_or(new_end);
                        ranges.push(StyleRange {
                            offset: cursor,
                            length: next_boundary - cursor,
                            style: style.clone(),
                        });
                        cursor = next_boundary;
                    }
                }
            }
        }

        ranges.sort_by_key(|r| r.offset);
        ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_style_wins_over_outer() {
        let spans = vec![
            StyledSpan { offset: 0, length: 10, style: Some("expr".into()), depth: 0 },
            StyledSpan { offset: 2, length: 3, style: Some("literal".into()), depth: 1 },
        ];
        let ranges = Styles::flatten(spans);
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].style, "expr");
        assert_eq!(ranges[1].offset, 2);
        assert_eq!(ranges[1].style, "literal");
        assert_eq!(ranges[2].offset, 5);
        assert_eq!(ranges[2].style, "expr");
    }

    #[test]
    fn unstyled_spans_produce_no_range() {
        let spans = vec![StyledSpan { offset: 0, length: 4, style: None, depth: 0 }];
        assert!(Styles::flatten(spans).is_empty());
    }
}
