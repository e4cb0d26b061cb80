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

//! Parse-forest navigator: walks back-pointers to reconstruct derivation
//! trees, running reduction actions and collapsing ambiguity with a
//! pluggable reducer stack.
//!
//! Rather than enumerate every candidate derivation and hand them all back,
//! the walk here runs a tournament as it goes, pruning losing branches
//! before they're ever fully materialized.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::context::{ActionContext, Context};
use crate::grammar::{ActionArg, ActionValue, Feature, Grammar};
use crate::marker::{Marker, MarkerKind, Severity, Style, StyleRange, StyledSpan, Styles};
use crate::recognizer::{Causal, Chart, TerminalItem};
use crate::result::ParseRecord;
use crate::token::Token;

/// `(branchCount, abortedBranchCount)` shared across every clone of the
/// handle attached to one ambiguous node, so a reducer elsewhere that drops
/// a branch is visible to every other holder of the same handle.
#[derive(Clone)]
pub struct Ambiguity(Rc<Cell<(u32, u32)>>);

impl Ambiguity {
    pub fn new(branch_count: u32) -> Self {
        Ambiguity(Rc::new(Cell::new((branch_count, 0))))
    }

    pub fn increment_aborted(&self) {
        let (b, a) = self.0.get();
        self.0.set((b, a + 1));
    }

    pub fn branch_count(&self) -> u32 {
        self.0.get().0
    }

    pub fn aborted_branch_count(&self) -> u32 {
        self.0.get().1
    }

    /// `ambiguous ≡ branchCount − abortedBranchCount > 1`.
    pub fn has_ambiguity(&self) -> bool {
        self.branch_count().saturating_sub(self.aborted_branch_count()) > 1
    }

    pub fn was_ambiguous(&self) -> bool {
        self.branch_count() > 1
    }
}

/// One node of a reconstructed derivation tree.
#[derive(Clone)]
pub enum GenericNode {
    NonTerminal {
        production: usize,
        offset: usize,
        length: usize,
        children: Vec<GenericNode>,
        value: ActionValue,
        ambiguity: Option<Ambiguity>,
        markers: Vec<Marker>,
        /// `(offset, length, style)` this node's own reduction set via
        /// `ActionContext::set_style`, not including children's.
        styles: Vec<(usize, usize, Style)>,
        /// `(token_offset, style)` this node's own reduction set via
        /// `ActionContext::set_token_style`, not including children's.
        token_styles: Vec<(usize, Style)>,
    },
    Terminal {
        token: Token,
        /// Set for a zero-width token synthesized by Insertion repair:
        /// present in the tree for offset bookkeeping, but excluded from
        /// the `args` a parent's reduction action receives.
        excluded_from_args: bool,
    },
}

impl GenericNode {
    pub fn offset(&self) -> usize {
        match self {
            GenericNode::NonTerminal { offset, .. } => *offset,
            GenericNode::Terminal { token, .. } => token.offset,
        }
    }

    pub fn length(&self) -> usize {
        match self {
            GenericNode::NonTerminal { length, .. } => *length,
            GenericNode::Terminal { token, .. } => token.length,
        }
    }

    /// Deepest node whose span covers `offset`, the way a completion cursor
    /// resolves to the innermost relevant production.
    pub fn find_at_offset(&self, offset: usize) -> &GenericNode {
        if let GenericNode::NonTerminal { children, .. } = self {
            for child in children {
                if child.offset() <= offset && offset <= child.offset() + child.length() {
                    return child.find_at_offset(offset);
                }
            }
        }
        self
    }
}

/// Root node plus the markers collected across the whole tree (error
/// recovery, ambiguity, and every reduction action's own markers) and the
/// root's action value.
pub struct GenericTree {
    pub root: GenericNode,
    pub markers: Vec<Marker>,
    pub value: ActionValue,
}

impl GenericTree {
    /// Flattens every style set anywhere in the tree into non-overlapping
    /// ranges, preferring the deepest (most specific) node at each point.
    pub fn style_ranges(&self) -> Vec<StyleRange> {
        let mut spans = Vec::new();
        collect_styled_spans(&self.root, 0, &mut spans);
        Styles::flatten(spans)
    }
}

fn collect_styled_spans(node: &GenericNode, depth: usize, out: &mut Vec<StyledSpan>) {
    let GenericNode::NonTerminal { children, styles, token_styles, .. } = node else {
        return;
    };
    for (offset, length, style) in styles {
        out.push(StyledSpan { offset: *offset, length: *length, style: Some(style.clone()), depth });
    }
    for (token_offset, style) in token_styles {
        if let Some(length) = children.iter().find_map(|c| match c {
            GenericNode::Terminal { token, .. } if token.offset == *token_offset => Some(token.length),
            _ => None,
        }) {
            out.push(StyledSpan { offset: *token_offset, length, style: Some(style.clone()), depth: depth + 1 });
        }
    }
    for child in children {
        collect_styled_spans(child, depth + 1, out);
    }
}

/// Outcome of one reducer's comparison between two candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Better,
    Same,
    Worse,
}

/// The three supplied reducers, sharing the `{compare, close}` capability
/// set as a tagged variant rather than a trait object hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    FewerErrorPossible,
    NoAbortAsMuchAsPossible,
    SelectOne,
}

/// The default reducer stack: prefer non-aborted branches, then collapse
/// any remaining ambiguity to one survivor.
pub fn default_reducers() -> Vec<Reducer> {
    vec![Reducer::NoAbortAsMuchAsPossible, Reducer::SelectOne]
}

#[derive(Clone)]
struct CompletedCandidate {
    node: GenericNode,
    errors: u32,
    aborted: bool,
}

impl Reducer {
    fn compare(&self, a: &CompletedCandidate, b: &CompletedCandidate) -> Verdict {
        match self {
            Reducer::FewerErrorPossible => {
                if a.errors < b.errors {
                    Verdict::Better
                } else if a.errors > b.errors {
                    Verdict::Worse
                } else {
                    Verdict::Same
                }
            }
            Reducer::NoAbortAsMuchAsPossible => {
                if a.aborted == b.aborted {
                    Verdict::Same
                } else if !a.aborted {
                    Verdict::Better
                } else {
                    Verdict::Worse
                }
            }
            Reducer::SelectOne => Verdict::Same,
        }
    }

    /// Runs this reducer as a tournament over `candidates`, returning the
    /// surviving subset. `SelectOne` keeps exactly the first survivor and
    /// records (via `ambiguity`) how many branches existed before it ran.
    fn close(&self, candidates: Vec<CompletedCandidate>, ambiguity: &Option<Ambiguity>) -> Vec<CompletedCandidate> {
        if candidates.len() <= 1 {
            return candidates;
        }
        match self {
            Reducer::SelectOne => {
                if let Some(amb) = ambiguity {
                    for _ in candidates.iter().skip(1) {
                        amb.increment_aborted();
                    }
                }
                candidates.into_iter().take(1).collect()
            }
            _ => {
                let mut survivors: Vec<CompletedCandidate> = Vec::new();
                for candidate in candidates {
                    if survivors.is_empty() {
                        survivors.push(candidate);
                        continue;
                    }
                    match self.compare(&candidate, &survivors[0]) {
                        Verdict::Better => {
                            if let Some(amb) = ambiguity {
                                for _ in &survivors {
                                    amb.increment_aborted();
                                }
                            }
                            survivors.clear();
                            survivors.push(candidate);
                        }
                        Verdict::Same => survivors.push(candidate),
                        Verdict::Worse => {
                            if let Some(amb) = ambiguity {
                                amb.increment_aborted();
                            }
                        }
                    }
                }
                survivors
            }
        }
    }
}

/// Errors from reconstructing a tree from a [`ParseRecord`].
#[derive(Debug, thiserror::Error)]
pub enum NavigatorError {
    #[error("parse did not reach a success state, no tree to reconstruct")]
    NoAst,
    #[error("reducer stack left {0} candidate trees at the root without a SelectOne stage to collapse them")]
    TooManyTrees(usize),
}

#[derive(Clone)]
struct PartialCandidate {
    children: Vec<GenericNode>,
    errors: u32,
    aborted: bool,
    markers: Vec<Marker>,
}

/// Drives reconstruction of one or more [`GenericTree`]s from a successful
/// [`ParseRecord`], applying `reducers` at every completed non-terminal.
pub struct Navigator<'a, F: Feature> {
    grammar: &'a Grammar<F>,
    chart: &'a Chart<F>,
    reducers: Vec<Reducer>,
    completed_cache: HashMap<(usize, usize), Rc<Vec<CompletedCandidate>>>,
    post_processors: Vec<Box<dyn Fn(&GenericTree) -> Vec<Marker>>>,
}

impl<'a, F: Feature> Navigator<'a, F> {
    pub fn new(record: &'a ParseRecord<F>, grammar: &'a Grammar<F>, reducers: Vec<Reducer>) -> Self {
        Navigator {
            grammar,
            chart: &record.chart,
            reducers,
            completed_cache: HashMap::new(),
            post_processors: Vec::new(),
        }
    }

    /// Register a function that inspects a completed tree and contributes
    /// additional markers, run once per tree after the root is built.
    pub fn add_post_processor(&mut self, f: impl Fn(&GenericTree) -> Vec<Marker> + 'static) {
        self.post_processors.push(Box::new(f));
    }

    /// Reconstructs every surviving derivation tree rooted at the success
    /// state for `axiom_rule` spanning the whole input.
    pub fn trees(&mut self, axiom_rule: crate::grammar::SymbolId) -> Result<Vec<GenericTree>, NavigatorError> {
        let n = self.chart.len() - 1;
        let root_indices: Vec<usize> = self.chart.sets[n]
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.begin == 0 && e.is_completed(self.grammar) && self.grammar.production(e.production).rule == axiom_rule)
            .map(|(i, _)| i)
            .collect();
        if root_indices.is_empty() {
            return Err(NavigatorError::NoAst);
        }

        // Distinct productions of the axiom rule spanning the whole input
        // don't share a single back-pointer entry to hang ambiguity off (each
        // keeps its own (production, begin, dot) key), so their candidates
        // are gathered here and reduced together rather than inside
        // `complete_node`.
        let raw: Vec<CompletedCandidate> = root_indices
            .iter()
            .flat_map(|&index| self.complete_node(n, index).iter().cloned().collect::<Vec<_>>())
            .collect();
        let candidates = Rc::new(self.reduce_and_tag(raw));
        let has_select_one = self.reducers.iter().any(|r| matches!(r, Reducer::SelectOne));
        if candidates.len() > 1 && has_select_one {
            return Err(NavigatorError::TooManyTrees(candidates.len()));
        }

        let mut trees = Vec::with_capacity(candidates.len());
        for candidate in candidates.iter() {
            let mut markers = Vec::new();
            if let GenericNode::NonTerminal { markers: node_markers, .. } = &candidate.node {
                markers.extend(node_markers.iter().cloned());
            }
            let value = match &candidate.node {
                GenericNode::NonTerminal { value, .. } => value.clone(),
                GenericNode::Terminal { .. } => unreachable!("axiom production always reduces to a non-terminal node"),
            };
            let tree = GenericTree { root: candidate.node.clone(), markers, value };
            trees.push(tree);
        }

        for tree in trees.iter_mut() {
            let extra: Vec<Marker> = self.post_processors.iter().flat_map(|f| f(tree)).collect();
            tree.markers.extend(extra);
        }

        debug!("navigator produced {} tree(s)", trees.len());
        Ok(trees)
    }

    fn complete_node(&mut self, position: usize, index: usize) -> Rc<Vec<CompletedCandidate>> {
        if let Some(cached) = self.completed_cache.get(&(position, index)) {
            return cached.clone();
        }

        let entry_production = self.chart.sets[position].entries[index].production;
        let entry_begin = self.chart.sets[position].entries[index].begin;
        let partials = self.reconstruct_partial(position, index);

        let mut raw: Vec<CompletedCandidate> = Vec::with_capacity(partials.len());
        for partial in partials {
            let production = self.grammar.production(entry_production);
            let mut ctx = Context::default();
            let child_aborted = partial.aborted;

            let args: Vec<ActionArg> = partial
                .children
                .iter()
                .filter_map(|child| match child {
                    GenericNode::Terminal { token, excluded_from_args: false } => {
                        Some(ActionArg::Token(token.clone()))
                    }
                    GenericNode::Terminal { excluded_from_args: true, .. } => None,
                    GenericNode::NonTerminal { value, .. } => Some(ActionArg::Value(value.clone())),
                })
                .collect();

            let value = {
                let mut action_ctx = ActionContext::new(&mut ctx, &production.feature);
                (production.action)(&mut action_ctx, &args)
            };
            let aborted = child_aborted || ctx.is_aborted();
            let mut markers = partial.markers.clone();
            markers.extend(ctx.markers().iter().cloned());

            let offset = partial
                .children
                .first()
                .map(GenericNode::offset)
                .unwrap_or_else(|| self.chart.tokens.get(entry_begin).map(|t| t.offset).unwrap_or(0));
            let end = partial
                .children
                .last()
                .map(|c| c.offset() + c.length())
                .unwrap_or(offset);

            let node = GenericNode::NonTerminal {
                production: entry_production,
                offset,
                length: end - offset,
                children: partial.children,
                value,
                ambiguity: None,
                markers,
                styles: ctx.styles().to_vec(),
                token_styles: ctx.token_styles().to_vec(),
            };

            raw.push(CompletedCandidate {
                node,
                errors: partial.errors,
                aborted,
            });
        }

        let result = Rc::new(self.reduce_and_tag(raw));
        self.completed_cache.insert((position, index), result.clone());
        result
    }

    /// Runs the reducer stack over a set of alternative completions of the
    /// same span and, if exactly one survives out of more than one raw
    /// candidate, tags it with the [`Ambiguity`] handle and an `Ambiguous`
    /// marker. Shared by [`Self::complete_node`] (alternative derivations of
    /// one production instance) and [`Self::trees`] (alternative productions
    /// of the axiom rule both spanning the whole input, which never share a
    /// single back-pointer entry to hang the ambiguity off).
    fn reduce_and_tag(&self, raw: Vec<CompletedCandidate>) -> Vec<CompletedCandidate> {
        let ambiguity = if raw.len() > 1 { Some(Ambiguity::new(raw.len() as u32)) } else { None };
        let mut survivors = raw;
        for reducer in self.reducers.clone() {
            survivors = reducer.close(survivors, &ambiguity);
            if survivors.len() <= 1 {
                break;
            }
        }

        if let Some(amb) = &ambiguity {
            if survivors.len() == 1 {
                let offset = survivors[0].node.offset();
                let length = survivors[0].node.length();
                if let GenericNode::NonTerminal { markers, ambiguity: node_amb, .. } = &mut survivors[0].node {
                    *node_amb = Some(amb.clone());
                    if amb.was_ambiguous() {
                        markers.push(Marker::new(
                            offset,
                            length,
                            MarkerKind::Ambiguous,
                            "multiple derivations collapsed to one by the default reducer stack",
                            Severity::Warning,
                        ));
                    }
                }
            }
        }

        survivors
    }

    /// Walks back-pointers from `(position, index)` down to the dot-0 seed,
    /// assembling the ordered children list for that production instance.
    /// `DeletedTokenValue` causals are transparent: they add a marker and an
    /// error but no child, since they represent a skipped input token that
    /// never advanced the dot.
    fn reconstruct_partial(&mut self, position: usize, index: usize) -> Vec<PartialCandidate> {
        let back_ptrs = self.chart.sets[position].entries[index].back_ptrs.clone();
        if back_ptrs.is_empty() {
            return vec![PartialCandidate { children: Vec::new(), errors: 0, aborted: false, markers: Vec::new() }];
        }

        let mut out = Vec::new();
        for back_ptr in back_ptrs {
            let predecessor_candidates = self.reconstruct_partial(back_ptr.predecessor.position, back_ptr.predecessor.index);

            match &back_ptr.causal {
                Causal::Terminal(TerminalItem::TokenValue(tok)) => {
                    for pred in &predecessor_candidates {
                        let mut children = pred.children.clone();
                        children.push(GenericNode::Terminal { token: tok.clone(), excluded_from_args: false });
                        out.push(PartialCandidate { children, errors: pred.errors, aborted: pred.aborted, markers: pred.markers.clone() });
                    }
                }
                Causal::Terminal(TerminalItem::InsertedTokenValue(tok)) => {
                    for pred in &predecessor_candidates {
                        let mut children = pred.children.clone();
                        children.push(GenericNode::Terminal { token: tok.clone(), excluded_from_args: true });
                        let mut markers = pred.markers.clone();
                        markers.push(Marker::new(
                            tok.offset,
                            0,
                            MarkerKind::InsertedToken,
                            format!("inserted missing token `{}`", tok.text),
                            Severity::Error,
                        ));
                        out.push(PartialCandidate { children, errors: pred.errors + 1, aborted: pred.aborted, markers });
                    }
                }
                Causal::Terminal(TerminalItem::MutationTokenValue(tok)) => {
                    for pred in &predecessor_candidates {
                        let mut children = pred.children.clone();
                        children.push(GenericNode::Terminal { token: tok.clone(), excluded_from_args: false });
                        let mut markers = pred.markers.clone();
                        markers.push(Marker::new(
                            tok.offset,
                            tok.length.max(1),
                            MarkerKind::TokenMutation,
                            format!("token `{}` treated as the expected terminal", tok.text),
                            Severity::Error,
                        ));
                        out.push(PartialCandidate { children, errors: pred.errors + 1, aborted: pred.aborted, markers });
                    }
                }
                Causal::Terminal(TerminalItem::DeletedTokenValue(tok)) => {
                    for pred in &predecessor_candidates {
                        let mut markers = pred.markers.clone();
                        markers.push(Marker::new(
                            tok.offset,
                            tok.length.max(1),
                            MarkerKind::MissingToken,
                            format!("unexpected token `{}` skipped", tok.text),
                            Severity::Error,
                        ));
                        out.push(PartialCandidate { children: pred.children.clone(), errors: pred.errors + 1, aborted: pred.aborted, markers });
                    }
                }
                Causal::Completed(child_ref) => {
                    let child_candidates = self.complete_node(child_ref.position, child_ref.index);
                    for pred in &predecessor_candidates {
                        for child in child_candidates.iter() {
                            let mut children = pred.children.clone();
                            children.push(child.node.clone());
                            let mut markers = pred.markers.clone();
                            if let GenericNode::NonTerminal { markers: child_markers, .. } = &child.node {
                                markers.extend(child_markers.iter().cloned());
                            }
                            out.push(PartialCandidate {
                                children,
                                errors: pred.errors + child.errors,
                                aborted: pred.aborted || child.aborted,
                                markers,
                            });
                        }
                    }
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::builder::{no_action, term, GrammarBuilder};
    use crate::grammar::NoFeature;
    use crate::token::VecLexer;

    fn id_for(grammar: &Grammar<NoFeature>, name: &str) -> crate::grammar::SymbolId {
        (0..grammar.terminal_count() as u32).find(|&i| grammar.terminal(i).name == name).unwrap()
    }

    #[test]
    fn reconstructs_simple_tree_with_no_markers() {
        let mut b: GrammarBuilder<NoFeature> = GrammarBuilder::new();
        b.add_axiom("S", "S");
        b.add_production("S", vec![term("a"), term("b")], NoFeature, None, no_action());
        let grammar = b.compile().unwrap();
        let a = id_for(&grammar, "a");
        let bt = id_for(&grammar, "b");
        let tokens = vec![Token::new(0, 1, a, "a"), Token::new(1, 1, bt, "b")];
        let mut lexer = VecLexer::new(tokens, grammar.eos_terminal());
        let axiom = grammar.find_axiom(None).unwrap().clone();
        let record = ParseRecord::parse(&grammar, &mut lexer, &axiom);
        assert!(record.success);

        let mut navigator = Navigator::new(&record, &grammar, default_reducers());
        let trees = navigator.trees(axiom.rule).unwrap();
        assert_eq!(trees.len(), 1);
        assert!(trees[0].markers.is_empty());
        assert_eq!(trees[0].root.offset(), 0);
        assert_eq!(trees[0].root.length(), 2);
    }

    #[test]
    fn missing_token_produces_inserted_marker() {
        let mut b: GrammarBuilder<NoFeature> = GrammarBuilder::new();
        b.add_axiom("S", "S");
        b.add_production("S", vec![term("a"), term("b")], NoFeature, None, no_action());
        let grammar = b.compile().unwrap();
        let a = id_for(&grammar, "a");
        let tokens = vec![Token::new(0, 1, a, "a")];
        let mut lexer = VecLexer::new(tokens, grammar.eos_terminal());
        let axiom = grammar.find_axiom(None).unwrap().clone();
        let record = ParseRecord::parse(&grammar, &mut lexer, &axiom);
        assert!(!record.success);

        let mut navigator = Navigator::new(&record, &grammar, default_reducers());
        let trees = navigator.trees(axiom.rule).unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].markers.len(), 1);
        assert_eq!(trees[0].markers[0].kind, MarkerKind::InsertedToken);
    }
}
