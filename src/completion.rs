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

//! Completion engine: given a cursor offset, enumerates the symbols the
//! grammar expects there by walking incomplete Earley states and their
//! continuations, recursing through non-terminal continuations rather than
//! stopping at the first symbol, then deduplicating the result by text so a
//! terminal reachable through more than one path is only proposed once.

use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use itertools::Itertools;
use log::trace;

use crate::grammar::{DslElementId, Feature, Grammar, Production, Symbol, SymbolId};
use crate::navigator::GenericNode;
use crate::recognizer::{Chart, Kind};
use crate::result::ParseRecord;

/// The default delimiter set used to decide whether the cursor sits just
/// past a punctuation token rather than mid-identifier.
pub const DEFAULT_DELIMITERS: &str = ":(){}.,+-*/[];";

/// A proposed completion at the cursor.
pub struct CompletionProposal {
    pub element: Option<DslElementId>,
    pub text: String,
    pub replace: Option<(usize, usize)>,
    pub user_data: Option<Rc<dyn Any>>,
    pub documentation: Option<String>,
    pub predictor_paths: Option<Vec<String>>,
}

impl CompletionProposal {
    fn new(text: impl Into<String>, element: Option<DslElementId>) -> Self {
        CompletionProposal {
            element,
            text: text.into(),
            replace: None,
            user_data: None,
            documentation: None,
            predictor_paths: None,
        }
    }
}

/// Capability view passed to a [`CompletionProvider`]: the production whose
/// DslElement triggered it and the feature accumulated up to that point.
pub struct CompletionContext<'a, F: Feature> {
    pub grammar: &'a Grammar<F>,
    pub production: &'a Production<F>,
    pub feature: &'a F,
}

/// A caller-registered source of proposals for one DslElement, invoked
/// instead of the default terminal-text walk.
pub type CompletionProvider<F> = Rc<dyn Fn(&CompletionContext<F>) -> Vec<CompletionProposal>>;

/// Skip expanding a DslElement's productions entirely when this returns false.
pub type CompletionComputeFilter = Rc<dyn Fn(DslElementId) -> bool>;

/// Post-processes the full proposal list once the continuation walk and any
/// providers have run, given the cursor's resolved tree node (if a tree was
/// reconstructed).
pub type CompletionFilter = Rc<dyn Fn(Option<&GenericNode>, Vec<CompletionProposal>) -> Vec<CompletionProposal>>;

/// Drives `complete(offset)` over a [`ParseRecord`]'s chart.
pub struct CompletionProcessor<'a, F: Feature> {
    chart: &'a Chart<F>,
    grammar: &'a Grammar<F>,
    delimiters: &'a str,
    providers: HashMap<DslElementId, CompletionProvider<F>>,
    compute_filter: Option<CompletionComputeFilter>,
    filters: Vec<CompletionFilter>,
}

impl<'a, F: Feature> CompletionProcessor<'a, F> {
    pub fn new(record: &'a ParseRecord<F>, grammar: &'a Grammar<F>) -> Self {
        CompletionProcessor {
            chart: &record.chart,
            grammar,
            delimiters: DEFAULT_DELIMITERS,
            providers: HashMap::new(),
            compute_filter: None,
            filters: Vec::new(),
        }
    }

    pub fn set_delimiters(&mut self, delimiters: &'a str) -> &mut Self {
        self.delimiters = delimiters;
        self
    }

    pub fn register_provider(&mut self, element: DslElementId, provider: CompletionProvider<F>) -> &mut Self {
        self.providers.insert(element, provider);
        self
    }

    pub fn set_compute_filter(&mut self, filter: CompletionComputeFilter) -> &mut Self {
        self.compute_filter = Some(filter);
        self
    }

    pub fn add_filter(&mut self, filter: CompletionFilter) -> &mut Self {
        self.filters.push(filter);
        self
    }

    /// Character immediately preceding `offset`, read out of whichever
    /// token's span covers `offset - 1`, if any.
    fn char_before(&self, offset: usize) -> Option<char> {
        let target = offset.checked_sub(1)?;
        self.chart
            .tokens
            .iter()
            .find(|tok| target >= tok.offset && target < tok.end())
            .and_then(|tok| tok.text.chars().nth(target - tok.offset))
    }

    /// Chart position "at or after" `offset`. If the character just before
    /// `offset` is one of the configured delimiters, the cursor is pushed
    /// past the end of whichever token that character belongs to before the
    /// usual forward scan runs, so the cursor never lands back inside a
    /// token it has already moved past a delimiter within; otherwise the
    /// plain token-boundary scan runs unchanged.
    fn chart_position_for(&self, offset: usize) -> usize {
        let tokens = &self.chart.tokens;
        let boundary = match self.char_before(offset) {
            Some(c) if self.delimiters.contains(c) => tokens
                .iter()
                .find(|tok| offset > tok.offset && offset <= tok.end())
                .map(|tok| tok.end())
                .unwrap_or(offset),
            _ => offset,
        };
        for (i, tok) in tokens.iter().enumerate() {
            if boundary < tok.end() {
                return i;
            }
        }
        tokens.len()
    }

    /// The text preceding `offset` within whichever token the cursor falls
    /// in, and the default `replace` span it implies.
    fn prefix_at(&self, offset: usize, position: usize) -> (String, (usize, usize)) {
        if let Some(tok) = self.chart.tokens.get(position) {
            if tok.offset < offset && offset <= tok.end() {
                let consumed = offset - tok.offset;
                let prefix: String = tok.text.chars().take(consumed).collect();
                return (prefix.clone(), (offset - prefix.len(), prefix.len()));
            }
        }
        (String::new(), (offset, 0))
    }

    /// Enumerate proposals admissible at `offset`, deduplicated by text.
    /// `node_at_cursor` is the tree node `root.find_at_offset(offset)`
    /// resolved to, if a tree was reconstructed, for [`CompletionFilter`]s.
    pub fn complete(&self, offset: usize, node_at_cursor: Option<&GenericNode>) -> Vec<CompletionProposal> {
        let position = self.chart_position_for(offset);
        trace!("completing at offset {} (chart position {})", offset, position);
        let (prefix, replace) = self.prefix_at(offset, position);

        let mut proposals = Vec::new();
        if position < self.chart.sets.len() {
            for entry in &self.chart.sets[position].entries {
                let is_prediction_state = entry.dot > 0 || self.is_axiom_rule(entry.production);
                if !is_prediction_state || entry.kind == Kind::ErrorRecovery {
                    continue;
                }
                let mut visited = std::collections::HashSet::new();
                self.walk(entry.production, entry.dot, &entry.feature, &mut visited, &mut proposals);
                trace!("walk from production {} left {} proposals, {} rules visited", entry.production, proposals.len(), visited.len());
            }
        }

        let mut proposals: Vec<CompletionProposal> = proposals
            .into_iter()
            .unique_by(|p| p.text.clone())
            .collect();

        for p in proposals.iter_mut() {
            if p.replace.is_none() {
                p.replace = Some(replace);
            }
        }

        if !prefix.is_empty() {
            proposals.retain(|p| p.text.starts_with(&prefix));
        }

        for filter in &self.filters {
            proposals = filter(node_at_cursor, proposals);
        }

        proposals
    }

    fn is_axiom_rule(&self, production: usize) -> bool {
        let rule = self.grammar.production(production).rule;
        self.grammar.axioms().iter().any(|a| a.rule == rule)
    }

    fn walk(
        &self,
        production_id: usize,
        dot: usize,
        feature: &F,
        visited: &mut std::collections::HashSet<SymbolId>,
        out: &mut Vec<CompletionProposal>,
    ) {
        let production = self.grammar.production(production_id);
        if dot >= production.rhs.len() {
            return;
        }
        match production.rhs[dot] {
            Symbol::Terminal(_) => {
                let mut text = String::new();
                let mut i = dot;
                while let Some(Symbol::Terminal(t)) = production.rhs.get(i) {
                    if let Some(default) = &self.grammar.terminal(*t).default_text {
                        if !text.is_empty() {
                            text.push(' ');
                        }
                        text.push_str(default);
                    } else {
                        break;
                    }
                    i += 1;
                }
                if !text.is_empty() {
                    out.push(CompletionProposal::new(text, production.dsl_element));
                }
            }
            Symbol::NonTerminal(rule) => {
                if !visited.insert(rule) {
                    trace!("walk: rule {} already visited, not recursing again", rule);
                    return;
                }
                trace!("walk: visiting rule {} ({} rules visited so far)", rule, visited.len());
                for &p_id in self.grammar.productions_for(rule) {
                    let p = self.grammar.production(p_id);
                    let Some(merged) = feature.merge(dot, &p.feature) else {
                        continue;
                    };
                    if let Some(element) = p.dsl_element {
                        if let Some(provider) = self.providers.get(&element) {
                            let ctx = CompletionContext { grammar: self.grammar, production: p, feature: &merged };
                            out.extend(provider(&ctx));
                            continue;
                        }
                        if let Some(filter) = &self.compute_filter {
                            if !filter(element) {
                                continue;
                            }
                        }
                    }
                    self.walk(p_id, 0, &merged, visited, out);
                }
                visited.remove(&rule);
            }
        }
    }
}
