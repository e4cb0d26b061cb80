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

//! Earley recognizer with error recovery.
//!
//! Builds a chart of dotted-rule states with back-pointers via the usual
//! predict/scan/complete loop, run here as a single batch `parse()` call
//! over the whole token stream rather than incrementally, and widened to
//! three error-repair strategies instead of one.

use std::collections::{HashMap, VecDeque};

use log::{debug, trace, warn};

use crate::grammar::{Axiom, Feature, Grammar, Symbol, SymbolId};
use crate::marker::{Marker, MarkerKind, Severity};
use crate::token::{Lexer, Token};

/// `(production, begin, dot)` identifies a dotted-rule state within one
/// chart position, independent of which feature value it carries.
pub type StateKey = (usize, usize, usize);

/// How a state was reached, worst-to-best ordering reversed: lower
/// discriminant is "better". Once a state reaches a better kind it never
/// regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Kind {
    Kernel = 0,
    Processed = 1,
    Incompatible = 2,
    ErrorRecovery = 3,
}

/// A reference to a state living in `chart[position][index]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateRef {
    pub position: usize,
    pub index: usize,
}

/// The terminal-matching outcome that produced a scanned or repaired state.
#[derive(Debug, Clone)]
pub enum TerminalItem {
    TokenValue(Token),
    InsertedTokenValue(Token),
    DeletedTokenValue(Token),
    MutationTokenValue(Token),
}

impl TerminalItem {
    pub fn token(&self) -> &Token {
        match self {
            TerminalItem::TokenValue(t)
            | TerminalItem::InsertedTokenValue(t)
            | TerminalItem::DeletedTokenValue(t)
            | TerminalItem::MutationTokenValue(t) => t,
        }
    }
}

/// What caused a state to be added: completing a child non-terminal, or
/// consuming (possibly via repair) a terminal.
#[derive(Debug, Clone)]
pub enum Causal {
    Completed(StateRef),
    Terminal(TerminalItem),
}

/// One way a state was reached: the state it advanced from, and what
/// caused the advance.
#[derive(Debug, Clone)]
pub struct BackPtr {
    pub predecessor: StateRef,
    pub causal: Causal,
}

/// A dotted-rule Earley item plus its bookkeeping: the feature accumulated
/// along its best-known derivation, the best `Kind` and `syntactic_errors`
/// observed across all back-pointers, and those back-pointers themselves.
#[derive(Debug)]
pub struct StateEntry<F: Feature> {
    pub production: usize,
    pub begin: usize,
    pub dot: usize,
    pub feature: F,
    pub kind: Kind,
    pub syntactic_errors: u32,
    pub back_ptrs: Vec<BackPtr>,
}

impl<F: Feature> StateEntry<F> {
    pub fn is_completed(&self, grammar: &Grammar<F>) -> bool {
        self.dot == grammar.production(self.production).rhs.len()
    }

    pub fn next_symbol(&self, grammar: &Grammar<F>) -> Option<Symbol> {
        grammar.production(self.production).symbol_at(self.dot)
    }
}

/// States ending at one chart position, indexed for fast completion lookup.
#[derive(Debug)]
pub struct ChartSet<F: Feature> {
    pub entries: Vec<StateEntry<F>>,
    index: HashMap<StateKey, usize>,
    waiting: HashMap<SymbolId, Vec<usize>>,
}

impl<F: Feature> ChartSet<F> {
    fn new() -> Self {
        ChartSet {
            entries: Vec::new(),
            index: HashMap::new(),
            waiting: HashMap::new(),
        }
    }

    pub fn find(&self, key: StateKey) -> Option<usize> {
        self.index.get(&key).copied()
    }

    pub fn waiting_for(&self, rule: SymbolId) -> &[usize] {
        self.waiting.get(&rule).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// The chart produced by [`parse`]: one [`ChartSet`] per token position,
/// `chart.len() == tokens.len() + 1` always (Property 1: *Termination*).
#[derive(Debug)]
pub struct Chart<F: Feature> {
    pub sets: Vec<ChartSet<F>>,
    pub tokens: Vec<Token>,
}

impl<F: Feature> Chart<F> {
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Two back-pointers from the same predecessor are genuine duplicates only
/// if they were caused by the same completed child state; two different
/// children completing the same predecessor (the ambiguous case) must both
/// be kept; a bare discriminant match would conflate them.
fn causal_same_source(a: &Causal, b: &Causal) -> bool {
    match (a, b) {
        (Causal::Completed(x), Causal::Completed(y)) => x == y,
        (Causal::Terminal(_), Causal::Terminal(_)) => true,
        _ => false,
    }
}

/// `addState`: idempotent insertion. Returns `Some(index)` of the
/// (possibly pre-existing) entry if it is freshly enqueued-worthy, i.e. the
/// caller should push it onto the work queue; returns the index regardless
/// so the caller can record a back-pointer either way.
fn add_state<F: Feature>(
    set: &mut ChartSet<F>,
    grammar: &Grammar<F>,
    production: usize,
    begin: usize,
    dot: usize,
    feature: F,
    kind: Kind,
    syntactic_errors: u32,
    back_ptr: Option<BackPtr>,
) -> (usize, bool) {
    let key = (production, begin, dot);
    if let Some(&idx) = set.index.get(&key) {
        let entry = &mut set.entries[idx];
        let mut improved = false;
        if syntactic_errors < entry.syntactic_errors {
            entry.back_ptrs.clear();
            entry.syntactic_errors = syntactic_errors;
            entry.kind = kind;
            entry.feature = feature;
            improved = true;
        } else if syntactic_errors == entry.syntactic_errors {
            if kind < entry.kind {
                entry.kind = kind;
                entry.feature = feature;
            }
        }
        if let Some(bp) = back_ptr {
            let dup = entry
                .back_ptrs
                .iter()
                .any(|existing| existing.predecessor == bp.predecessor && causal_same_source(&existing.causal, &bp.causal));
            if !dup {
                entry.back_ptrs.push(bp);
            }
        }
        (idx, improved)
    } else {
        let idx = set.entries.len();
        set.entries.push(StateEntry {
            production,
            begin,
            dot,
            feature,
            kind,
            syntactic_errors,
            back_ptrs: back_ptr.into_iter().collect(),
        });
        set.index.insert(key, idx);
        if let Some(Symbol::NonTerminal(rule)) = set.entries[idx].next_symbol(grammar) {
            set.waiting.entry(rule).or_default().push(idx);
        }
        (idx, true)
    }
}

/// Seed `chart[0]` with every production of `axiom.rule`, and predict
/// transitively from there until the queue drains.
fn predict_rule<F: Feature>(
    set: &mut ChartSet<F>,
    grammar: &Grammar<F>,
    rule: SymbolId,
    position: usize,
    queue: &mut VecDeque<usize>,
) {
    for &prod_id in grammar.productions_for(rule) {
        let production = grammar.production(prod_id);
        let kind = if position == 0 { Kind::Kernel } else { Kind::Processed };
        let (idx, fresh) = add_state(
            set,
            grammar,
            prod_id,
            position,
            0,
            production.feature.clone(),
            kind,
            0,
            None,
        );
        if fresh {
            queue.push_back(idx);
        }
    }
}

/// Parse `input` against `grammar` starting from `axiom`. Never fails with
/// an error for syntactic problems; syntactic and lexical trouble surface
/// as markers and as `success = false` on the returned chart (wrapped by
/// [`crate::result::ParseOutcome`]).
pub fn parse<F: Feature>(
    grammar: &Grammar<F>,
    lexer: &mut dyn Lexer,
    axiom: &Axiom,
) -> (Chart<F>, Vec<Marker>, bool) {
    let mut tokens = Vec::new();
    let eos = loop {
        let tok = lexer.next_token();
        if tok.id == grammar.eos_terminal() {
            break tok;
        }
        tokens.push(tok);
    };
    let n = tokens.len();
    trace!("recognizing {} tokens against axiom `{}`", n, axiom.name);

    let mut sets: Vec<ChartSet<F>> = (0..=n).map(|_| ChartSet::new()).collect();
    let mut error_tokens = Vec::new();

    {
        let mut queue = VecDeque::new();
        predict_rule(&mut sets[0], grammar, axiom.rule, 0, &mut queue);
        run_fixed_point(&mut sets, grammar, 0, &mut queue);
    }

    for i in 0..n {
        if !grammar_knows(grammar, tokens[i].id) {
            warn!("unknown terminal id {} at offset {}", tokens[i].id, tokens[i].offset);
            error_tokens.push(Marker::new(
                tokens[i].offset,
                tokens[i].length.max(1),
                MarkerKind::UnknownToken,
                format!("token `{}` does not match any terminal", tokens[i].text),
                Severity::Error,
            ));
        }

        loop {
            let mut queue: VecDeque<usize> = (0..sets[i].entries.len()).collect();
            run_fixed_point(&mut sets, grammar, i, &mut queue);
            scan_token(&mut sets, grammar, i, &tokens[i]);

            let repaired = apply_error_recovery(&mut sets, grammar, &tokens, i, grammar_knows(grammar, tokens[i].id));
            if !repaired {
                break;
            }
        }

        debug!("chart[{}] has {} states", i, sets[i].entries.len());
    }

    // No real token sits at position `n`; only Insertion makes sense there,
    // synthesizing whatever trailing terminal(s) a production still expects
    // once the input is exhausted.
    loop {
        let mut queue: VecDeque<usize> = (0..sets[n].entries.len()).collect();
        run_fixed_point(&mut sets, grammar, n, &mut queue);
        let repaired = apply_end_of_input_recovery(&mut sets, grammar, &eos, n);
        if !repaired {
            break;
        }
    }
    debug!("chart[{}] (end of input) has {} states", n, sets[n].entries.len());

    let chart = Chart { sets, tokens };
    let success = successful(&chart, grammar, axiom);
    (chart, error_tokens, success)
}

fn grammar_knows<F: Feature>(grammar: &Grammar<F>, id: SymbolId) -> bool {
    (id as usize) < grammar.terminal_count()
}

/// Runs predict/scan/complete to a fixed point at `position`, draining
/// `queue`. Scan only ever enqueues into `position + 1`'s chart set (not
/// returned to `queue`, since that belongs to the next position's pass).
fn run_fixed_point<F: Feature>(
    sets: &mut [ChartSet<F>],
    grammar: &Grammar<F>,
    position: usize,
    queue: &mut VecDeque<usize>,
) {
    while let Some(idx) = queue.pop_front() {
        let (production, begin, dot, feature, kind) = {
            let entry = &sets[position].entries[idx];
            (entry.production, entry.begin, entry.dot, entry.feature.clone(), entry.kind)
        };
        if kind == Kind::Incompatible {
            // Dead for clean derivations, but still a valid predecessor for
            // error-recovery bookkeeping; don't predict/scan further from it.
            continue;
        }

        let next = grammar.production(production).symbol_at(dot);
        match next {
            None => {
                // Completed: advance every predecessor at `begin` waiting on `production.rule`.
                let rule = grammar.production(production).rule;
                let waiting: Vec<usize> = sets[begin].waiting_for(rule).to_vec();
                let child_errors = sets[position].entries[idx].syntactic_errors;
                for w_idx in waiting {
                    let (w_production, w_begin, w_dot, w_feature, w_kind, w_errors) = {
                        let w = &sets[begin].entries[w_idx];
                        (w.production, w.begin, w.dot, w.feature.clone(), w.kind, w.syntactic_errors)
                    };
                    let merged = w_feature.merge(w_dot, &feature);
                    let new_kind = match merged {
                        Some(_) => kind.max(w_kind).max(Kind::Processed),
                        None => Kind::Incompatible,
                    };
                    let back_ptr = BackPtr {
                        predecessor: StateRef { position: begin, index: w_idx },
                        causal: Causal::Completed(StateRef { position, index: idx }),
                    };
                    let (new_idx, fresh) = add_state(
                        &mut sets[position],
                        grammar,
                        w_production,
                        w_begin,
                        w_dot + 1,
                        merged.unwrap_or(w_feature),
                        new_kind,
                        w_errors + child_errors,
                        Some(back_ptr),
                    );
                    if fresh {
                        queue.push_back(new_idx);
                    }
                }
            }
            Some(Symbol::NonTerminal(rule)) => {
                // Nullable rules need no special-casing here: predicting `rule`
                // below enqueues its empty production like any other, and that
                // production's own completion (handled by the `None` arm above,
                // once it's popped off the queue) advances `idx` the normal way.
                predict_rule(&mut sets[position], grammar, rule, position, queue);
            }
            Some(Symbol::Terminal(_)) => {
                // Left for `scan_token`, called separately by `parse` once this
                // fixed point drains, since it needs the token at `position`
                // rather than just the chart sets this function sees.
            }
        }
    }
}

fn apply_error_recovery<F: Feature>(
    sets: &mut Vec<ChartSet<F>>,
    grammar: &Grammar<F>,
    tokens: &[Token],
    position: usize,
    token_known: bool,
) -> bool {
    let token = tokens[position].clone();
    let stuck: Vec<(usize, SymbolId, usize, usize, F, u32)> = sets[position]
        .entries
        .iter()
        .enumerate()
        .filter_map(|(idx, e)| match e.next_symbol(grammar) {
            Some(Symbol::Terminal(t)) if t != token.id && e.kind != Kind::Incompatible => {
                Some((idx, t, e.production, e.begin, e.feature.clone(), e.syntactic_errors))
            }
            _ => None,
        })
        .collect();

    if stuck.is_empty() {
        return false;
    }

    let mut changed = false;
    for (idx, expected, production, begin, feature, errors) in stuck {
        if !token_known {
            // Unknown lexical class: treat uniformly as deleted.
            let deleted = TerminalItem::DeletedTokenValue(token.clone());
            let back_ptr = BackPtr {
                predecessor: StateRef { position, index: idx },
                causal: Causal::Terminal(deleted),
            };
            let dot = sets[position].entries[idx].dot;
            let (new_idx, fresh) = add_state(
                &mut sets[position + 1],
                grammar,
                production,
                begin,
                dot,
                feature,
                Kind::ErrorRecovery,
                errors + 1,
                Some(back_ptr),
            );
            changed = changed || fresh;
            let _ = new_idx;
            continue;
        }

        // Insertion: synthesize a zero-width `expected` token at this position.
        let synthesized_text = grammar.terminal(expected).default_text.clone().unwrap_or_default();
        let synthesized = Token::new(token.offset, 0, expected, synthesized_text);
        let ins_back_ptr = BackPtr {
            predecessor: StateRef { position, index: idx },
            causal: Causal::Terminal(TerminalItem::InsertedTokenValue(synthesized)),
        };
        let dot = sets[position].entries[idx].dot;
        let (ins_idx, ins_fresh) = add_state(
            &mut sets[position],
            grammar,
            production,
            begin,
            dot + 1,
            feature.clone(),
            Kind::ErrorRecovery,
            errors + 1,
            Some(ins_back_ptr),
        );
        changed = changed || ins_fresh;
        let _ = ins_idx;

        // Deletion: skip this token, keep waiting for `expected` at position + 1.
        let del_back_ptr = BackPtr {
            predecessor: StateRef { position, index: idx },
            causal: Causal::Terminal(TerminalItem::DeletedTokenValue(token.clone())),
        };
        let (del_idx, del_fresh) = add_state(
            &mut sets[position + 1],
            grammar,
            production,
            begin,
            dot,
            feature.clone(),
            Kind::ErrorRecovery,
            errors + 1,
            Some(del_back_ptr),
        );
        changed = changed || del_fresh;
        let _ = del_idx;

        // Mutation: pretend the actual token was `expected`.
        let mut_back_ptr = BackPtr {
            predecessor: StateRef { position, index: idx },
            causal: Causal::Terminal(TerminalItem::MutationTokenValue(token.clone())),
        };
        let (mut_idx, mut_fresh) = add_state(
            &mut sets[position + 1],
            grammar,
            production,
            begin,
            dot + 1,
            feature,
            Kind::ErrorRecovery,
            errors + 1,
            Some(mut_back_ptr),
        );
        changed = changed || mut_fresh;
        let _ = mut_idx;
    }

    changed
}

/// Insertion-only recovery for the position after the last real token: there
/// is no actual token left to delete or mutate, only a terminal a production
/// still expects. `eos` supplies the offset a synthesized token is placed at.
fn apply_end_of_input_recovery<F: Feature>(
    sets: &mut [ChartSet<F>],
    grammar: &Grammar<F>,
    eos: &Token,
    position: usize,
) -> bool {
    let stuck: Vec<(usize, SymbolId, usize, usize, F, u32)> = sets[position]
        .entries
        .iter()
        .enumerate()
        .filter_map(|(idx, e)| match e.next_symbol(grammar) {
            Some(Symbol::Terminal(t)) if e.kind != Kind::Incompatible => {
                Some((idx, t, e.production, e.begin, e.feature.clone(), e.syntactic_errors))
            }
            _ => None,
        })
        .collect();

    if stuck.is_empty() {
        return false;
    }

    let mut changed = false;
    for (idx, expected, production, begin, feature, errors) in stuck {
        let synthesized_text = grammar.terminal(expected).default_text.clone().unwrap_or_default();
        let synthesized = Token::new(eos.offset, 0, expected, synthesized_text);
        let back_ptr = BackPtr {
            predecessor: StateRef { position, index: idx },
            causal: Causal::Terminal(TerminalItem::InsertedTokenValue(synthesized)),
        };
        let dot = sets[position].entries[idx].dot;
        let (new_idx, fresh) = add_state(
            &mut sets[position],
            grammar,
            production,
            begin,
            dot + 1,
            feature,
            Kind::ErrorRecovery,
            errors + 1,
            Some(back_ptr),
        );
        changed = changed || fresh;
        let _ = new_idx;
    }
    changed
}

/// Scan: advance every state in `chart[i]` whose next symbol is a matching
/// terminal into `chart[i+1]`. Called by `parse` before the fixed-point pass
/// consumes the queue for `i`, since completion of the scanned state happens
/// once the fixed point reaches `i + 1`.
fn scan_token<F: Feature>(sets: &mut [ChartSet<F>], grammar: &Grammar<F>, position: usize, token: &Token) -> Vec<usize> {
    let matching: Vec<(usize, usize, usize, usize, F, Kind, u32)> = sets[position]
        .entries
        .iter()
        .enumerate()
        .filter_map(|(idx, e)| match e.next_symbol(grammar) {
            Some(Symbol::Terminal(t)) if t == token.id && e.kind != Kind::Incompatible => {
                Some((idx, e.production, e.begin, e.dot, e.feature.clone(), e.kind, e.syntactic_errors))
            }
            _ => None,
        })
        .collect();

    let mut fresh_indices = Vec::new();
    for (idx, production, begin, dot, feature, kind, errors) in matching {
        let back_ptr = BackPtr {
            predecessor: StateRef { position, index: idx },
            causal: Causal::Terminal(TerminalItem::TokenValue(token.clone())),
        };
        let (new_idx, fresh) = add_state(
            &mut sets[position + 1],
            grammar,
            production,
            begin,
            dot + 1,
            feature,
            kind,
            errors,
            Some(back_ptr),
        );
        if fresh {
            fresh_indices.push(new_idx);
        }
    }
    fresh_indices
}

fn successful<F: Feature>(chart: &Chart<F>, grammar: &Grammar<F>, axiom: &Axiom) -> bool {
    let n = chart.len() - 1;
    chart.sets[n].entries.iter().any(|e| {
        e.begin == 0
            && e.is_completed(grammar)
            && grammar.production(e.production).rule == axiom.rule
            && matches!(e.kind, Kind::Kernel | Kind::Processed)
    })
}
