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

//! Grammar model: terminals, non-terminals, productions, features and axioms.
//!
//! A [`Grammar`] is built once by a [`builder::GrammarBuilder`] and is
//! immutable for the rest of its life; the [`crate::recognizer`] only ever
//! reads it. Non-terminal and terminal symbols live in separate id spaces
//! (`SymbolId` is just `u32`) so that matching on [`Symbol`] dispatches
//! without a range check, unlike the packed single-space scheme the
//! original editor grammar used.

pub mod builder;

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// Id of a non-terminal or a terminal. The two spaces are disjoint; which
/// one an id belongs to is determined by which [`Symbol`] variant wraps it.
pub type SymbolId = u32;

/// Id of a user-facing grammar construct ("DSL element") attached to a
/// production, used by completion providers and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DslElementId(pub u32);

/// A symbol on the right-hand side of a production: either a terminal
/// (lexical class) or a non-terminal (rule reference).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Terminal(SymbolId),
    NonTerminal(SymbolId),
}

impl Symbol {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Symbol::Terminal(_))
    }
}

/// A terminal's static metadata: the lexical class id paired with the text
/// materialized for it when a completion proposal needs a literal (e.g.
/// keywords, punctuation). Terminals with no default text (identifiers,
/// numbers, ...) never generate their own completion text; only a
/// registered `CompletionProvider` can.
#[derive(Debug, Clone)]
pub struct TerminalDef {
    pub name: String,
    pub default_text: Option<String>,
}

/// Opaque per-production semantic tag. A total `merge` lets the recognizer
/// reject a derivation at recognition time without throwing: `None` means
/// incompatible.
pub trait Feature: Clone + fmt::Debug {
    /// Merge `self` (accumulated so far, for the production whose dot was
    /// at `from_index`) with `other` (the feature of the child/derivation
    /// just recognized). Returns `None` for an incompatible combination.
    fn merge(&self, from_index: usize, other: &Self) -> Option<Self>;
}

/// The trivial feature algebra: every merge succeeds. Used by grammars that
/// don't need semantic-feature rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoFeature;

impl Feature for NoFeature {
    fn merge(&self, _from_index: usize, _other: &Self) -> Option<Self> {
        Some(NoFeature)
    }
}

/// A value produced by a reduction action. Boxed as `dyn Any` behind an
/// `Rc` since the navigator may need to share a subtree's value across
/// more than one surviving ambiguous branch before a reducer collapses it.
pub type ActionValue = Rc<dyn std::any::Any>;

/// One child passed to a reduction action: either the matched token itself
/// (for a terminal child) or the value a non-terminal child's own action
/// produced. `InsertedTokenValue` children are excluded from `args` entirely
/// (only their markers propagate), so this list never contains an entry for
/// a synthesized insertion.
#[derive(Clone)]
pub enum ActionArg {
    Token(crate::token::Token),
    Value(ActionValue),
}

/// Capability view passed to a reduction action; see [`crate::context::ActionContext`]
/// for the concrete type. Kept as a type alias here so `Production::action`
/// can be declared without a circular module dependency.
pub type ReductionAction<F> =
    Rc<dyn Fn(&mut crate::context::ActionContext<F>, &[ActionArg]) -> ActionValue>;

/// An ordered sequence of symbols with a feature, an optional DSL tag and a
/// reduction action: the right-hand side of one alternative for a rule.
#[derive(Clone)]
pub struct Production<F: Feature> {
    pub id: usize,
    pub rule: SymbolId,
    pub rhs: Vec<Symbol>,
    pub dsl_element: Option<DslElementId>,
    pub feature: F,
    pub action: ReductionAction<F>,
}

impl<F: Feature> fmt::Debug for Production<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Production")
            .field("id", &self.id)
            .field("rule", &self.rule)
            .field("rhs", &self.rhs)
            .field("dsl_element", &self.dsl_element)
            .field("feature", &self.feature)
            .finish()
    }
}

impl<F: Feature> Production<F> {
    pub fn is_empty(&self) -> bool {
        self.rhs.is_empty()
    }

    pub fn symbol_at(&self, dot: usize) -> Option<Symbol> {
        self.rhs.get(dot).copied()
    }
}

/// A distinguished non-terminal that may start a parse, addressable by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Axiom {
    pub name: String,
    pub rule: SymbolId,
}

/// An immutable, fully-compiled grammar. Built once by [`builder::GrammarBuilder::compile`].
pub struct Grammar<F: Feature> {
    nonterminal_names: Vec<String>,
    terminals: Vec<TerminalDef>,
    dsl_element_names: Vec<String>,
    productions: Vec<Production<F>>,
    productions_by_rule: Vec<Vec<usize>>,
    axioms: Vec<Axiom>,
    nullable: HashSet<SymbolId>,
    eos_terminal: SymbolId,
}

impl<F: Feature> Grammar<F> {
    pub fn nonterminal_name(&self, rule: SymbolId) -> &str {
        &self.nonterminal_names[rule as usize]
    }

    pub fn nonterminal_count(&self) -> usize {
        self.nonterminal_names.len()
    }

    pub fn terminal(&self, id: SymbolId) -> &TerminalDef {
        &self.terminals[id as usize]
    }

    pub fn terminal_count(&self) -> usize {
        self.terminals.len()
    }

    pub fn dsl_element_name(&self, id: DslElementId) -> &str {
        &self.dsl_element_names[id.0 as usize]
    }

    pub fn eos_terminal(&self) -> SymbolId {
        self.eos_terminal
    }

    pub fn production(&self, id: usize) -> &Production<F> {
        &self.productions[id]
    }

    pub fn production_count(&self) -> usize {
        self.productions.len()
    }

    pub fn productions_for(&self, rule: SymbolId) -> &[usize] {
        &self.productions_by_rule[rule as usize]
    }

    pub fn is_nullable(&self, rule: SymbolId) -> bool {
        self.nullable.contains(&rule)
    }

    pub fn axioms(&self) -> &[Axiom] {
        &self.axioms
    }

    /// Find the axiom whose name starts with `prefix`; if `prefix` is
    /// `None`, return the first declared axiom.
    pub fn find_axiom(&self, prefix: Option<&str>) -> Option<&Axiom> {
        match prefix {
            None => self.axioms.first(),
            Some(p) => self.axioms.iter().find(|a| a.name.starts_with(p)),
        }
    }
}
