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

//! Runtime grammar construction.
//!
//! Generalizes the textual grammar builder the editor engine this crate
//! grew from used (`TextGrammar`/`TextRule`): productions are still added
//! by name and compiled into an interned, array-indexed representation,
//! but a production here also carries a [`Feature`], an optional DSL tag
//! and a reduction action, and a grammar may declare more than one axiom.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::{ActionArg, ActionValue, Axiom, DslElementId, Feature, Grammar, Production, Symbol,
    SymbolId, TerminalDef};
use crate::context::ActionContext;

/// Errors raised while compiling a [`GrammarBuilder`] into a [`Grammar`].
#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("non-terminal `{0}` is used but has no productions")]
    NoRule(String),
    #[error("no axioms declared")]
    NoAxioms,
    #[error("axiom `{0}` refers to unknown non-terminal `{1}`")]
    UnknownAxiomRule(String, String),
    #[error("duplicate axiom name `{0}`")]
    DuplicateAxiom(String),
    #[error("empty non-terminal or terminal name")]
    EmptyName,
}

/// One symbol reference on the right-hand side of a rule being built.
#[derive(Clone)]
pub enum RuleSymbol {
    Terminal {
        name: String,
        default_text: Option<String>,
    },
    NonTerminal(String),
}

/// Build a terminal reference with no default completion text.
pub fn term(name: impl Into<String>) -> RuleSymbol {
    RuleSymbol::Terminal {
        name: name.into(),
        default_text: None,
    }
}

/// Build a terminal reference carrying the text a completion proposal
/// should materialize for it (e.g. a keyword's spelling).
pub fn term_default(name: impl Into<String>, default_text: impl Into<String>) -> RuleSymbol {
    RuleSymbol::Terminal {
        name: name.into(),
        default_text: Some(default_text.into()),
    }
}

/// Build a non-terminal reference.
pub fn nt(name: impl Into<String>) -> RuleSymbol {
    RuleSymbol::NonTerminal(name.into())
}

struct PendingProduction<F: Feature> {
    lhs: String,
    rhs: Vec<RuleSymbol>,
    dsl_element: Option<String>,
    feature: F,
    action: Rc<dyn Fn(&mut ActionContext<F>, &[ActionArg]) -> ActionValue>,
}

/// Default reduction action: produces no value of interest, just a unit
/// marker. Grammars that don't care about semantic values (e.g. pure
/// recognizers) can add productions without ever naming an action.
pub fn no_action<F: Feature>() -> Rc<dyn Fn(&mut ActionContext<F>, &[ActionArg]) -> ActionValue> {
    Rc::new(|_ctx: &mut ActionContext<F>, _args: &[ActionArg]| -> ActionValue { Rc::new(()) })
}

/// Grammar builder: accumulates named productions and axioms, then
/// [`compile`](Self::compile)s them into an interned [`Grammar`].
pub struct GrammarBuilder<F: Feature> {
    productions: Vec<PendingProduction<F>>,
    axioms: Vec<(String, String)>,
    eos_terminal_name: String,
}

impl<F: Feature> GrammarBuilder<F> {
    pub fn new() -> Self {
        Self {
            productions: Vec::new(),
            axioms: Vec::new(),
            eos_terminal_name: "$EOS".to_string(),
        }
    }

    /// Override the name used for the end-of-stream terminal (default `"$EOS"`).
    pub fn set_eos_terminal_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.eos_terminal_name = name.into();
        self
    }

    /// Register `name` as an axiom, addressable by that name from the facade.
    pub fn add_axiom(&mut self, axiom_name: impl Into<String>, rule_name: impl Into<String>) -> &mut Self {
        self.axioms.push((axiom_name.into(), rule_name.into()));
        self
    }

    /// Add a production `lhs -> rhs` with the trivial action and feature
    /// default (only usable when `F: Default`).
    pub fn add_rule(&mut self, lhs: impl Into<String>, rhs: Vec<RuleSymbol>) -> &mut Self
    where
        F: Default,
    {
        self.add_production(lhs, rhs, F::default(), None, no_action())
    }

    /// Add a fully specified production.
    pub fn add_production(
        &mut self,
        lhs: impl Into<String>,
        rhs: Vec<RuleSymbol>,
        feature: F,
        dsl_element: Option<String>,
        action: Rc<dyn Fn(&mut ActionContext<F>, &[ActionArg]) -> ActionValue>,
    ) -> &mut Self {
        self.productions.push(PendingProduction {
            lhs: lhs.into(),
            rhs,
            dsl_element,
            feature,
            action,
        });
        self
    }

    /// Compile the accumulated rules and axioms into a [`Grammar`].
    pub fn compile(self) -> Result<Grammar<F>, GrammarError> {
        // Pass 1: intern non-terminal names (lhs of every rule, plus every
        // non-terminal referenced on a rhs, plus axiom targets).
        let mut nt_ids: HashMap<String, SymbolId> = HashMap::new();
        let mut nonterminal_names: Vec<String> = Vec::new();
        let intern_nt = |name: &str,
                              nt_ids: &mut HashMap<String, SymbolId>,
                              names: &mut Vec<String>|
         -> Result<SymbolId, GrammarError> {
            if name.is_empty() {
                return Err(GrammarError::EmptyName);
            }
            if let Some(&id) = nt_ids.get(name) {
                return Ok(id);
            }
            let id = names.len() as SymbolId;
            names.push(name.to_string());
            nt_ids.insert(name.to_string(), id);
            Ok(id)
        };

        let mut has_rule: HashSet<SymbolId> = HashSet::new();
        for p in &self.productions {
            let id = intern_nt(&p.lhs, &mut nt_ids, &mut nonterminal_names)?;
            has_rule.insert(id);
        }
        for p in &self.productions {
            for sym in &p.rhs {
                if let RuleSymbol::NonTerminal(name) = sym {
                    intern_nt(name, &mut nt_ids, &mut nonterminal_names)?;
                }
            }
        }
        for (_, rule_name) in &self.axioms {
            intern_nt(rule_name, &mut nt_ids, &mut nonterminal_names)?;
        }

        for (name, &id) in &nt_ids {
            if !has_rule.contains(&id) {
                return Err(GrammarError::NoRule(name.clone()));
            }
        }

        // Pass 2: intern terminals, recording the first default text seen for each name.
        let mut term_ids: HashMap<String, SymbolId> = HashMap::new();
        let mut terminals: Vec<TerminalDef> = Vec::new();
        let intern_term = |name: &str,
                                default_text: &Option<String>,
                                term_ids: &mut HashMap<String, SymbolId>,
                                terms: &mut Vec<TerminalDef>|
         -> Result<SymbolId, GrammarError> {
            if name.is_empty() {
                return Err(GrammarError::EmptyName);
            }
            if let Some(&id) = term_ids.get(name) {
                if default_text.is_some() && terms[id as usize].default_text.is_none() {
                    terms[id as usize].default_text = default_text.clone();
                }
                return Ok(id);
            }
            let id = terms.len() as SymbolId;
            terms.push(TerminalDef {
                name: name.to_string(),
                default_text: default_text.clone(),
            });
            term_ids.insert(name.to_string(), id);
            Ok(id)
        };

        let eos_terminal = intern_term(&self.eos_terminal_name, &None, &mut term_ids, &mut terminals)?;

        // Pass 3: intern DSL element tags.
        let mut dsl_ids: HashMap<String, DslElementId> = HashMap::new();
        let mut dsl_element_names: Vec<String> = Vec::new();

        // Pass 4: build productions with interned symbols.
        let mut productions: Vec<Production<F>> = Vec::with_capacity(self.productions.len());
        let mut productions_by_rule: Vec<Vec<usize>> = vec![Vec::new(); nonterminal_names.len()];

        for (idx, p) in self.productions.into_iter().enumerate() {
            let rule = nt_ids[&p.lhs];
            let mut rhs = Vec::with_capacity(p.rhs.len());
            for sym in &p.rhs {
                match sym {
                    RuleSymbol::NonTerminal(name) => rhs.push(Symbol::NonTerminal(nt_ids[name])),
                    RuleSymbol::Terminal { name, default_text } => {
                        let id = intern_term(name, default_text, &mut term_ids, &mut terminals)?;
                        rhs.push(Symbol::Terminal(id));
                    }
                }
            }
            let dsl_element = match p.dsl_element {
                None => None,
                Some(name) => Some(*dsl_ids.entry(name.clone()).or_insert_with(|| {
                    let id = DslElementId(dsl_element_names.len() as u32);
                    dsl_element_names.push(name);
                    id
                })),
            };
            productions_by_rule[rule as usize].push(idx);
            productions.push(Production {
                id: idx,
                rule,
                rhs,
                dsl_element,
                feature: p.feature,
                action: p.action,
            });
        }

        // Pass 5: axioms.
        if self.axioms.is_empty() {
            return Err(GrammarError::NoAxioms);
        }
        let mut axiom_names: HashSet<String> = HashSet::new();
        let mut axioms = Vec::with_capacity(self.axioms.len());
        for (axiom_name, rule_name) in self.axioms {
            if !axiom_names.insert(axiom_name.clone()) {
                return Err(GrammarError::DuplicateAxiom(axiom_name));
            }
            let rule = *nt_ids
                .get(&rule_name)
                .ok_or_else(|| GrammarError::UnknownAxiomRule(axiom_name.clone(), rule_name.clone()))?;
            axioms.push(Axiom {
                name: axiom_name,
                rule,
            });
        }

        // Pass 6: nullable fixed point. A non-terminal is nullable if it
        // has a production whose every rhs symbol is itself nullable
        // (terminals are never nullable).
        let mut nullable: HashSet<SymbolId> = HashSet::new();
        let mut changed = true;
        while changed {
            changed = false;
            for p in &productions {
                if nullable.contains(&p.rule) {
                    continue;
                }
                let all_nullable = p
                    .rhs
                    .iter()
                    .all(|s| matches!(s, Symbol::NonTerminal(nt) if nullable.contains(nt)));
                if all_nullable {
                    nullable.insert(p.rule);
                    changed = true;
                }
            }
        }

        Ok(Grammar {
            nonterminal_names,
            terminals,
            dsl_element_names,
            productions,
            productions_by_rule,
            axioms,
            nullable,
            eos_terminal,
        })
    }
}

impl<F: Feature> Default for GrammarBuilder<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::NoFeature;

    /// The textbook John-called-Mary-from-Denver sentence grammar, used here
    /// to check axiom wiring and nullable computation together.
    fn sentence_grammar() -> Grammar<NoFeature> {
        let mut b: GrammarBuilder<NoFeature> = GrammarBuilder::new();
        b.add_axiom("S", "S");
        b.add_rule("S", vec![nt("NP"), nt("VP")]);
        b.add_rule("NP", vec![nt("NP"), nt("PP")]);
        b.add_rule("NP", vec![nt("Noun")]);
        b.add_rule("VP", vec![nt("Verb"), nt("NP")]);
        b.add_rule("VP", vec![nt("VP"), nt("PP")]);
        b.add_rule("PP", vec![nt("Prep"), nt("NP")]);
        b.add_rule("Noun", vec![term("john")]);
        b.add_rule("Noun", vec![term("mary")]);
        b.add_rule("Verb", vec![term("called")]);
        b.add_rule("Prep", vec![term("from")]);
        b.compile().expect("grammar should compile")
    }

    #[test]
    fn compiles_and_wires_axiom() {
        let g = sentence_grammar();
        let axiom = g.find_axiom(None).unwrap();
        assert_eq!(axiom.name, "S");
        assert_eq!(g.nonterminal_name(axiom.rule), "S");
    }

    #[test]
    fn axiom_lookup_by_prefix() {
        let mut b: GrammarBuilder<NoFeature> = GrammarBuilder::new();
        b.add_axiom("Expression", "Expr");
        b.add_axiom("Statement", "Stmt");
        b.add_rule("Expr", vec![term("x")]);
        b.add_rule("Stmt", vec![term("y")]);
        let g = b.compile().unwrap();
        assert_eq!(g.find_axiom(Some("Stat")).unwrap().name, "Statement");
        assert_eq!(g.find_axiom(Some("Nope")), None);
    }

    #[test]
    fn missing_rule_is_an_error() {
        let mut b: GrammarBuilder<NoFeature> = GrammarBuilder::new();
        b.add_axiom("S", "S");
        b.add_rule("S", vec![nt("Missing")]);
        assert!(matches!(b.compile(), Err(GrammarError::NoRule(_))));
    }

    #[test]
    fn nullable_fixed_point() {
        let mut b: GrammarBuilder<NoFeature> = GrammarBuilder::new();
        b.add_axiom("S", "S");
        b.add_rule("S", vec![term("a"), nt("maybe_b"), term("c")]);
        b.add_rule("maybe_b", vec![term("b")]);
        b.add_rule("maybe_b", vec![]);
        let g = b.compile().unwrap();
        let maybe_b = g
            .axioms()
            .first()
            .map(|_| ())
            .map(|_| g.nonterminal_name(1))
            .unwrap();
        assert_eq!(maybe_b, "maybe_b");
        assert!(g.is_nullable(1));
        assert!(!g.is_nullable(0));
    }

    #[test]
    fn duplicate_axiom_name_rejected() {
        let mut b: GrammarBuilder<NoFeature> = GrammarBuilder::new();
        b.add_rule("S", vec![term("a")]);
        b.add_axiom("S", "S");
        b.add_axiom("S", "S");
        assert!(matches!(b.compile(), Err(GrammarError::DuplicateAxiom(_))));
    }
}
