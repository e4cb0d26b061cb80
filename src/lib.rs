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

//! `bnfchart`: a general context-free parsing engine for language tooling.
//!
//! A caller declares a grammar with [`grammar::builder::GrammarBuilder`],
//! recognizes a token stream against it with [`Bnfchart::parse`], walks the
//! resulting forest with [`Bnfchart::trees`], and asks for completions at a
//! cursor with [`Bnfchart::complete`]. Recognition tolerates lexical and
//! syntactic errors rather than failing outright: `parse` always returns a
//! record, and its `success` flag plus the markers on a reconstructed tree
//! tell the caller how clean the derivation was.

pub mod completion;
pub mod context;
pub mod error;
pub mod grammar;
pub mod marker;
pub mod navigator;
pub mod recognizer;
pub mod result;
pub mod token;

pub use completion::{
    CompletionComputeFilter, CompletionContext, CompletionFilter, CompletionProcessor, CompletionProposal,
    CompletionProvider,
};
pub use context::{ActionContext, Context};
pub use error::FacadeError;
pub use grammar::builder::GrammarBuilder;
pub use grammar::{
    ActionArg, ActionValue, Axiom, DslElementId, Feature, Grammar, NoFeature, Production, ReductionAction, Symbol,
    SymbolId,
};
pub use marker::{Marker, MarkerKind, Severity, Style, StyleRange, Styles};
pub use navigator::{default_reducers, Ambiguity, GenericNode, GenericTree, Navigator, NavigatorError, Reducer};
pub use recognizer::Chart;
pub use result::ParseRecord;
pub use token::{Lexer, Token, VecLexer};

/// Entry point tying a [`Grammar`] to the recognizer, navigator and
/// completion engine, so a caller working against one grammar doesn't have
/// to juggle the three separately.
pub struct Bnfchart<F: Feature> {
    grammar: Grammar<F>,
}

impl<F: Feature> Bnfchart<F> {
    pub fn new(grammar: Grammar<F>) -> Self {
        Bnfchart { grammar }
    }

    pub fn grammar(&self) -> &Grammar<F> {
        &self.grammar
    }

    /// Recognizes `lexer`'s token stream against the named axiom (or the
    /// grammar's default axiom if `axiom_name` is `None`).
    pub fn parse(&self, lexer: &mut dyn Lexer, axiom_name: Option<&str>) -> Result<ParseRecord<F>, FacadeError> {
        let axiom = self
            .grammar
            .find_axiom(axiom_name)
            .ok_or_else(|| match axiom_name {
                Some(name) => FacadeError::MissingAxiom(name.to_string()),
                None => FacadeError::EmptyGrammar,
            })?
            .clone();
        Ok(ParseRecord::parse(&self.grammar, lexer, &axiom))
    }

    /// Reconstructs every derivation tree a [`ParseRecord`] admits under the
    /// default reducer stack (at most one, since [`Reducer::SelectOne`] is
    /// always the last stage).
    pub fn trees(&self, record: &ParseRecord<F>) -> Result<Vec<GenericTree>, FacadeError> {
        let mut navigator = Navigator::new(record, &self.grammar, default_reducers());
        navigator.trees(record.axiom.rule).map_err(FacadeError::from)
    }

    /// Builds a [`CompletionProcessor`] bound to `record`'s chart. Callers
    /// that need providers, filters or a custom delimiter set should build
    /// their own processor directly instead.
    pub fn completions<'a>(&'a self, record: &'a ParseRecord<F>) -> CompletionProcessor<'a, F> {
        CompletionProcessor::new(record, &self.grammar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grammar::builder::{no_action, term, GrammarBuilder};

    fn ab_grammar() -> Grammar<NoFeature> {
        let mut b: GrammarBuilder<NoFeature> = GrammarBuilder::new();
        b.add_axiom("S", "S");
        b.add_production("S", vec![term("a"), term("b")], NoFeature, None, no_action());
        b.compile().unwrap()
    }

    #[test]
    fn facade_parses_and_reconstructs_a_tree() {
        let grammar = ab_grammar();
        let a = (0..grammar.terminal_count() as u32).find(|&i| grammar.terminal(i).name == "a").unwrap();
        let b = (0..grammar.terminal_count() as u32).find(|&i| grammar.terminal(i).name == "b").unwrap();
        let tokens = vec![Token::new(0, 1, a, "a"), Token::new(1, 1, b, "b")];
        let mut lexer = VecLexer::new(tokens, grammar.eos_terminal());

        let chart = Bnfchart::new(grammar);
        let record = chart.parse(&mut lexer, None).unwrap();
        assert!(record.success);

        let trees = chart.trees(&record).unwrap();
        assert_eq!(trees.len(), 1);
    }

    #[test]
    fn facade_rejects_unknown_axiom_name() {
        let chart = Bnfchart::new(ab_grammar());
        let mut lexer = VecLexer::new(Vec::new(), chart.grammar().eos_terminal());
        let err = chart.parse(&mut lexer, Some("NoSuchAxiom")).unwrap_err();
        assert!(matches!(err, FacadeError::MissingAxiom(_)));
    }
}
