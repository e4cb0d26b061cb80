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

//! The persistent record a parse produces: immutable once `parse()` returns.

use crate::grammar::{Axiom, Feature, Grammar};
use crate::marker::Marker;
use crate::recognizer::{self, Chart};
use crate::token::Lexer;

/// A completed parse: its chart, the axiom it was run against, lexical
/// errors found independent of any chosen derivation, and whether a clean
/// (non-error-recovered) derivation of the whole input exists.
///
/// Mutated only during [`ParseRecord::parse`]; read-only afterwards.
#[derive(Debug)]
pub struct ParseRecord<F: Feature> {
    pub chart: Chart<F>,
    pub axiom: Axiom,
    pub error_tokens: Vec<Marker>,
    pub success: bool,
}

impl<F: Feature> ParseRecord<F> {
    pub fn parse(grammar: &Grammar<F>, lexer: &mut dyn Lexer, axiom: &Axiom) -> Self {
        let (chart, error_tokens, success) = recognizer::parse(grammar, lexer, axiom);
        ParseRecord {
            chart,
            axiom: axiom.clone(),
            error_tokens,
            success,
        }
    }

    pub fn token_count(&self) -> usize {
        self.chart.tokens.len()
    }
}
