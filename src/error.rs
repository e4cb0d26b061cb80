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

//! Errors surfaced at the facade boundary. Syntactic and lexical trouble
//! inside a parse never becomes an `Err` here, only markers on the
//! resulting [`crate::result::ParseRecord`]. These variants cover failures
//! that mean there is nothing to parse against at all.

/// Errors from [`crate::Bnfchart::parse`] and [`crate::Bnfchart::trees`].
#[derive(Debug, thiserror::Error)]
pub enum FacadeError {
    #[error("no axiom named `{0}` (or no default axiom) in this grammar")]
    MissingAxiom(String),
    #[error("grammar declares no axioms")]
    EmptyGrammar,
    #[error("no derivation tree could be reconstructed: {0}")]
    NoAst(#[from] crate::navigator::NavigatorError),
}
