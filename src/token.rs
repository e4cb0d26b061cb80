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

//! Lexical tokens and the lexer boundary the recognizer consumes.

use crate::grammar::SymbolId;
use crate::marker::Style;

/// One lexical unit: a terminal id, its span in the source text, and the
/// text it covers. `style` is filled in later by the marker/style subsystem,
/// not by the lexer.
#[derive(Debug, Clone)]
pub struct Token {
    pub offset: usize,
    pub length: usize,
    pub id: SymbolId,
    pub text: String,
    pub style: Option<Style>,
}

impl Token {
    pub fn new(offset: usize, length: usize, id: SymbolId, text: impl Into<String>) -> Self {
        Token {
            offset,
            length,
            id,
            text: text.into(),
            style: None,
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Consumed boundary: a lazy source of tokens. The recognizer calls
/// `next_token` until it receives one whose `id` is the grammar's EOS
/// terminal, and never calls it again afterwards.
pub trait Lexer {
    fn next_token(&mut self) -> Token;
}

/// Minimal reference `Lexer`: tokens pre-materialized into a `Vec`, with an
/// EOS token synthesized once the vector is drained. Used by this crate's
/// own tests and as a starting point for callers who already tokenize
/// up front.
pub struct VecLexer {
    tokens: std::vec::IntoIter<Token>,
    eos_id: SymbolId,
    exhausted_at: usize,
}

impl VecLexer {
    pub fn new(tokens: Vec<Token>, eos_id: SymbolId) -> Self {
        let exhausted_at = tokens.iter().map(Token::end).max().unwrap_or(0);
        VecLexer {
            tokens: tokens.into_iter(),
            eos_id,
            exhausted_at,
        }
    }
}

impl Lexer for VecLexer {
    fn next_token(&mut self) -> Token {
        match self.tokens.next() {
            Some(tok) => tok,
            None => Token::new(self.exhausted_at, 0, self.eos_id, ""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_lexer_yields_eos_after_draining() {
        let tokens = vec![Token::new(0, 1, 1, "a"), Token::new(1, 1, 2, "b")];
        let mut lexer = VecLexer::new(tokens, 99);
        assert_eq!(lexer.next_token().id, 1);
        assert_eq!(lexer.next_token().id, 2);
        let eos = lexer.next_token();
        assert_eq!(eos.id, 99);
        assert_eq!(eos.offset, 2);
        // Past-EOS calls keep yielding EOS rather than panicking.
        assert_eq!(lexer.next_token().id, 99);
    }
}
