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

//! Per-node side data and the restricted capability view reduction actions
//! run against.

use std::any::Any;
use std::rc::Rc;

use crate::grammar::Feature;
use crate::marker::{Marker, MarkerKind, Severity, Style};

/// Side data accumulated for one node of the parse forest as its reduction
/// action runs: markers it raised, a style it set for itself or a child
/// token, whether it asked to abort, and a small untyped scratch slot for
/// the action's own use across calls (e.g. accumulating a symbol table
/// entry incrementally).
#[derive(Default)]
pub struct Context {
    markers: Vec<Marker>,
    styles: Vec<(usize, usize, Style)>,
    token_styles: Vec<(usize, Style)>,
    aborted: bool,
    user_data: Option<Rc<dyn Any>>,
}

impl Context {
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn styles(&self) -> &[(usize, usize, Style)] {
        &self.styles
    }

    pub fn token_styles(&self) -> &[(usize, Style)] {
        &self.token_styles
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

/// The capability view passed to a [`crate::grammar::ReductionAction`]: a
/// restricted API over a node's [`Context`], plus the feature the
/// recognizer accumulated for this derivation (read-only: actions can't
/// retroactively change what already survived recognition).
pub struct ActionContext<'a, F: Feature> {
    ctx: &'a mut Context,
    feature: &'a F,
}

impl<'a, F: Feature> ActionContext<'a, F> {
    pub fn new(ctx: &'a mut Context, feature: &'a F) -> Self {
        ActionContext { ctx, feature }
    }

    pub fn feature(&self) -> &F {
        self.feature
    }

    pub fn add_marker(&mut self, offset: usize, length: usize, kind: MarkerKind, message: impl Into<String>, severity: Severity) {
        self.ctx.markers.push(Marker::new(offset, length, kind, message, severity));
    }

    pub fn set_style(&mut self, offset: usize, length: usize, style: Style) {
        self.ctx.styles.push((offset, length, style));
    }

    pub fn set_token_style(&mut self, token_offset: usize, style: Style) {
        self.ctx.token_styles.push((token_offset, style));
    }

    pub fn abort(&mut self) {
        self.ctx.aborted = true;
    }

    pub fn set_user_data<T: Any>(&mut self, value: T) {
        self.ctx.user_data = Some(Rc::new(value));
    }

    pub fn user_data<T: Any>(&self) -> Option<&T> {
        self.ctx.user_data.as_ref().and_then(|d| d.downcast_ref::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::NoFeature;

    #[test]
    fn action_context_records_markers_and_styles() {
        let mut ctx = Context::default();
        let feature = NoFeature;
        {
            let mut action_ctx = ActionContext::new(&mut ctx, &feature);
            action_ctx.add_marker(0, 3, MarkerKind::Ambiguous, "ambiguous here", Severity::Warning);
            action_ctx.set_style(0, 3, "keyword".to_string());
            action_ctx.set_user_data(42i32);
            assert_eq!(action_ctx.user_data::<i32>(), Some(&42));
        }
        assert_eq!(ctx.markers().len(), 1);
        assert_eq!(ctx.styles().len(), 1);
        assert!(!ctx.is_aborted());
    }

    #[test]
    fn abort_is_recorded() {
        let mut ctx = Context::default();
        let feature = NoFeature;
        let mut action_ctx = ActionContext::new(&mut ctx, &feature);
        action_ctx.abort();
        drop(action_ctx);
        assert!(ctx.is_aborted());
    }
}
