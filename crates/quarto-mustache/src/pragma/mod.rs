/*
 * pragma/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Pragmas: named, opt-in extensions to lexing and rendering.
//!
//! A template activates a pragma with `{{%NAME options}}`. From that point to
//! the end of the enclosing section or template the pragma may:
//!
//! 1. rewrite tokens of the kinds it handles as they are lexed
//!    ([`Pragma::parse`]), and
//! 2. supply the output for tokens of those kinds at render time
//!    ([`Pragma::render`]).
//!
//! Activation never crosses into partials.

mod contextual_escape;
mod implicit_iterator;
mod registry;
mod sub_views;

pub use contextual_escape::ContextualEscape;
pub use implicit_iterator::ImplicitIterator;
pub use registry::PragmaRegistry;
pub use sub_views::{SubView, SubViews};

pub use crate::token::PragmaOptions;

use crate::error::MustacheResult;
use crate::render_context::RenderContext;
use crate::token::{Token, TokenKind};
use crate::view::View;

/// A named lexer/renderer extension.
pub trait Pragma: Send + Sync {
    /// The name templates use to activate this pragma.
    fn name(&self) -> &str;

    /// Whether this pragma wants to see tokens of `kind`.
    fn handles_token(&self, kind: TokenKind) -> bool;

    /// Rewrite a token as it is lexed.
    ///
    /// The returned token is validated before lexing continues.
    fn parse(&self, token: Token) -> MustacheResult<Token> {
        Ok(token)
    }

    /// Produce output for a token at render time.
    ///
    /// Returning `None` (or an empty string) lets the renderer handle the
    /// token normally.
    fn render(
        &self,
        token: &Token,
        view: &View,
        options: &PragmaOptions,
        ctx: &RenderContext<'_>,
    ) -> MustacheResult<Option<String>>;
}

/// Pragmas activated in the current render scope, in activation order.
///
/// Each render scope owns its own copy, so activations made inside a section
/// end with that section.
#[derive(Debug, Clone, Default)]
pub struct ActivePragmas {
    entries: Vec<(String, PragmaOptions)>,
}

impl ActivePragmas {
    /// An empty activation set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate `name`. Re-activating keeps the original position and
    /// replaces the options.
    pub fn activate(&mut self, name: impl Into<String>, options: PragmaOptions) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = options,
            None => self.entries.push((name, options)),
        }
    }

    /// Whether `name` is active.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Active pragma names, in activation order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Iterate over `(name, options)` pairs in activation order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PragmaOptions)> {
        self.entries.iter().map(|(n, o)| (n.as_str(), o))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
