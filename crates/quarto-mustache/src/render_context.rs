/*
 * render_context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Rendering context.
//!
//! This module provides [`RenderContext`], which is threaded through all
//! rendering functions to:
//!
//! 1. Reach back into the engine (pragma registry, escaping, tokenizing)
//! 2. Track the pragmas active in the current render scope
//! 3. Track partial nesting depth for recursion protection

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{MustacheError, MustacheResult};
use crate::escape::{EscapeContext, Escaper};
use crate::pragma::{ActivePragmas, PragmaRegistry};
use crate::token::{PragmaDecl, Token};
use crate::view::View;

/// Default maximum partial nesting depth.
pub const DEFAULT_MAX_PARTIAL_DEPTH: usize = 100;

/// Engine services the renderer calls back into.
pub trait RenderHost {
    /// Registered pragmas.
    fn pragmas(&self) -> &PragmaRegistry;

    /// The escaper for variable output.
    fn escaper(&self) -> &dyn Escaper;

    /// Context used for plain `{{name}}` variables.
    fn default_escape(&self) -> EscapeContext;

    /// Tokens for a named template, from cache or resolvers.
    fn tokenize(&self, name: &str) -> MustacheResult<Arc<Vec<Token>>>;

    /// Compile a template fragment with the given pragmas already in scope.
    fn compile_fragment(&self, text: &str, pragmas: &[String]) -> MustacheResult<Vec<Token>>;

    /// Render a template name or literal template text from the top.
    fn render_template(&self, template: &str, view: &View) -> MustacheResult<String>;
}

/// Context for a single render call and its nested scopes.
#[derive(Clone)]
pub struct RenderContext<'a> {
    host: &'a dyn RenderHost,

    /// Caller-supplied partial aliases, already tokenized.
    partials: &'a HashMap<String, Arc<Vec<Token>>>,

    /// Pragmas active in this scope.
    pragmas: ActivePragmas,

    /// Current partial nesting depth.
    pub partial_depth: usize,

    /// Maximum partial nesting depth before error.
    pub max_partial_depth: usize,
}

impl<'a> RenderContext<'a> {
    pub fn new(host: &'a dyn RenderHost, partials: &'a HashMap<String, Arc<Vec<Token>>>) -> Self {
        Self {
            host,
            partials,
            pragmas: ActivePragmas::new(),
            partial_depth: 0,
            max_partial_depth: DEFAULT_MAX_PARTIAL_DEPTH,
        }
    }

    /// Set the maximum partial nesting depth.
    pub fn with_max_partial_depth(mut self, depth: usize) -> Self {
        self.max_partial_depth = depth;
        self
    }

    pub fn host(&self) -> &'a dyn RenderHost {
        self.host
    }

    /// Pragmas active in this scope.
    pub fn active_pragmas(&self) -> &ActivePragmas {
        &self.pragmas
    }

    /// Activate a pragma declared by the template.
    ///
    /// Fails with [`MustacheError::UnregisteredPragma`] if the engine has no
    /// pragma of that name.
    pub fn activate(&mut self, decl: &PragmaDecl) -> MustacheResult<()> {
        if !self.host.pragmas().has(&decl.name) {
            return Err(MustacheError::UnregisteredPragma {
                name: decl.name.clone(),
            });
        }
        self.pragmas.activate(decl.name.clone(), decl.options.clone());
        Ok(())
    }

    /// Escape `value` for `context` with the engine's escaper.
    pub fn escape(&self, value: &str, context: EscapeContext) -> String {
        self.host.escaper().escape(value, context)
    }

    /// Escape `value` for the engine's default context.
    pub fn escape_default(&self, value: &str) -> String {
        self.escape(value, self.host.default_escape())
    }

    /// Render a template name or literal template text against `view`.
    pub fn render_template(&self, template: &str, view: &View) -> MustacheResult<String> {
        self.host.render_template(template, view)
    }

    /// Tokens registered for a caller-supplied partial alias.
    pub fn partial_alias(&self, name: &str) -> Option<&'a Arc<Vec<Token>>> {
        self.partials.get(name)
    }

    /// Context for rendering a partial: one level deeper, no active pragmas.
    pub fn enter_partial(&self, name: &str) -> MustacheResult<RenderContext<'a>> {
        if self.partial_depth >= self.max_partial_depth {
            return Err(MustacheError::RecursivePartial {
                name: name.to_string(),
                max_depth: self.max_partial_depth,
            });
        }
        Ok(RenderContext {
            host: self.host,
            partials: self.partials,
            pragmas: ActivePragmas::new(),
            partial_depth: self.partial_depth + 1,
            max_partial_depth: self.max_partial_depth,
        })
    }
}
