/*
 * pragma/registry.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The set of pragmas an engine knows about.

use std::fmt;
use std::sync::Arc;

use super::{ImplicitIterator, Pragma};
use crate::error::{MustacheError, MustacheResult};
use crate::token::TokenKind;

/// Registered pragmas, in registration order, with unique names.
///
/// Registration order matters: at lex time each in-scope pragma sees the
/// token as rewritten by the ones registered before it.
#[derive(Clone)]
pub struct PragmaRegistry {
    pragmas: Vec<Arc<dyn Pragma>>,
}

impl PragmaRegistry {
    /// A registry holding the default pragma (`IMPLICIT-ITERATOR`).
    pub fn new() -> Self {
        Self {
            pragmas: vec![Arc::new(ImplicitIterator)],
        }
    }

    /// A registry with no pragmas.
    pub fn empty() -> Self {
        Self {
            pragmas: Vec::new(),
        }
    }

    /// Register a pragma.
    ///
    /// Fails with [`MustacheError::DuplicatePragma`] if the name is taken.
    pub fn add(&mut self, pragma: impl Pragma + 'static) -> MustacheResult<()> {
        self.add_shared(Arc::new(pragma))
    }

    /// Register an already shared pragma.
    pub fn add_shared(&mut self, pragma: Arc<dyn Pragma>) -> MustacheResult<()> {
        if self.has(pragma.name()) {
            return Err(MustacheError::DuplicatePragma {
                name: pragma.name().to_string(),
            });
        }
        tracing::debug!(pragma = pragma.name(), "Registered pragma");
        self.pragmas.push(pragma);
        Ok(())
    }

    /// Whether a pragma named `name` is registered.
    pub fn has(&self, name: &str) -> bool {
        self.pragmas.iter().any(|p| p.name() == name)
    }

    /// Get a registered pragma by name.
    pub fn get(&self, name: &str) -> MustacheResult<&Arc<dyn Pragma>> {
        self.pragmas
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| MustacheError::PragmaNotFound {
                name: name.to_string(),
            })
    }

    /// Pragmas that are in `scope` and handle `kind`, in registration order.
    pub fn handlers<'a>(
        &'a self,
        kind: TokenKind,
        scope: &'a [String],
    ) -> impl Iterator<Item = &'a Arc<dyn Pragma>> + 'a {
        self.pragmas
            .iter()
            .filter(move |p| scope.iter().any(|s| s == p.name()) && p.handles_token(kind))
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.pragmas.iter().map(|p| p.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Pragma>> {
        self.pragmas.iter()
    }

    pub fn len(&self) -> usize {
        self.pragmas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pragmas.is_empty()
    }

    /// Remove every pragma, including the default one.
    pub fn clear(&mut self) {
        self.pragmas.clear();
    }
}

impl Default for PragmaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PragmaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
