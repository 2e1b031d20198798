/*
 * pragma/implicit_iterator.rs
 * Copyright (c) 2025 Posit, PBC
 */

use super::{Pragma, PragmaOptions};
use crate::error::MustacheResult;
use crate::render_context::RenderContext;
use crate::token::{Token, TokenKind};
use crate::view::View;

/// Name of the iteration variable when no `iterator` option is given.
const DEFAULT_ITERATOR: &str = ".";

/// `IMPLICIT-ITERATOR`: render the current scalar item while iterating a
/// list of scalars.
///
/// ```text
/// {{%IMPLICIT-ITERATOR iterator=item}}
/// {{#numbers}}<li>{{item}}</li>{{/numbers}}
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ImplicitIterator;

impl Pragma for ImplicitIterator {
    fn name(&self) -> &str {
        "IMPLICIT-ITERATOR"
    }

    fn handles_token(&self, kind: TokenKind) -> bool {
        matches!(kind, TokenKind::Variable | TokenKind::VariableRaw)
    }

    fn render(
        &self,
        token: &Token,
        view: &View,
        options: &PragmaOptions,
        ctx: &RenderContext<'_>,
    ) -> MustacheResult<Option<String>> {
        if !view.is_scalar() {
            return Ok(None);
        }

        let (variable, escape) = match token {
            Token::Variable(v) => (v, true),
            Token::VariableRaw(v) => (v, false),
            _ => return Ok(None),
        };

        let iterator = options
            .get("iterator")
            .and_then(|value| value.as_deref())
            .unwrap_or(DEFAULT_ITERATOR);
        if variable.name != iterator {
            return Ok(None);
        }

        let text = view.to_text();
        Ok(Some(if escape {
            ctx.escape_default(&text)
        } else {
            text
        }))
    }
}
