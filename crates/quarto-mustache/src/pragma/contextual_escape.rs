/*
 * pragma/contextual_escape.rs
 * Copyright (c) 2025 Posit, PBC
 */

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Pragma, PragmaOptions};
use crate::error::MustacheResult;
use crate::escape::EscapeContext;
use crate::render_context::RenderContext;
use crate::token::{Token, TokenKind};
use crate::view::{Lambda, View};

/// `name|context` where context is one of the supported escape contexts.
static CONTEXT_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<varname>[^|]+)\|(?P<context>html|attr|js|css|url)$").unwrap()
});

/// `CONTEXTUAL-ESCAPE`: choose the escape context per variable with a
/// `|context` suffix.
///
/// ```text
/// {{%CONTEXTUAL-ESCAPE}}
/// <a href="/search?q={{query|url}}" title="{{title|attr}}">{{title}}</a>
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextualEscape;

impl Pragma for ContextualEscape {
    fn name(&self) -> &str {
        "CONTEXTUAL-ESCAPE"
    }

    fn handles_token(&self, kind: TokenKind) -> bool {
        kind == TokenKind::Variable
    }

    fn parse(&self, token: Token) -> MustacheResult<Token> {
        let Token::Variable(mut variable) = token else {
            return Ok(token);
        };
        if let Some(caps) = CONTEXT_SUFFIX.captures(&variable.name) {
            let context = caps["context"].to_string();
            variable.name = caps["varname"].to_string();
            variable.context = Some(context);
        }
        Ok(Token::Variable(variable))
    }

    fn render(
        &self,
        token: &Token,
        view: &View,
        _options: &PragmaOptions,
        ctx: &RenderContext<'_>,
    ) -> MustacheResult<Option<String>> {
        let Token::Variable(variable) = token else {
            return Ok(None);
        };
        let Some(context) = variable.context.as_deref() else {
            return Ok(None);
        };
        let context: EscapeContext = context.parse()?;

        if view.is_scalar() {
            return Ok(Some(ctx.escape(&view.to_text(), context)));
        }

        let value = match view.get_raw(&variable.name) {
            Some(value) => value,
            None => view.lookup(&variable.name),
        };
        let text = match &*value {
            View::Lambda(Lambda::Value(f)) => f().to_text(),
            View::Null => return Ok(None),
            other => other.to_text(),
        };
        Ok(Some(ctx.escape(&text, context)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Variable;

    #[test]
    fn test_parse_strips_context_suffix() {
        let token = ContextualEscape.parse(Token::variable("title|attr")).unwrap();
        assert_eq!(
            token,
            Token::Variable(Variable {
                name: "title".to_string(),
                context: Some("attr".to_string()),
            })
        );
    }

    #[test]
    fn test_parse_leaves_unknown_context() {
        let token = ContextualEscape.parse(Token::variable("title|xml")).unwrap();
        assert_eq!(token, Token::variable("title|xml"));
    }

    #[test]
    fn test_parse_ignores_other_kinds() {
        let token = ContextualEscape
            .parse(Token::variable_raw("title|attr"))
            .unwrap();
        assert_eq!(token, Token::variable_raw("title|attr"));
    }
}
