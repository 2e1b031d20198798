/*
 * token.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Token types produced by the lexer and consumed by the renderer.
//!
//! A compiled template is a `Vec<Token>`. Block-like tokens (sections,
//! inverted sections, placeholders) carry their nested, fully compiled token
//! sequence once compilation completes, alongside the raw source text of the
//! block (needed by higher-order sections).
//!
//! Tokens are serializable so a warmed token cache can be snapshotted and
//! restored by another engine instance.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MustacheError, MustacheResult};

/// Default opening delimiter.
pub const DEFAULT_DELIM_START: &str = "{{";

/// Default closing delimiter.
pub const DEFAULT_DELIM_END: &str = "}}";

/// Options attached to a pragma declaration (`{{%NAME key key=value}}`).
///
/// A bare `key` maps to `None`.
pub type PragmaOptions = BTreeMap<String, Option<String>>;

/// The kind of a token, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Content,
    Variable,
    VariableRaw,
    Comment,
    Section,
    SectionInvert,
    Partial,
    DelimiterSet,
    Pragma,
    Placeholder,
    Child,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Content => "content",
            TokenKind::Variable => "variable",
            TokenKind::VariableRaw => "variable_raw",
            TokenKind::Comment => "comment",
            TokenKind::Section => "section",
            TokenKind::SectionInvert => "section_invert",
            TokenKind::Partial => "partial",
            TokenKind::DelimiterSet => "delimiter_set",
            TokenKind::Pragma => "pragma",
            TokenKind::Placeholder => "placeholder",
            TokenKind::Child => "child",
        };
        f.write_str(name)
    }
}

/// A single lexed template token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Token {
    /// Literal text.
    Content(Content),

    /// Escaped variable: `{{name}}`
    Variable(Variable),

    /// Unescaped variable: `{{{name}}}` or `{{&name}}`
    VariableRaw(Variable),

    /// Comment: `{{! text}}`
    Comment(Comment),

    /// Section: `{{#name}}...{{/name}}`
    Section(Block),

    /// Inverted section: `{{^name}}...{{/name}}`
    SectionInvert(Block),

    /// Partial: `{{>name}}`
    Partial(PartialRef),

    /// Delimiter change: `{{=<% %>=}}`
    DelimiterSet(Delimiters),

    /// Pragma declaration: `{{%NAME options}}`
    Pragma(PragmaDecl),

    /// Inheritance slot: `{{$name}}default{{/name}}`
    Placeholder(Block),

    /// Inheritance invocation: `{{<parent}}overrides{{/parent}}`
    ///
    /// Only present between the two lexer passes; the lexer splices the
    /// parent's tokens in its place.
    Child(ChildRef),
}

/// Literal text content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// Text to output.
    pub text: String,
    /// Text as lexed, before whitespace stripping. Not used when rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
}

/// A variable reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Variable name, possibly a dotted path.
    pub name: String,
    /// Escape context stashed by a context-aware pragma (e.g. `attr`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Comment text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
}

/// Payload shared by sections, inverted sections and placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Section or placeholder name.
    pub name: String,
    /// Raw, uncompiled source of the block body.
    pub template: String,
    /// Compiled body.
    #[serde(default)]
    pub content: Vec<Token>,
}

/// A partial reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialRef {
    /// Partial template name.
    pub name: String,
    /// Partial tokens, when resolved at compile time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Vec<Token>>,
}

/// A start/end delimiter pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    pub start: String,
    pub end: String,
}

impl Delimiters {
    /// Create a delimiter pair.
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new(DEFAULT_DELIM_START, DEFAULT_DELIM_END)
    }
}

/// A pragma declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PragmaDecl {
    /// Pragma name, e.g. `IMPLICIT-ITERATOR`.
    pub name: String,
    /// Declared options.
    #[serde(default)]
    pub options: PragmaOptions,
}

/// A child-template (inheritance) invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRef {
    /// Name of the parent template.
    pub name: String,
    /// Raw source of the override body.
    pub template: String,
}

impl Token {
    /// Create a content token.
    pub fn content(text: impl Into<String>) -> Self {
        Token::Content(Content {
            text: text.into(),
            original: None,
        })
    }

    /// Create an escaped variable token.
    pub fn variable(name: impl Into<String>) -> Self {
        Token::Variable(Variable {
            name: name.into(),
            context: None,
        })
    }

    /// Create an unescaped variable token.
    pub fn variable_raw(name: impl Into<String>) -> Self {
        Token::VariableRaw(Variable {
            name: name.into(),
            context: None,
        })
    }

    /// The kind of this token.
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Content(_) => TokenKind::Content,
            Token::Variable(_) => TokenKind::Variable,
            Token::VariableRaw(_) => TokenKind::VariableRaw,
            Token::Comment(_) => TokenKind::Comment,
            Token::Section(_) => TokenKind::Section,
            Token::SectionInvert(_) => TokenKind::SectionInvert,
            Token::Partial(_) => TokenKind::Partial,
            Token::DelimiterSet(_) => TokenKind::DelimiterSet,
            Token::Pragma(_) => TokenKind::Pragma,
            Token::Placeholder(_) => TokenKind::Placeholder,
            Token::Child(_) => TokenKind::Child,
        }
    }

    /// The name carried by this token, if its kind has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Token::Variable(v) | Token::VariableRaw(v) => Some(&v.name),
            Token::Section(b) | Token::SectionInvert(b) | Token::Placeholder(b) => Some(&b.name),
            Token::Partial(p) => Some(&p.name),
            Token::Pragma(p) => Some(&p.name),
            Token::Child(c) => Some(&c.name),
            Token::Content(_) | Token::Comment(_) | Token::DelimiterSet(_) => None,
        }
    }

    /// Check that this token is structurally sound.
    ///
    /// The type system guarantees kind and payload agree; this catches the
    /// remaining cases a pragma rewrite can get wrong, such as empty names or
    /// unusable delimiters.
    pub fn validate(&self) -> MustacheResult<()> {
        if let Some(name) = self.name() {
            if name.trim().is_empty() {
                return Err(MustacheError::InvalidToken {
                    message: format!("{} token has an empty name", self.kind()),
                });
            }
        }

        if let Token::DelimiterSet(delims) = self {
            let unusable = |d: &str| d.is_empty() || d.chars().any(char::is_whitespace);
            if unusable(&delims.start) || unusable(&delims.end) {
                return Err(MustacheError::InvalidToken {
                    message: format!(
                        "invalid delimiters ({:?}, {:?})",
                        delims.start, delims.end
                    ),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_name() {
        let token = Token::variable("name");
        assert_eq!(token.kind(), TokenKind::Variable);
        assert_eq!(token.name(), Some("name"));

        let token = Token::content("text");
        assert_eq!(token.kind(), TokenKind::Content);
        assert_eq!(token.name(), None);
    }

    #[test]
    fn test_validate_rejects_empty_names() {
        assert!(Token::variable("x").validate().is_ok());
        assert!(matches!(
            Token::variable("  ").validate(),
            Err(MustacheError::InvalidToken { .. })
        ));

        let section = Token::Section(Block {
            name: String::new(),
            template: String::new(),
            content: Vec::new(),
        });
        assert!(matches!(
            section.validate(),
            Err(MustacheError::InvalidToken { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_delimiters() {
        assert!(
            Token::DelimiterSet(Delimiters::new("<%", "%>"))
                .validate()
                .is_ok()
        );
        assert!(
            Token::DelimiterSet(Delimiters::new("", "%>"))
                .validate()
                .is_err()
        );
        assert!(
            Token::DelimiterSet(Delimiters::new("< %", "%>"))
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_serde_shape() {
        let token = Token::Partial(PartialRef {
            name: "header".to_string(),
            tokens: Some(vec![Token::content("<h1>")]),
        });
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["kind"], "partial");
        assert_eq!(json["name"], "header");
        assert_eq!(json["tokens"][0]["kind"], "content");

        let back: Token = serde_json::from_value(json).unwrap();
        assert_eq!(back, token);
    }
}
