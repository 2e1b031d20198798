/*
 * escape.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Output escaping.
//!
//! Escaping is pluggable through the [`Escaper`] trait. [`DefaultEscaper`]
//! covers the five contexts a template can request: HTML body text, HTML
//! attribute values, JavaScript strings, CSS and URL components.

use std::fmt;
use std::fmt::Write;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MustacheError;

/// The output context a value is escaped for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeContext {
    #[default]
    Html,
    Attr,
    Js,
    Css,
    Url,
}

impl EscapeContext {
    /// All supported contexts.
    pub const ALL: [EscapeContext; 5] = [
        EscapeContext::Html,
        EscapeContext::Attr,
        EscapeContext::Js,
        EscapeContext::Css,
        EscapeContext::Url,
    ];

    /// The context's name as used in templates.
    pub fn as_str(self) -> &'static str {
        match self {
            EscapeContext::Html => "html",
            EscapeContext::Attr => "attr",
            EscapeContext::Js => "js",
            EscapeContext::Css => "css",
            EscapeContext::Url => "url",
        }
    }
}

impl fmt::Display for EscapeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EscapeContext {
    type Err = MustacheError;

    /// Parse a context name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        EscapeContext::ALL
            .into_iter()
            .find(|ctx| ctx.as_str() == lower)
            .ok_or_else(|| MustacheError::InvalidEscaper {
                context: s.to_string(),
            })
    }
}

/// Escapes rendered values for an output context.
pub trait Escaper: Send + Sync {
    fn escape(&self, value: &str, context: EscapeContext) -> String;
}

impl<F> Escaper for F
where
    F: Fn(&str, EscapeContext) -> String + Send + Sync,
{
    fn escape(&self, value: &str, context: EscapeContext) -> String {
        self(value, context)
    }
}

/// The built-in escaper.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEscaper;

impl Escaper for DefaultEscaper {
    fn escape(&self, value: &str, context: EscapeContext) -> String {
        match context {
            EscapeContext::Html => escape_html(value),
            EscapeContext::Attr => escape_html_attr(value),
            EscapeContext::Js => escape_js(value),
            EscapeContext::Css => escape_css(value),
            EscapeContext::Url => escape_url(value),
        }
    }
}

/// Escape HTML special characters.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Values made only of digits pass through attribute/JS/CSS escaping.
fn is_digits(s: &str) -> bool {
    s.is_empty() || s.bytes().all(|b| b.is_ascii_digit())
}

/// Escape for an HTML attribute value.
///
/// Alphanumerics and `,.-_` pass through; the four HTML specials use named
/// entities; control characters become U+FFFD; everything else becomes a
/// hexadecimal character reference.
pub fn escape_html_attr(s: &str) -> String {
    if is_digits(s) {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, ',' | '.' | '-' | '_') {
            out.push(c);
            continue;
        }
        let code = u32::from(c);
        match c {
            '"' => out.push_str("&quot;"),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ if code <= 0x1f && !matches!(c, '\t' | '\n' | '\r') => out.push_str("&#xFFFD;"),
            _ if code > 0xff => {
                let _ = write!(out, "&#x{:04X};", code);
            }
            _ => {
                let _ = write!(out, "&#x{:02X};", code);
            }
        }
    }
    out
}

/// Escape for a JavaScript string literal.
///
/// Alphanumerics and `,._` pass through; ASCII becomes `\xHH`, everything
/// else `\uHHHH` (UTF-16, surrogate pairs for astral characters).
pub fn escape_js(s: &str) -> String {
    if is_digits(s) {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, ',' | '.' | '_') {
            out.push(c);
        } else if c.is_ascii() {
            let _ = write!(out, "\\x{:02X}", u32::from(c));
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{:04X}", unit);
            }
        }
    }
    out
}

/// Escape for CSS: anything not alphanumeric becomes `\HEX ` (with the
/// terminating space).
pub fn escape_css(s: &str) -> String {
    if is_digits(s) {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            let _ = write!(out, "\\{:X} ", u32::from(c));
        }
    }
    out
}

/// Percent-encode a URL component (RFC 3986 unreserved characters pass).
pub fn escape_url(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "%{:02X}", b);
        }
    }
    out
}
