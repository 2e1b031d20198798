/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template lexing and rendering.
//!
//! Every error is terminal for the compile or render call that raised it;
//! nothing in this crate recovers from a failure or returns partial output.

use thiserror::Error;

/// Errors that can occur while compiling or rendering Mustache templates.
#[derive(Debug, Error)]
pub enum MustacheError {
    /// Template input was not text (e.g. a resolved file that is not UTF-8).
    #[error("Invalid template: {message}")]
    InvalidTemplate { message: String },

    /// A variable tag does not contain a valid variable name.
    #[error("Invalid variable name provided ({name})")]
    InvalidVariableName { name: String },

    /// A pragma tag does not start with a valid pragma name.
    #[error("Invalid pragma declaration ({tag})")]
    InvalidPragmaName { tag: String },

    /// A delimiter-set tag is malformed.
    #[error("Did not find delimiters in tag ({tag})")]
    InvalidDelimiter { tag: String },

    /// End of input reached while inside a tag.
    #[error("Unbalanced tag: end of template reached inside an unterminated tag")]
    UnbalancedTag,

    /// End of input reached while looking for a section's closing tag.
    #[error("Unbalanced section, placeholder, or inheritance block: {name}")]
    UnbalancedSection { name: String },

    /// The lexer reached a state it should never be in.
    #[error("Invalid lexer state: {message}")]
    InvalidState { message: String },

    /// A pragma rewrote a token into something structurally invalid.
    #[error("Invalid token struct: {message}")]
    InvalidToken { message: String },

    /// No resolver could supply the named template.
    #[error("Template by name \"{name}\" not found")]
    TemplateNotFound { name: String },

    /// Caller-supplied partial aliases have the wrong shape.
    #[error("Invalid partials: {message}")]
    InvalidPartials { message: String },

    /// A template search path is not a directory.
    #[error("Invalid template path: {path}")]
    InvalidTemplatePath { path: String },

    /// A pragma with the same name is already registered.
    #[error("A pragma named \"{name}\" is already registered")]
    DuplicatePragma { name: String },

    /// Lookup of a pragma name that was never registered.
    #[error("Pragma \"{name}\" not found")]
    PragmaNotFound { name: String },

    /// A template activated a pragma that has no registered handler.
    #[error("No handler for pragma \"{name}\" registered; cannot proceed rendering")]
    UnregisteredPragma { name: String },

    /// Unknown escaping context.
    #[error("Invalid escape type provided ({context})")]
    InvalidEscaper { context: String },

    /// Partial nesting exceeded the configured render depth.
    #[error("Recursive partial inclusion detected (depth > {max_depth}): {name}")]
    RecursivePartial { name: String, max_depth: usize },

    /// I/O error (e.g., reading a template file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine options or a token snapshot could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for template operations.
pub type MustacheResult<T> = Result<T, MustacheError>;
