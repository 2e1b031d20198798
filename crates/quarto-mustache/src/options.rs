/*
 * options.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Engine configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::MustacheResult;
use crate::escape::EscapeContext;
use crate::render_context::DEFAULT_MAX_PARTIAL_DEPTH;
use crate::resolver::DEFAULT_SUFFIX;
use crate::token::Delimiters;

/// Configuration for a [`crate::Mustache`] engine.
///
/// Every field has a default, so a JSON document only needs the fields it
/// changes:
///
/// ```
/// use quarto_mustache::MustacheOptions;
///
/// let options = MustacheOptions::from_json_str(r#"{"strip_whitespace": false}"#).unwrap();
/// assert!(!options.strip_whitespace);
/// assert_eq!(options.suffix, ".mustache");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MustacheOptions {
    /// Strip whitespace left behind by standalone block tags.
    pub strip_whitespace: bool,

    /// Delimiters every template starts with.
    pub delimiters: Delimiters,

    /// Escape context for plain `{{name}}` variables.
    pub escape: EscapeContext,

    /// Maximum partial nesting depth at render time.
    pub max_partial_depth: usize,

    /// Template directories, searched last-first.
    pub template_paths: Vec<PathBuf>,

    /// Template file suffix.
    pub suffix: String,
}

impl Default for MustacheOptions {
    fn default() -> Self {
        Self {
            strip_whitespace: true,
            delimiters: Delimiters::default(),
            escape: EscapeContext::Html,
            max_partial_depth: DEFAULT_MAX_PARTIAL_DEPTH,
            template_paths: Vec::new(),
            suffix: DEFAULT_SUFFIX.to_string(),
        }
    }
}

impl MustacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from JSON.
    pub fn from_json_str(json: &str) -> MustacheResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_strip_whitespace(mut self, strip: bool) -> Self {
        self.strip_whitespace = strip;
        self
    }

    pub fn with_delimiters(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.delimiters = Delimiters::new(start, end);
        self
    }

    pub fn with_escape(mut self, escape: EscapeContext) -> Self {
        self.escape = escape;
        self
    }

    /// Set the maximum partial nesting depth.
    pub fn with_max_partial_depth(mut self, depth: usize) -> Self {
        self.max_partial_depth = depth;
        self
    }

    /// Add a template directory.
    pub fn with_template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_paths.push(path.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }
}
