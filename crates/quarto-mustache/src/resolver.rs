/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template resolution.
//!
//! This module provides the [`Resolver`] trait and implementations for
//! loading templates by name from various sources (filesystem, memory), plus
//! [`AggregateResolver`], which chains several resolvers by priority.

use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::{MustacheError, MustacheResult};
use crate::token::Token;

/// Default template file suffix.
pub const DEFAULT_SUFFIX: &str = ".mustache";

/// Namespace used for template names without a `ns::` prefix.
const DEFAULT_NAMESPACE: &str = "";

/// What a resolver found for a template name.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSource {
    /// Template text, still to be compiled.
    Text(String),
    /// An already compiled token sequence.
    Tokens(Vec<Token>),
}

/// Trait for loading templates by name.
pub trait Resolver: Send + Sync {
    /// Load the template `name`.
    ///
    /// Returns `Ok(None)` if this resolver does not know the name; errors are
    /// reserved for templates that exist but cannot be read.
    fn resolve(&self, name: &str) -> MustacheResult<Option<TemplateSource>>;
}

/// Resolver that serves templates from an in-memory map.
///
/// Useful for testing and for templates bundled into the application.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    templates: HashMap<String, TemplateSource>,
}

impl MemoryResolver {
    /// Create a new empty memory resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add template text.
    pub fn add(&mut self, name: impl Into<String>, content: impl Into<String>) -> &mut Self {
        self.templates
            .insert(name.into(), TemplateSource::Text(content.into()));
        self
    }

    /// Add a pre-compiled token sequence.
    pub fn add_tokens(&mut self, name: impl Into<String>, tokens: Vec<Token>) -> &mut Self {
        self.templates
            .insert(name.into(), TemplateSource::Tokens(tokens));
        self
    }

    /// Create a resolver with the given templates.
    pub fn with_templates(
        templates: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        let mut resolver = Self::new();
        for (name, content) in templates {
            resolver.add(name, content);
        }
        resolver
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Resolver for MemoryResolver {
    fn resolve(&self, name: &str) -> MustacheResult<Option<TemplateSource>> {
        Ok(self.templates.get(name).cloned())
    }
}

/// Resolver that loads templates from directories on disk.
///
/// Each namespace has a stack of directories; the most recently added
/// directory is searched first. A name `ns::page` is searched in namespace
/// `ns`, then in the default namespace. The configured separator in a name
/// maps to a path separator, and the suffix is appended:
///
/// ```text
/// "blog.post" with separator "." and suffix ".mustache" -> blog/post.mustache
/// ```
#[derive(Debug, Clone)]
pub struct FileSystemResolver {
    paths: HashMap<String, Vec<PathBuf>>,
    separator: String,
    suffix: String,
}

impl Default for FileSystemResolver {
    fn default() -> Self {
        Self {
            paths: HashMap::new(),
            separator: "/".to_string(),
            suffix: DEFAULT_SUFFIX.to_string(),
        }
    }
}

impl FileSystemResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory to the default namespace.
    ///
    /// Fails with [`MustacheError::InvalidTemplatePath`] if `path` is not a
    /// directory.
    pub fn add_path(&mut self, path: impl AsRef<Path>) -> MustacheResult<&mut Self> {
        self.add_namespaced_path(DEFAULT_NAMESPACE, path)
    }

    /// Add a directory to `namespace`.
    pub fn add_namespaced_path(
        &mut self,
        namespace: &str,
        path: impl AsRef<Path>,
    ) -> MustacheResult<&mut Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(MustacheError::InvalidTemplatePath {
                path: path.display().to_string(),
            });
        }
        self.paths
            .entry(namespace.to_string())
            .or_default()
            .push(path.to_path_buf());
        Ok(self)
    }

    /// Set the separator used between path segments in template names.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Set the template file suffix. A leading dot is optional.
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.suffix = format!(".{}", suffix.trim_start_matches('.'));
        self
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Namespaces with at least one directory.
    pub fn namespaces(&self) -> Vec<&str> {
        let mut namespaces: Vec<&str> = self
            .paths
            .iter()
            .filter(|(_, dirs)| !dirs.is_empty())
            .map(|(ns, _)| ns.as_str())
            .collect();
        namespaces.sort_unstable();
        namespaces
    }

    /// Relative file path for a template name within a namespace.
    ///
    /// Names must stay inside the template directories: parent (`..`),
    /// root and prefix components are rejected.
    fn relative_path(&self, template: &str) -> MustacheResult<PathBuf> {
        let mut path: PathBuf = if self.separator.is_empty() {
            PathBuf::from(template)
        } else {
            template.split(self.separator.as_str()).collect()
        };
        if path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(MustacheError::InvalidTemplatePath {
                path: template.to_string(),
            });
        }
        let file_name = path
            .file_name()
            .map(|f| format!("{}{}", f.to_string_lossy(), self.suffix))
            .unwrap_or_default();
        path.set_file_name(file_name);
        Ok(path)
    }

    fn find_in(&self, namespace: &str, relative: &Path) -> Option<PathBuf> {
        self.paths
            .get(namespace)?
            .iter()
            .rev()
            .map(|dir| dir.join(relative))
            .find(|candidate| candidate.is_file())
    }
}

impl Resolver for FileSystemResolver {
    fn resolve(&self, name: &str) -> MustacheResult<Option<TemplateSource>> {
        let (namespace, template) = match name.split_once("::") {
            Some((ns, template)) if !ns.is_empty() => (ns, template),
            _ => (DEFAULT_NAMESPACE, name),
        };
        if template.is_empty() {
            return Ok(None);
        }

        let relative = self.relative_path(template)?;
        let found = self.find_in(namespace, &relative).or_else(|| {
            if namespace == DEFAULT_NAMESPACE {
                None
            } else {
                self.find_in(DEFAULT_NAMESPACE, &relative)
            }
        });
        let Some(path) = found else {
            return Ok(None);
        };

        tracing::trace!(template = name, path = %path.display(), "Loading template file");
        let bytes = std::fs::read(&path)?;
        let text = String::from_utf8(bytes).map_err(|_| MustacheError::InvalidTemplate {
            message: format!("{} is not valid UTF-8", path.display()),
        })?;
        Ok(Some(TemplateSource::Text(text)))
    }
}

/// Chain of resolvers tried in priority order.
///
/// Higher priorities are tried first; resolvers with equal priority are
/// tried in the order they were attached. The first resolver that knows a
/// name wins.
#[derive(Default)]
pub struct AggregateResolver {
    entries: Vec<(i32, Box<dyn Resolver>)>,
}

impl AggregateResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a resolver with the given priority.
    pub fn attach(&mut self, resolver: impl Resolver + 'static, priority: i32) -> &mut Self {
        // Insert after every entry with priority >= this one
        let index = self
            .entries
            .iter()
            .position(|(p, _)| *p < priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(index, (priority, Box::new(resolver)));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for AggregateResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let priorities: Vec<i32> = self.entries.iter().map(|(p, _)| *p).collect();
        f.debug_struct("AggregateResolver")
            .field("priorities", &priorities)
            .finish()
    }
}

impl Resolver for AggregateResolver {
    fn resolve(&self, name: &str) -> MustacheResult<Option<TemplateSource>> {
        for (_, resolver) in &self.entries {
            if let Some(source) = resolver.resolve(name)? {
                return Ok(Some(source));
            }
        }
        Ok(None)
    }
}
