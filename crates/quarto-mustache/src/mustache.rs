/*
 * mustache.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The template engine.
//!
//! [`Mustache`] ties the pieces together: it resolves templates by name,
//! compiles them with the lexer, caches the tokens, and renders them.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{MustacheError, MustacheResult};
use crate::escape::{DefaultEscaper, EscapeContext, Escaper};
use crate::lexer::{CompileEnv, LexScope, Lexer, Tokenize};
use crate::options::MustacheOptions;
use crate::pragma::{Pragma, PragmaRegistry};
use crate::render_context::{RenderContext, RenderHost};
use crate::renderer;
use crate::resolver::{AggregateResolver, FileSystemResolver, Resolver, TemplateSource};
use crate::token::Token;
use crate::view::View;

/// A Mustache template engine.
///
/// # Example
///
/// ```
/// use quarto_mustache::{MemoryResolver, Mustache, View};
///
/// let mut templates = MemoryResolver::new();
/// templates.add("greeting", "Hello {{planet}}!");
///
/// let engine = Mustache::new().with_resolver(templates, 0);
/// let view = View::map([("planet", "World")]);
/// assert_eq!(engine.render("greeting", &view).unwrap(), "Hello World!");
///
/// // Text containing the start delimiter is a template, not a name
/// assert_eq!(engine.render("Bye {{planet}}", &view).unwrap(), "Bye World");
/// ```
pub struct Mustache {
    lexer: Lexer,
    pragmas: PragmaRegistry,
    resolver: AggregateResolver,
    escaper: Arc<dyn Escaper>,
    options: MustacheOptions,
    cache: RwLock<HashMap<String, Arc<Vec<Token>>>>,
}

impl Mustache {
    /// An engine with default options and no resolvers.
    pub fn new() -> Self {
        Self::from_parts(MustacheOptions::default(), AggregateResolver::new())
    }

    /// An engine configured by `options`.
    ///
    /// When `options.template_paths` is non-empty a filesystem resolver over
    /// those directories is attached at priority 0.
    pub fn with_options(options: MustacheOptions) -> MustacheResult<Self> {
        Token::DelimiterSet(options.delimiters.clone())
            .validate()
            .map_err(|_| MustacheError::InvalidDelimiter {
                tag: format!("{} {}", options.delimiters.start, options.delimiters.end),
            })?;

        let mut resolver = AggregateResolver::new();
        if !options.template_paths.is_empty() {
            let mut files = FileSystemResolver::new().with_suffix(&options.suffix);
            for path in &options.template_paths {
                files.add_path(path)?;
            }
            resolver.attach(files, 0);
        }
        Ok(Self::from_parts(options, resolver))
    }

    fn from_parts(options: MustacheOptions, resolver: AggregateResolver) -> Self {
        let lexer = Lexer::new()
            .with_delimiters(options.delimiters.clone())
            .with_strip_whitespace(options.strip_whitespace);
        Self {
            lexer,
            pragmas: PragmaRegistry::new(),
            resolver,
            escaper: Arc::new(DefaultEscaper),
            options,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &MustacheOptions {
        &self.options
    }

    /// Attach a resolver with the given priority (higher is tried first).
    pub fn with_resolver(mut self, resolver: impl Resolver + 'static, priority: i32) -> Self {
        self.attach_resolver(resolver, priority);
        self
    }

    /// Attach a resolver with the given priority (higher is tried first).
    pub fn attach_resolver(
        &mut self,
        resolver: impl Resolver + 'static,
        priority: i32,
    ) -> &mut Self {
        self.resolver.attach(resolver, priority);
        self
    }

    /// Replace the escaper.
    pub fn with_escaper(mut self, escaper: impl Escaper + 'static) -> Self {
        self.set_escaper(escaper);
        self
    }

    pub fn set_escaper(&mut self, escaper: impl Escaper + 'static) {
        self.escaper = Arc::new(escaper);
    }

    /// Register a pragma.
    pub fn add_pragma(&mut self, pragma: impl Pragma + 'static) -> MustacheResult<&mut Self> {
        self.pragmas.add(pragma)?;
        Ok(self)
    }

    pub fn pragmas(&self) -> &PragmaRegistry {
        &self.pragmas
    }

    pub fn pragmas_mut(&mut self) -> &mut PragmaRegistry {
        &mut self.pragmas
    }

    /// Toggle whitespace stripping for templates compiled from now on.
    ///
    /// Tokens already cached are kept as they are.
    pub fn set_strip_whitespace(&mut self, strip: bool) {
        self.lexer.set_strip_whitespace(strip);
        self.options.strip_whitespace = strip;
    }

    pub fn strip_whitespace(&self) -> bool {
        self.lexer.strip_whitespace()
    }

    /// Render a template name or literal template text against `view`.
    pub fn render(&self, template: &str, view: &View) -> MustacheResult<String> {
        self.render_with_partials(template, view, std::iter::empty::<(String, String)>())
    }

    /// Render with caller-supplied partial aliases.
    ///
    /// Each alias maps a partial name used by the template to a template
    /// name or literal text. Aliases are tokenized and cached under the alias
    /// name before the template itself is compiled.
    pub fn render_with_partials<I, K, V>(
        &self,
        template: &str,
        view: &View,
        partials: I,
    ) -> MustacheResult<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut aliases: HashMap<String, Arc<Vec<Token>>> = HashMap::new();
        for (alias, source) in partials {
            let alias = alias.into();
            if alias.trim().is_empty() || alias.contains(&self.options.delimiters.start) {
                return Err(MustacheError::InvalidPartials {
                    message: format!("invalid partial alias {alias:?}"),
                });
            }
            let tokens = self.tokenize(source.as_ref())?;
            self.cache_insert(alias.clone(), tokens.clone());
            aliases.insert(alias, tokens);
        }

        let tokens = self.tokenize(template)?;
        tracing::debug!(
            template = self.label(template),
            tokens = tokens.len(),
            partials = aliases.len(),
            "Rendering template"
        );

        let ctx = RenderContext::new(self, &aliases)
            .with_max_partial_depth(self.options.max_partial_depth);
        renderer::render(&tokens, view, &ctx)
    }

    /// Tokens for a template name or literal template text.
    ///
    /// Input containing the start delimiter is compiled as template text and
    /// never cached. Anything else is a template name: served from the cache,
    /// or resolved, compiled and cached. Template text without any tags must
    /// therefore be registered under a name to be used.
    pub fn tokenize(&self, template: &str) -> MustacheResult<Arc<Vec<Token>>> {
        if template.contains(&self.options.delimiters.start) {
            let tokens = self.lexer.compile(
                &self.compile_env(),
                template,
                None,
                &[],
                &LexScope::new(),
            )?;
            return Ok(Arc::new(tokens));
        }
        self.tokenize_named(template, &LexScope::new())
    }

    /// A snapshot of every cached token sequence, by template name.
    pub fn all_tokens(&self) -> HashMap<String, Vec<Token>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, tokens)| (name.clone(), tokens.as_ref().clone()))
            .collect()
    }

    /// Replace the token cache, e.g. with a snapshot from [`Mustache::all_tokens`].
    pub fn restore_tokens(&self, tokens: HashMap<String, Vec<Token>>) {
        let restored: HashMap<String, Arc<Vec<Token>>> = tokens
            .into_iter()
            .map(|(name, tokens)| (name, Arc::new(tokens)))
            .collect();
        tracing::debug!(templates = restored.len(), "Restored token cache");
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = restored;
    }

    /// Drop every cached token sequence.
    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn compile_env(&self) -> CompileEnv<'_> {
        CompileEnv {
            pragmas: &self.pragmas,
            tokenizer: self,
        }
    }

    /// Tokens for a named template.
    ///
    /// Templates compiled under inheritance overrides bypass the cache in
    /// both directions.
    fn tokenize_named(&self, name: &str, scope: &LexScope) -> MustacheResult<Arc<Vec<Token>>> {
        let cacheable = !scope.is_inheriting();
        if cacheable {
            if let Some(tokens) = self.cached(name) {
                tracing::trace!(template = name, "Token cache hit");
                return Ok(tokens);
            }
        }

        let source = self
            .resolver
            .resolve(name)?
            .ok_or_else(|| MustacheError::TemplateNotFound {
                name: name.to_string(),
            })?;
        let tokens = match source {
            TemplateSource::Text(text) => {
                tracing::debug!(template = name, cacheable, "Compiling template");
                self.lexer.compile(
                    &self.compile_env(),
                    &text,
                    Some(name),
                    &[],
                    &scope.enter_template(name),
                )?
            }
            TemplateSource::Tokens(tokens) => tokens,
        };

        let tokens = Arc::new(tokens);
        if cacheable {
            self.cache_insert(name.to_string(), tokens.clone());
        }
        Ok(tokens)
    }

    fn cached(&self, name: &str) -> Option<Arc<Vec<Token>>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn cache_insert(&self, name: String, tokens: Arc<Vec<Token>>) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, tokens);
    }

    /// Name for log output: the template name, or a marker for literal text.
    fn label<'a>(&self, template: &'a str) -> &'a str {
        if template.contains(&self.options.delimiters.start) {
            "<text>"
        } else {
            template
        }
    }
}

impl Default for Mustache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Mustache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached = self
            .cache
            .read()
            .map_or(0, |cache| cache.len());
        f.debug_struct("Mustache")
            .field("options", &self.options)
            .field("pragmas", &self.pragmas)
            .field("resolver", &self.resolver)
            .field("cached_templates", &cached)
            .finish()
    }
}

impl Tokenize for Mustache {
    fn tokenize_scoped(&self, name: &str, scope: &LexScope) -> MustacheResult<Vec<Token>> {
        Ok(self.tokenize_named(name, scope)?.as_ref().clone())
    }
}

impl RenderHost for Mustache {
    fn pragmas(&self) -> &PragmaRegistry {
        &self.pragmas
    }

    fn escaper(&self) -> &dyn Escaper {
        self.escaper.as_ref()
    }

    fn default_escape(&self) -> EscapeContext {
        self.options.escape
    }

    fn tokenize(&self, name: &str) -> MustacheResult<Arc<Vec<Token>>> {
        self.tokenize_named(name, &LexScope::new())
    }

    fn compile_fragment(&self, text: &str, pragmas: &[String]) -> MustacheResult<Vec<Token>> {
        self.lexer
            .compile(&self.compile_env(), text, None, pragmas, &LexScope::new())
    }

    fn render_template(&self, template: &str, view: &View) -> MustacheResult<String> {
        self.render(template, view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MemoryResolver;
    use pretty_assertions::assert_eq;

    fn engine(templates: &[(&str, &str)]) -> Mustache {
        Mustache::new().with_resolver(MemoryResolver::with_templates(templates.iter().copied()), 0)
    }

    #[test]
    fn test_render_literal_and_named() {
        let engine = engine(&[("hello", "Hello {{name}}")]);
        let view = View::map([("name", "you")]);
        assert_eq!(engine.render("hello", &view).unwrap(), "Hello you");
        assert_eq!(engine.render("Hi {{name}}", &view).unwrap(), "Hi you");
    }

    #[test]
    fn test_template_not_found() {
        let engine = Mustache::new();
        assert!(matches!(
            engine.render("missing", &View::Null),
            Err(MustacheError::TemplateNotFound { name }) if name == "missing"
        ));
    }

    #[test]
    fn test_named_templates_are_cached_text_is_not() {
        let engine = engine(&[("a", "A{{x}}")]);
        engine.render("a", &View::Null).unwrap();
        engine.render("B{{x}}", &View::Null).unwrap();

        let cached = engine.all_tokens();
        assert_eq!(cached.len(), 1);
        assert!(cached.contains_key("a"));
    }

    #[test]
    fn test_restore_tokens_serves_without_resolver() {
        let source = engine(&[("page", "<p>{{body}}</p>")]);
        source.tokenize("page").unwrap();
        let snapshot = source.all_tokens();

        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: HashMap<String, Vec<Token>> = serde_json::from_str(&json).unwrap();

        let target = Mustache::new();
        target.restore_tokens(restored);
        let view = View::map([("body", "text")]);
        assert_eq!(target.render("page", &view).unwrap(), "<p>text</p>");

        target.clear_cache();
        assert!(target.all_tokens().is_empty());
    }

    #[test]
    fn test_invalid_partial_alias() {
        let engine = Mustache::new();
        let result = engine.render_with_partials("{{>p}}", &View::Null, [("{{bad", "x{{y}}")]);
        assert!(matches!(result, Err(MustacheError::InvalidPartials { .. })));

        let result = engine.render_with_partials("{{>p}}", &View::Null, [("", "x{{y}}")]);
        assert!(matches!(result, Err(MustacheError::InvalidPartials { .. })));
    }

    #[test]
    fn test_invalid_default_delimiters() {
        let options = MustacheOptions::new().with_delimiters("", "}}");
        assert!(matches!(
            Mustache::with_options(options),
            Err(MustacheError::InvalidDelimiter { .. })
        ));
    }

    #[test]
    fn test_custom_default_delimiters() {
        let engine =
            Mustache::with_options(MustacheOptions::new().with_delimiters("<%", "%>")).unwrap();
        let view = View::map([("name", "x")]);
        assert_eq!(engine.render("{{name}} <% name %>", &view).unwrap(), "{{name}} x");
    }

    #[test]
    fn test_custom_escaper() {
        let engine = Mustache::new().with_escaper(|value: &str, _ctx: EscapeContext| {
            value.replace('<', "[lt]")
        });
        let view = View::map([("v", "<b>")]);
        assert_eq!(engine.render("{{v}}", &view).unwrap(), "[lt]b>");
    }

    #[test]
    fn test_pre_tokenized_template() {
        let mut templates = MemoryResolver::new();
        templates.add_tokens("tokens", vec![Token::content("pre "), Token::variable("x")]);
        let engine = Mustache::new().with_resolver(templates, 0);
        let view = View::map([("x", "compiled")]);
        assert_eq!(engine.render("tokens", &view).unwrap(), "pre compiled");
    }
}
