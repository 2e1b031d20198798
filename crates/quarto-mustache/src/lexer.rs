/*
 * lexer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template lexer.
//!
//! Compilation runs in two passes over a template:
//!
//! 1. A scanner turns the text into a flat token list. Sections,
//!    placeholders and inheritance blocks are captured whole, up to their
//!    balanced closing tag, as raw text.
//! 2. A resolution pass compiles those captured bodies recursively, inlines
//!    partials, applies inheritance overrides, and strips the whitespace
//!    that block tags leave behind on their own lines.
//!
//! Pragmas in scope get to rewrite each token as it is produced.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{MustacheError, MustacheResult};
use crate::pragma::PragmaRegistry;
use crate::token::{
    Block, ChildRef, Comment, Content, Delimiters, PartialRef, PragmaDecl, PragmaOptions, Token,
};

static VARIABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^([a-z.][a-z0-9_?.-]*|[.])$").unwrap());

static DELIMITER_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^=(\S+)\s+(\S+)=$").unwrap());

static PRAGMA_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(?P<pragma>[A-Z][A-Z0-9_-]*)(?:\s+(?P<options>.*))?$").unwrap()
});

static LEADING_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*?(\r\n?|\n)").unwrap());

static TRAILING_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\r\n?|\n)\s+$").unwrap());

/// Source of compiled templates by name, used to inline partials and
/// inheritance parents.
pub trait Tokenize {
    /// Tokens for the template `name`, compiled under `scope`.
    fn tokenize_scoped(&self, name: &str, scope: &LexScope) -> MustacheResult<Vec<Token>>;
}

/// State that spans nested compilations: inheritance overrides and the
/// stack of templates being compiled.
#[derive(Debug, Clone, Default)]
pub struct LexScope {
    /// Placeholder overrides, most derived child first.
    overrides: Vec<Arc<HashMap<String, Vec<Token>>>>,
    /// Names of templates whose compilation is in progress.
    templates: Vec<String>,
}

impl LexScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether placeholder overrides are in effect. Templates compiled under
    /// overrides must not be cached.
    pub fn is_inheriting(&self) -> bool {
        !self.overrides.is_empty()
    }

    /// Whether `name` is already being compiled further up the stack.
    pub fn is_compiling(&self, name: &str) -> bool {
        self.templates.iter().any(|t| t == name)
    }

    /// This scope with `name` pushed onto the compile stack.
    pub fn enter_template(&self, name: &str) -> LexScope {
        let mut scope = self.clone();
        scope.templates.push(name.to_string());
        scope
    }

    /// This scope with an override level added below the existing ones.
    ///
    /// Children are compiled before their parents, so existing levels belong
    /// to more derived templates and keep precedence.
    fn with_overrides(&self, overrides: HashMap<String, Vec<Token>>) -> LexScope {
        let mut scope = self.clone();
        scope.overrides.push(Arc::new(overrides));
        scope
    }

    /// The override for placeholder `name`, from the most derived child that
    /// supplies one.
    fn placeholder(&self, name: &str) -> Option<&Vec<Token>> {
        self.overrides.iter().find_map(|level| level.get(name))
    }
}

/// Engine services needed while compiling.
pub struct CompileEnv<'a> {
    pub pragmas: &'a PragmaRegistry,
    pub tokenizer: &'a dyn Tokenize,
}

/// Where a token was scanned: the delimiters and the pragma scope in effect.
/// Block bodies are compiled with these.
#[derive(Debug, Clone)]
struct Origin {
    delimiters: Delimiters,
    pragmas: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Content,
    Tag,
    Section,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Section,
    Inverted,
    Placeholder,
    Child,
}

/// A block whose closing tag has not been found yet.
#[derive(Debug)]
struct OpenBlock {
    kind: BlockKind,
    name: String,
    body_start: usize,
    origin: Origin,
}

/// The Mustache lexer.
#[derive(Debug, Clone)]
pub struct Lexer {
    strip_whitespace: bool,
    delimiters: Delimiters,
}

impl Default for Lexer {
    fn default() -> Self {
        Self {
            strip_whitespace: true,
            delimiters: Delimiters::default(),
        }
    }
}

impl Lexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delimiters every template starts with.
    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    pub fn with_strip_whitespace(mut self, strip: bool) -> Self {
        self.strip_whitespace = strip;
        self
    }

    pub fn set_strip_whitespace(&mut self, strip: bool) {
        self.strip_whitespace = strip;
    }

    pub fn strip_whitespace(&self) -> bool {
        self.strip_whitespace
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Compile template text to tokens.
    ///
    /// `template_name` is the name the text was resolved from, if any; a
    /// partial naming it is left for render time. `scoped_pragmas` are the
    /// pragma names already active where the text appears.
    pub fn compile(
        &self,
        env: &CompileEnv<'_>,
        source: &str,
        template_name: Option<&str>,
        scoped_pragmas: &[String],
        scope: &LexScope,
    ) -> MustacheResult<Vec<Token>> {
        let tokens = self.compile_level(
            env,
            source,
            template_name,
            &self.delimiters,
            scoped_pragmas,
            scope,
        )?;
        tracing::trace!(
            template = template_name.unwrap_or("<text>"),
            tokens = tokens.len(),
            inheriting = scope.is_inheriting(),
            "Compiled template"
        );
        Ok(tokens)
    }

    fn compile_level(
        &self,
        env: &CompileEnv<'_>,
        source: &str,
        template_name: Option<&str>,
        delimiters: &Delimiters,
        scoped_pragmas: &[String],
        scope: &LexScope,
    ) -> MustacheResult<Vec<Token>> {
        let (mut tokens, origins, pragmas) = self.scan(env, source, delimiters, scoped_pragmas)?;

        let mut splices: Vec<(usize, Vec<Token>)> = Vec::new();
        for index in 0..tokens.len() {
            let mut strip_siblings = false;
            match &mut tokens[index] {
                Token::Partial(partial) => {
                    if partial.tokens.is_some()
                        || Some(partial.name.as_str()) == template_name
                        || scope.is_compiling(&partial.name)
                    {
                        continue;
                    }
                    let resolved = env.tokenizer.tokenize_scoped(&partial.name, scope)?;
                    partial.tokens = Some(resolved);
                }

                Token::Child(child) => {
                    let origin = &origins[index];
                    let body = self.compile_level(
                        env,
                        &child.template,
                        template_name,
                        &origin.delimiters,
                        &pragmas[..origin.pragmas],
                        scope,
                    )?;
                    let overrides: HashMap<String, Vec<Token>> = body
                        .into_iter()
                        .filter_map(|token| match token {
                            Token::Placeholder(block) => Some((block.name, block.content)),
                            _ => None,
                        })
                        .collect();
                    tracing::trace!(
                        parent = %child.name,
                        overrides = overrides.len(),
                        "Resolving inheritance parent"
                    );
                    let parent = env
                        .tokenizer
                        .tokenize_scoped(&child.name, &scope.with_overrides(overrides))?;
                    splices.push((index, parent));
                }

                Token::Placeholder(block) => match scope.placeholder(&block.name) {
                    Some(content) => block.content = content.clone(),
                    None => {
                        let origin = &origins[index];
                        self.compile_block(env, block, template_name, origin, &pragmas, scope)?;
                        strip_siblings = self.strip_whitespace;
                    }
                },

                Token::Section(block) | Token::SectionInvert(block) => {
                    let origin = &origins[index];
                    self.compile_block(env, block, template_name, origin, &pragmas, scope)?;
                    strip_siblings = self.strip_whitespace;
                }

                Token::DelimiterSet(_) => strip_siblings = self.strip_whitespace,

                _ => {}
            }

            if strip_siblings {
                strip_around(&mut tokens, index);
            }
        }

        for (index, parent) in splices.into_iter().rev() {
            tokens.splice(index..=index, parent);
        }

        Ok(tokens)
    }

    /// Compile a block body with the delimiters and pragma scope in effect
    /// where the block was opened.
    fn compile_block(
        &self,
        env: &CompileEnv<'_>,
        block: &mut Block,
        template_name: Option<&str>,
        origin: &Origin,
        pragmas: &[String],
        scope: &LexScope,
    ) -> MustacheResult<()> {
        block.content = self.compile_level(
            env,
            &block.template,
            template_name,
            &origin.delimiters,
            &pragmas[..origin.pragmas],
            scope,
        )?;
        if self.strip_whitespace {
            if let Some(Token::Content(first)) = block.content.first_mut() {
                strip_leading_newline(first);
            }
        }
        Ok(())
    }

    /// First pass: scan `source` into a flat token list.
    ///
    /// Returns the tokens, the origin of each token, and the pragma scope at
    /// the end of the text (each origin records how much of it applied).
    fn scan(
        &self,
        env: &CompileEnv<'_>,
        source: &str,
        delimiters: &Delimiters,
        scoped_pragmas: &[String],
    ) -> MustacheResult<(Vec<Token>, Vec<Origin>, Vec<String>)> {
        let mut delims = delimiters.clone();
        let mut pragmas: Vec<String> = scoped_pragmas.to_vec();
        let mut tokens: Vec<Token> = Vec::new();
        let mut origins: Vec<Origin> = Vec::new();

        let mut state = State::Content;
        let mut open: Option<OpenBlock> = None;
        let mut pos = 0;
        let mut tag_start = 0;

        while state != State::Done {
            match state {
                State::Content => match source[pos..].find(&delims.start) {
                    Some(offset) => {
                        let text = &source[pos..pos + offset];
                        if !text.is_empty() {
                            tokens.push(parse_via_pragmas(
                                env.pragmas,
                                &pragmas,
                                Token::content(text),
                            )?);
                            origins.push(origin(&delims, &pragmas));
                        }
                        pos += offset + delims.start.len();
                        tag_start = pos;
                        state = State::Tag;
                    }
                    None => {
                        let text = &source[pos..];
                        if !text.is_empty() {
                            tokens.push(parse_via_pragmas(
                                env.pragmas,
                                &pragmas,
                                Token::content(text),
                            )?);
                            origins.push(origin(&delims, &pragmas));
                        }
                        state = State::Done;
                    }
                },

                State::Tag => {
                    let Some(offset) = source[pos..].find(&delims.end) else {
                        return Err(MustacheError::UnbalancedTag);
                    };
                    let tag_end = pos + offset;
                    let after = tag_end + delims.end.len();
                    let tag = &source[tag_start..tag_end];
                    let data = tag.trim_start();
                    let Some(sigil) = data.chars().next() else {
                        return Err(MustacheError::InvalidVariableName {
                            name: String::new(),
                        });
                    };
                    let rest = &data[sigil.len_utf8()..];
                    let mut declared: Option<String> = None;

                    let token = match sigil {
                        '#' | '^' | '$' | '<' => {
                            let kind = match sigil {
                                '#' => BlockKind::Section,
                                '^' => BlockKind::Inverted,
                                '$' => BlockKind::Placeholder,
                                _ => BlockKind::Child,
                            };
                            open = Some(OpenBlock {
                                kind,
                                name: rest.trim().to_string(),
                                body_start: after,
                                origin: origin(&delims, &pragmas),
                            });
                            pos = after;
                            state = State::Section;
                            continue;
                        }
                        '{' => {
                            // `{{{name}}}`: the closing brace follows the end delimiter
                            if !source[after..].starts_with('}') {
                                pos = after;
                                continue;
                            }
                            pos = after + 1;
                            Token::variable_raw(rest.trim())
                        }
                        '&' => Token::variable_raw(rest.trim()),
                        '!' => Token::Comment(Comment {
                            text: rest.to_string(),
                        }),
                        '>' => Token::Partial(PartialRef {
                            name: rest.trim().to_string(),
                            tokens: None,
                        }),
                        '=' => {
                            let Some(caps) = DELIMITER_TAG.captures(data.trim_end()) else {
                                return Err(MustacheError::InvalidDelimiter {
                                    tag: tag.to_string(),
                                });
                            };
                            delims = Delimiters::new(&caps[1], &caps[2]);
                            Token::DelimiterSet(delims.clone())
                        }
                        '%' => {
                            let decl = parse_pragma_tag(rest)?;
                            declared = Some(decl.name.clone());
                            Token::Pragma(decl)
                        }
                        _ => Token::variable(data.trim_end()),
                    };

                    let token = parse_via_pragmas(env.pragmas, &pragmas, token)?;
                    if let Token::Variable(variable) | Token::VariableRaw(variable) = &token {
                        if !VARIABLE_NAME.is_match(&variable.name) {
                            return Err(MustacheError::InvalidVariableName {
                                name: variable.name.clone(),
                            });
                        }
                    }
                    // A declaration is in scope only for the tokens after it
                    if let Some(name) = declared {
                        pragmas.push(name);
                    }
                    tokens.push(token);
                    origins.push(origin(&delims, &pragmas));

                    if pos < after {
                        pos = after;
                    }
                    state = State::Content;
                }

                State::Section => {
                    let Some(block) = open.take() else {
                        return Err(MustacheError::InvalidState {
                            message: "section state without an open section".to_string(),
                        });
                    };
                    let (body_end, close_end) =
                        find_balanced_close(source, &block, &block.origin.delimiters)?;
                    let template = source[block.body_start..body_end].to_string();

                    let token = match block.kind {
                        BlockKind::Section => Token::Section(new_block(block.name, template)),
                        BlockKind::Inverted => {
                            Token::SectionInvert(new_block(block.name, template))
                        }
                        BlockKind::Placeholder => {
                            Token::Placeholder(new_block(block.name, template))
                        }
                        BlockKind::Child => Token::Child(ChildRef {
                            name: block.name,
                            template,
                        }),
                    };
                    tokens.push(parse_via_pragmas(env.pragmas, &pragmas, token)?);
                    origins.push(block.origin);

                    pos = close_end;
                    state = State::Content;
                }

                State::Done => {}
            }
        }

        Ok((tokens, origins, pragmas))
    }
}

fn origin(delimiters: &Delimiters, pragmas: &[String]) -> Origin {
    Origin {
        delimiters: delimiters.clone(),
        pragmas: pragmas.len(),
    }
}

fn new_block(name: String, template: String) -> Block {
    Block {
        name,
        template,
        content: Vec::new(),
    }
}

/// Find the closing tag that balances `block`.
///
/// Every opening tag with the same name (any of `#`, `^`, `$`, `<`) inside
/// the body must be closed first. Returns the end of the body and the end of
/// the closing tag.
fn find_balanced_close(
    source: &str,
    block: &OpenBlock,
    delimiters: &Delimiters,
) -> MustacheResult<(usize, usize)> {
    let unbalanced = || MustacheError::UnbalancedSection {
        name: block.name.clone(),
    };
    let pattern = format!(
        r"{}\s*([#^$</])\s*{}\s*{}",
        regex::escape(&delimiters.start),
        regex::escape(&block.name),
        regex::escape(&delimiters.end)
    );
    let tags = Regex::new(&pattern).map_err(|_| unbalanced())?;

    let mut depth = 0usize;
    for caps in tags.captures_iter(&source[block.body_start..]) {
        let (Some(tag), Some(sigil)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if sigil.as_str() != "/" {
            depth += 1;
        } else if depth == 0 {
            return Ok((block.body_start + tag.start(), block.body_start + tag.end()));
        } else {
            depth -= 1;
        }
    }
    Err(unbalanced())
}

/// Parse the body of a `{{%NAME options}}` tag.
fn parse_pragma_tag(data: &str) -> MustacheResult<PragmaDecl> {
    let data = data.trim();
    let Some(caps) = PRAGMA_TAG.captures(data) else {
        return Err(MustacheError::InvalidPragmaName {
            tag: data.to_string(),
        });
    };

    let mut options = PragmaOptions::new();
    if let Some(raw) = caps.name("options") {
        for piece in raw.as_str().split_whitespace() {
            match piece.split_once('=') {
                Some((key, value)) => options.insert(key.to_string(), Some(value.to_string())),
                None => options.insert(piece.to_string(), None),
            };
        }
    }

    Ok(PragmaDecl {
        name: caps["pragma"].to_string(),
        options,
    })
}

/// Let each in-scope pragma that handles the token's kind rewrite it, in
/// registration order, validating after every rewrite.
fn parse_via_pragmas(
    registry: &PragmaRegistry,
    scope: &[String],
    token: Token,
) -> MustacheResult<Token> {
    let kind = token.kind();
    let mut token = token;
    for pragma in registry.handlers(kind, scope) {
        token = pragma.parse(token)?;
        token.validate()?;
    }
    Ok(token)
}

/// Strip the whitespace a standalone block tag leaves on its line: trailing
/// whitespace after the last newline of the previous token, and leading
/// whitespace through the first newline of the next token.
fn strip_around(tokens: &mut [Token], index: usize) {
    if index > 0 {
        if let Token::Content(prev) = &mut tokens[index - 1] {
            strip_trailing_whitespace(prev);
        }
    }
    if let Some(Token::Content(next)) = tokens.get_mut(index + 1) {
        strip_leading_newline(next);
    }
}

fn strip_leading_newline(content: &mut Content) {
    let stripped = LEADING_NEWLINE.replace(&content.text, "").into_owned();
    replace_text(content, stripped);
}

fn strip_trailing_whitespace(content: &mut Content) {
    let stripped = TRAILING_NEWLINE.replace(&content.text, "${1}").into_owned();
    replace_text(content, stripped);
}

fn replace_text(content: &mut Content, text: String) {
    if text != content.text {
        let original = std::mem::replace(&mut content.text, text);
        content.original.get_or_insert(original);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Content, TokenKind, Variable};
    use pretty_assertions::assert_eq;

    /// Resolves nothing; every partial stays unresolved.
    struct NoTemplates;

    impl Tokenize for NoTemplates {
        fn tokenize_scoped(&self, name: &str, _scope: &LexScope) -> MustacheResult<Vec<Token>> {
            Err(MustacheError::TemplateNotFound {
                name: name.to_string(),
            })
        }
    }

    fn lex(source: &str) -> MustacheResult<Vec<Token>> {
        lex_with(&PragmaRegistry::new(), source)
    }

    fn lex_with(pragmas: &PragmaRegistry, source: &str) -> MustacheResult<Vec<Token>> {
        let env = CompileEnv {
            pragmas,
            tokenizer: &NoTemplates,
        };
        Lexer::new().compile(&env, source, None, &[], &LexScope::new())
    }

    fn text(token: &Token) -> &str {
        match token {
            Token::Content(Content { text, .. }) => text,
            other => panic!("expected content, got {other:?}"),
        }
    }

    #[test]
    fn test_content_and_variables() {
        let tokens = lex("Hello {{planet}}! {{{raw}}} {{&amp}}").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::content("Hello "),
                Token::variable("planet"),
                Token::content("! "),
                Token::variable_raw("raw"),
                Token::content(" "),
                Token::variable_raw("amp"),
            ]
        );
    }

    #[test]
    fn test_empty_template() {
        assert_eq!(lex("").unwrap(), Vec::<Token>::new());
    }

    #[test]
    fn test_whitespace_in_tags_is_ignored() {
        let tokens = lex("{{ name }}{{# list }}x{{/ list }}").unwrap();
        assert_eq!(tokens[0], Token::variable("name"));
        assert!(matches!(&tokens[1], Token::Section(b) if b.name == "list" && b.template == "x"));
    }

    #[test]
    fn test_comment() {
        let tokens = lex("a{{! note }}b").unwrap();
        assert_eq!(
            tokens[1],
            Token::Comment(Comment {
                text: " note ".to_string()
            })
        );
    }

    #[test]
    fn test_nested_section_same_name() {
        let tokens = lex("{{#a}}1{{#a}}2{{/a}}3{{/a}}4").unwrap();
        let Token::Section(outer) = &tokens[0] else {
            panic!("expected section");
        };
        assert_eq!(outer.template, "1{{#a}}2{{/a}}3");
        assert_eq!(outer.content.len(), 3);
        assert!(matches!(&outer.content[1], Token::Section(inner) if inner.template == "2"));
        assert_eq!(text(&tokens[1]), "4");
    }

    #[test]
    fn test_delimiter_change() {
        let tokens = lex("{{=<% %>=}}<% name %> {{literal}}").unwrap();
        assert_eq!(tokens[0], Token::DelimiterSet(Delimiters::new("<%", "%>")));
        assert_eq!(tokens[1], Token::variable("name"));
        assert_eq!(text(&tokens[2]), " {{literal}}");
    }

    #[test]
    fn test_section_keeps_delimiters_of_its_origin() {
        let tokens = lex("{{=<% %>=}}<%#list%><%item%><%/list%>").unwrap();
        let Token::Section(block) = &tokens[1] else {
            panic!("expected section");
        };
        assert_eq!(block.content, vec![Token::variable("item")]);
    }

    #[test]
    fn test_pragma_declaration() {
        let tokens = lex("{{%IMPLICIT-ITERATOR iterator=item flag}}").unwrap();
        let Token::Pragma(decl) = &tokens[0] else {
            panic!("expected pragma");
        };
        assert_eq!(decl.name, "IMPLICIT-ITERATOR");
        assert_eq!(decl.options["iterator"].as_deref(), Some("item"));
        assert_eq!(decl.options["flag"], None);
    }

    #[test]
    fn test_partial_left_unresolved_for_self() {
        let env = CompileEnv {
            pragmas: &PragmaRegistry::new(),
            tokenizer: &NoTemplates,
        };
        let tokens = Lexer::new()
            .compile(&env, "{{>node}}", Some("node"), &[], &LexScope::new())
            .unwrap();
        assert_eq!(
            tokens,
            vec![Token::Partial(PartialRef {
                name: "node".to_string(),
                tokens: None
            })]
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(lex("{{name"), Err(MustacheError::UnbalancedTag)));
        assert!(matches!(
            lex("{{#a}}never closed"),
            Err(MustacheError::UnbalancedSection { name }) if name == "a"
        ));
        assert!(matches!(
            lex("{{1bad}}"),
            Err(MustacheError::InvalidVariableName { name }) if name == "1bad"
        ));
        assert!(matches!(
            lex("{{=<%=}}"),
            Err(MustacheError::InvalidDelimiter { .. })
        ));
        assert!(matches!(
            lex("{{%lower}}"),
            Err(MustacheError::InvalidPragmaName { .. })
        ));
        assert!(matches!(
            lex("{{}}"),
            Err(MustacheError::InvalidVariableName { .. })
        ));
    }

    #[test]
    fn test_strip_whitespace_around_sections() {
        let tokens = lex("<ul>\n  {{#items}}\n  <li>{{.}}</li>\n  {{/items}}\n</ul>").unwrap();
        assert_eq!(text(&tokens[0]), "<ul>\n");
        let Token::Section(block) = &tokens[1] else {
            panic!("expected section");
        };
        assert_eq!(text(&block.content[0]), "  <li>");
        // Only the first child of a block is stripped
        assert_eq!(text(&block.content[2]), "</li>\n  ");
        assert_eq!(text(&tokens[2]), "</ul>");

        let Token::Content(first) = &tokens[0] else {
            unreachable!()
        };
        assert_eq!(first.original.as_deref(), Some("<ul>\n  "));
    }

    #[test]
    fn test_strip_whitespace_disabled() {
        let env = CompileEnv {
            pragmas: &PragmaRegistry::new(),
            tokenizer: &NoTemplates,
        };
        let tokens = Lexer::new()
            .with_strip_whitespace(false)
            .compile(&env, "a\n{{#s}}\nb\n{{/s}}\n", None, &[], &LexScope::new())
            .unwrap();
        assert_eq!(text(&tokens[0]), "a\n");
        assert_eq!(text(&tokens[2]), "\n");
    }

    #[test]
    fn test_contextual_escape_rewrites_in_scope_only() {
        let mut pragmas = PragmaRegistry::new();
        pragmas.add(crate::pragma::ContextualEscape).unwrap();

        let tokens = lex_with(&pragmas, "{{%CONTEXTUAL-ESCAPE}}{{title|attr}}").unwrap();
        assert_eq!(
            tokens[1],
            Token::Variable(Variable {
                name: "title".to_string(),
                context: Some("attr".to_string()),
            })
        );

        // Without the declaration the suffix is not a valid name
        assert!(matches!(
            lex_with(&pragmas, "{{title|attr}}"),
            Err(MustacheError::InvalidVariableName { .. })
        ));
    }

    #[test]
    fn test_pragma_scope_reaches_nested_sections() {
        let mut pragmas = PragmaRegistry::new();
        pragmas.add(crate::pragma::ContextualEscape).unwrap();

        let tokens = lex_with(&pragmas, "{{%CONTEXTUAL-ESCAPE}}{{#a}}{{x|js}}{{/a}}").unwrap();
        let Token::Section(block) = &tokens[1] else {
            panic!("expected section");
        };
        assert!(matches!(&block.content[0], Token::Variable(v) if v.context.as_deref() == Some("js")));
    }

    #[test]
    fn test_pragma_declared_after_section_does_not_apply_inside() {
        let mut pragmas = PragmaRegistry::new();
        pragmas.add(crate::pragma::ContextualEscape).unwrap();

        let result = lex_with(&pragmas, "{{#a}}{{x|js}}{{/a}}{{%CONTEXTUAL-ESCAPE}}");
        assert!(matches!(
            result,
            Err(MustacheError::InvalidVariableName { .. })
        ));
    }

    /// Test pragma whose lex-time rewrite is chosen per instance.
    struct Rewrite {
        name: &'static str,
        kind: TokenKind,
        rewrite: fn(Token) -> MustacheResult<Token>,
    }

    impl crate::pragma::Pragma for Rewrite {
        fn name(&self) -> &str {
            self.name
        }

        fn handles_token(&self, kind: TokenKind) -> bool {
            kind == self.kind
        }

        fn parse(&self, token: Token) -> MustacheResult<Token> {
            (self.rewrite)(token)
        }

        fn render(
            &self,
            _token: &Token,
            _view: &crate::view::View,
            _options: &crate::pragma::PragmaOptions,
            _ctx: &crate::render_context::RenderContext<'_>,
        ) -> MustacheResult<Option<String>> {
            Ok(None)
        }
    }

    fn uppercase_content(token: Token) -> MustacheResult<Token> {
        match token {
            Token::Content(content) => Ok(Token::content(content.text.to_uppercase())),
            other => Ok(other),
        }
    }

    #[test]
    fn test_pragma_rewrites_content_after_declaration() {
        let mut pragmas = PragmaRegistry::new();
        pragmas
            .add(Rewrite {
                name: "SHOUT",
                kind: TokenKind::Content,
                rewrite: uppercase_content,
            })
            .unwrap();

        let tokens = lex_with(&pragmas, "quiet {{%SHOUT}}hello {{x}} world").unwrap();
        assert_eq!(text(&tokens[0]), "quiet ");
        assert!(matches!(&tokens[1], Token::Pragma(decl) if decl.name == "SHOUT"));
        assert_eq!(text(&tokens[2]), "HELLO ");
        assert_eq!(tokens[3], Token::variable("x"));
        assert_eq!(text(&tokens[4]), " WORLD");
    }

    #[test]
    fn test_malformed_rewrite_is_invalid_token() {
        let mut pragmas = PragmaRegistry::new();
        pragmas
            .add(Rewrite {
                name: "BLANK",
                kind: TokenKind::Variable,
                rewrite: |_| Ok(Token::variable("")),
            })
            .unwrap();

        assert!(matches!(
            lex_with(&pragmas, "{{%BLANK}}{{name}}"),
            Err(MustacheError::InvalidToken { .. })
        ));
        // Not in scope: the variable is left alone
        assert_eq!(lex_with(&pragmas, "{{name}}").unwrap(), vec![Token::variable("name")]);
    }

    #[test]
    fn test_declaration_is_not_offered_to_the_pragma_it_declares() {
        let mut pragmas = PragmaRegistry::new();
        pragmas
            .add(Rewrite {
                name: "STRICT",
                kind: TokenKind::Pragma,
                rewrite: |_| {
                    Err(MustacheError::InvalidToken {
                        message: "pragma declarations are rejected".to_string(),
                    })
                },
            })
            .unwrap();

        let tokens = lex_with(&pragmas, "{{%STRICT}}").unwrap();
        assert!(matches!(&tokens[0], Token::Pragma(decl) if decl.name == "STRICT"));

        // Later declarations are in its scope
        assert!(matches!(
            lex_with(&pragmas, "{{%STRICT}}{{%IMPLICIT-ITERATOR}}"),
            Err(MustacheError::InvalidToken { .. })
        ));
    }
}
