/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Mustache template engine for Quarto.
//!
//! This crate compiles [Mustache](https://mustache.github.io/) templates to
//! tokens and renders them against a dynamic [`View`]. It supports:
//!
//! - Variables: `{{name}}` (escaped), `{{{name}}}` / `{{&name}}` (raw)
//! - Dotted lookups: `{{person.name}}`
//! - Sections and inverted sections: `{{#items}}...{{/items}}`, `{{^items}}...{{/items}}`
//! - Higher-order sections (callable views receive the raw section text)
//! - Partials: `{{>header}}`
//! - Template inheritance: `{{<parent}}{{$slot}}override{{/slot}}{{/parent}}`
//! - Delimiter changes: `{{=<% %>=}}`
//! - Comments: `{{! note }}`
//! - Pragmas: `{{%IMPLICIT-ITERATOR}}`, `{{%CONTEXTUAL-ESCAPE}}`, `{{%SUB-VIEWS}}`
//!
//! # Architecture
//!
//! [`Lexer`] turns template text into a token tree in two passes, calling
//! back into the engine to inline partials and inheritance parents.
//! [`renderer::render`] walks the tokens against a view. [`Mustache`] owns
//! the resolver chain, the pragma registry and the token cache, and is the
//! usual entry point.
//!
//! # Example
//!
//! ```
//! use quarto_mustache::{Mustache, View};
//!
//! let engine = Mustache::new();
//! let view = View::map([
//!     ("name", View::from("Chris")),
//!     ("items", View::list(["a", "b"])),
//! ]);
//!
//! let output = engine
//!     .render("Hi {{name}}:{{#items}} {{.}}{{/items}}", &view)
//!     .unwrap();
//! assert_eq!(output, "Hi Chris: a b");
//! ```

pub mod error;
pub mod escape;
pub mod lexer;
pub mod mustache;
pub mod options;
pub mod pragma;
pub mod render_context;
pub mod renderer;
pub mod resolver;
pub mod token;
pub mod view;

// Re-export main types at crate root
pub use error::{MustacheError, MustacheResult};
pub use escape::{DefaultEscaper, EscapeContext, Escaper};
pub use lexer::{CompileEnv, LexScope, Lexer, Tokenize};
pub use mustache::Mustache;
pub use options::MustacheOptions;
pub use pragma::{
    ActivePragmas, ContextualEscape, ImplicitIterator, Pragma, PragmaOptions, PragmaRegistry,
    SubView, SubViews,
};
pub use render_context::{RenderContext, RenderHost};
pub use resolver::{
    AggregateResolver, FileSystemResolver, MemoryResolver, Resolver, TemplateSource,
};
pub use token::{
    Block, ChildRef, Comment, Content, Delimiters, PartialRef, PragmaDecl, Token, TokenKind,
    Variable,
};
pub use view::{Lambda, Record, RenderFn, View, ViewObject};
