/*
 * renderer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Token rendering.
//!
//! Rendering walks a compiled token sequence against a [`View`] and
//! concatenates the output. Each call to [`render`] is its own pragma scope:
//! pragmas activated inside a section stop applying when the section ends.

use crate::error::MustacheResult;
use crate::render_context::RenderContext;
use crate::token::{Block, PartialRef, Token, Variable};
use crate::view::{Lambda, View};

/// Render a token sequence against a view.
pub fn render(tokens: &[Token], view: &View, ctx: &RenderContext<'_>) -> MustacheResult<String> {
    let mut ctx = ctx.clone();

    // Iterating a list of scalars: only content and variables apply
    let in_loop = view.is_scalar();

    let mut output = String::new();
    for token in tokens {
        if let Some(rendered) = render_via_pragmas(token, view, &ctx)? {
            output.push_str(&rendered);
            continue;
        }

        match token {
            Token::Content(content) => output.push_str(&content.text),

            Token::Variable(variable) => render_variable(token, variable, view, &ctx, &mut output)?,

            Token::VariableRaw(variable) => output.push_str(&view.lookup(&variable.name).to_text()),

            Token::Section(block) => {
                if !in_loop {
                    let value = view.lookup(&block.name);
                    output.push_str(&render_section(&value, block, view, &ctx)?);
                }
            }

            Token::SectionInvert(block) => {
                if !in_loop && !view.lookup(&block.name).is_truthy() {
                    output.push_str(&render(&block.content, view, &ctx)?);
                }
            }

            Token::Placeholder(block) => {
                if !in_loop {
                    output.push_str(&render(&block.content, view, &ctx)?);
                }
            }

            Token::Partial(partial) => {
                if !in_loop {
                    output.push_str(&render_partial(partial, view, &ctx)?);
                }
            }

            Token::Pragma(decl) => ctx.activate(decl)?,

            // No output; a child that survived compilation has nothing to render
            Token::Comment(_) | Token::DelimiterSet(_) | Token::Child(_) => {}
        }
    }

    Ok(output)
}

/// Offer a token to the active pragmas, in activation order. The first
/// non-empty output wins.
fn render_via_pragmas(
    token: &Token,
    view: &View,
    ctx: &RenderContext<'_>,
) -> MustacheResult<Option<String>> {
    let active = ctx.active_pragmas();
    if active.is_empty() {
        return Ok(None);
    }

    let registry = ctx.host().pragmas();
    let kind = token.kind();
    for (name, options) in active.iter() {
        let pragma = registry.get(name)?;
        if !pragma.handles_token(kind) {
            continue;
        }
        if let Some(rendered) = pragma.render(token, view, options, ctx)? {
            if !rendered.is_empty() {
                return Ok(Some(rendered));
            }
        }
    }
    Ok(None)
}

/// Render an escaped variable.
///
/// Scalars are offered to the pragmas once more with the value itself as the
/// view, then escaped. Anything else is offered wrapped as `{name: value}`,
/// then written as text without escaping.
fn render_variable(
    token: &Token,
    variable: &Variable,
    view: &View,
    ctx: &RenderContext<'_>,
    output: &mut String,
) -> MustacheResult<()> {
    let value = view.lookup(&variable.name);

    if value.is_scalar() {
        if let Some(rendered) = render_via_pragmas(token, &value, ctx)? {
            output.push_str(&rendered);
            return Ok(());
        }
        let text = value.to_text();
        if !text.is_empty() {
            output.push_str(&ctx.escape_default(&text));
        }
        return Ok(());
    }

    let text = value.to_text();
    let wrapped = View::map([(variable.name.clone(), value.into_owned())]);
    match render_via_pragmas(token, &wrapped, ctx)? {
        Some(rendered) => output.push_str(&rendered),
        None => output.push_str(&text),
    }
    Ok(())
}

/// Render a section given the value its name resolved to.
fn render_section(
    value: &View,
    block: &Block,
    view: &View,
    ctx: &RenderContext<'_>,
) -> MustacheResult<String> {
    if !value.is_truthy() {
        return Ok(String::new());
    }

    match value {
        View::Map(_) | View::Object(_) => render(&block.content, value, ctx),

        View::List(items) => items
            .iter()
            .map(|item| render(&block.content, item, ctx))
            .collect(),

        View::Lambda(Lambda::Section(f)) => {
            let pragmas = ctx.active_pragmas().names();
            let render_fragment = |text: &str| -> MustacheResult<String> {
                let tokens = ctx.host().compile_fragment(text, &pragmas)?;
                render(&tokens, view, ctx)
            };
            f(&block.template, &render_fragment)
        }

        View::Lambda(Lambda::Value(f)) => render_section(&f(), block, view, ctx),

        // `true` and other truthy scalars keep the current view
        _ => render(&block.content, view, ctx),
    }
}

/// Render a partial with a fresh pragma scope.
///
/// Lookup order: tokens resolved at compile time, then caller-supplied
/// aliases, then the engine's resolvers.
fn render_partial(
    partial: &PartialRef,
    view: &View,
    ctx: &RenderContext<'_>,
) -> MustacheResult<String> {
    let ctx = ctx.enter_partial(&partial.name)?;

    if let Some(tokens) = &partial.tokens {
        return render(tokens, view, &ctx);
    }
    if let Some(tokens) = ctx.partial_alias(&partial.name) {
        return render(tokens, view, &ctx);
    }

    tracing::trace!(
        partial = %partial.name,
        depth = ctx.partial_depth,
        "Resolving partial at render time"
    );
    let tokens = ctx.host().tokenize(&partial.name)?;
    render(&tokens, view, &ctx)
}
