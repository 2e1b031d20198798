/*
 * pragma/sub_views.rs
 * Copyright (c) 2025 Posit, PBC
 */

use std::any::Any;

use super::{Pragma, PragmaOptions};
use crate::error::MustacheResult;
use crate::render_context::RenderContext;
use crate::token::{Token, TokenKind};
use crate::view::{View, ViewObject};

/// A view value that renders another template in place of a variable.
///
/// Without its own view, the sub-view renders against the view the variable
/// was found in.
#[derive(Debug, Clone)]
pub struct SubView {
    template: String,
    view: Option<View>,
}

impl SubView {
    /// A sub-view rendering `template` against the enclosing view.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            view: None,
        }
    }

    /// A sub-view rendering `template` against `view`.
    pub fn with_view(template: impl Into<String>, view: impl Into<View>) -> Self {
        Self {
            template: template.into(),
            view: Some(view.into()),
        }
    }

    /// Template name or literal template text.
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn view(&self) -> Option<&View> {
        self.view.as_ref()
    }
}

impl ViewObject for SubView {
    fn property(&self, _name: &str) -> Option<View> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<SubView> for View {
    fn from(sub: SubView) -> Self {
        View::object(sub)
    }
}

/// `SUB-VIEWS`: a variable whose value is a [`SubView`] renders that
/// sub-view's template, unescaped.
///
/// ```text
/// {{%SUB-VIEWS}}
/// <body>{{content}}</body>
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SubViews;

impl Pragma for SubViews {
    fn name(&self) -> &str {
        "SUB-VIEWS"
    }

    fn handles_token(&self, kind: TokenKind) -> bool {
        kind == TokenKind::Variable
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
        let Some(value) = view.get_raw(&variable.name) else {
            return Ok(None);
        };
        let View::Object(object) = &*value else {
            return Ok(None);
        };
        let Some(sub) = object.as_any().downcast_ref::<SubView>() else {
            return Ok(None);
        };

        tracing::trace!(template = sub.template(), "Rendering sub-view");
        let rendered = ctx.render_template(&sub.template, sub.view.as_ref().unwrap_or(view))?;
        Ok(Some(rendered))
    }
}
