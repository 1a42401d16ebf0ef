//! Title and body rendering.
//!
//! Channels never format alerts themselves. They hand their configured title
//! and body templates plus the annotated batch to a [`TemplateRenderer`];
//! any failure aborts the send as a permanent error.

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::alert::AnnotatedAlert;
use crate::annotate::AnnotatedBatch;

/// Default title template.
pub const DEFAULT_TITLE_TEMPLATE: &str = "[{{status}}] {{firing}} firing, {{resolved}} resolved";

/// Default body template: one markdown line per alert.
pub const DEFAULT_BODY_TEMPLATE: &str = "{{#each alerts}}- {{#each labels}}{{@key}}={{this}} {{/each}}\n{{/each}}";

/// Template errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template source does not parse.
    #[error("template syntax error: {0}")]
    Syntax(String),

    /// Rendering failed, e.g. a referenced field does not exist.
    #[error("template render error: {0}")]
    Render(String),
}

/// Rendered title and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Rendered title.
    pub title: String,
    /// Rendered body.
    pub body: String,
}

impl RenderedMessage {
    /// Create a rendered message.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Data exposed to templates.
#[derive(Debug, Serialize)]
pub struct TemplateContext<'a> {
    /// Annotated alerts in input order.
    pub alerts: &'a [AnnotatedAlert],
    /// `firing` if any alert is still active, `resolved` otherwise.
    pub status: &'static str,
    /// Number of active alerts.
    pub firing: usize,
    /// Number of resolved alerts.
    pub resolved: usize,
    /// Comma-joined roster, null without one.
    pub oncall: Option<String>,
    /// Roster mention string, null without one.
    pub mention: Option<&'a str>,
}

impl<'a> TemplateContext<'a> {
    /// Build the context for a batch.
    pub fn new(batch: &'a AnnotatedBatch) -> Self {
        let now = Utc::now();
        let resolved = batch
            .alerts
            .iter()
            .filter(|a| a.alert().is_resolved_at(now))
            .count();
        let firing = batch.alerts.len() - resolved;

        Self {
            alerts: &batch.alerts,
            status: if firing > 0 { "firing" } else { "resolved" },
            firing,
            resolved,
            oncall: batch
                .alerts
                .first()
                .and_then(|a| a.oncall())
                .map(str::to_string),
            mention: batch.mention.as_deref(),
        }
    }
}

/// Renders a title and body template against an alert batch.
pub trait TemplateRenderer: Send + Sync {
    /// Render both templates.
    fn render(
        &self,
        title_template: &str,
        body_template: &str,
        batch: &AnnotatedBatch,
    ) -> Result<RenderedMessage, TemplateError>;

    /// Check a template ahead of time. The default accepts everything.
    fn check(&self, _template: &str) -> Result<(), TemplateError> {
        Ok(())
    }
}

impl<F> TemplateRenderer for F
where
    F: Fn(&str, &str, &AnnotatedBatch) -> Result<RenderedMessage, TemplateError> + Send + Sync,
{
    fn render(
        &self,
        title_template: &str,
        body_template: &str,
        batch: &AnnotatedBatch,
    ) -> Result<RenderedMessage, TemplateError> {
        self(title_template, body_template, batch)
    }
}

#[cfg(feature = "handlebars")]
pub use self::handlebars_renderer::HandlebarsRenderer;

#[cfg(feature = "handlebars")]
mod handlebars_renderer {
    use handlebars::{Handlebars, Template};

    use super::{RenderedMessage, TemplateContext, TemplateError, TemplateRenderer};
    use crate::annotate::AnnotatedBatch;

    /// Handlebars renderer in strict mode: referencing a missing field fails
    /// the render instead of producing an empty string.
    pub struct HandlebarsRenderer {
        handlebars: Handlebars<'static>,
    }

    impl HandlebarsRenderer {
        /// Create a strict renderer without HTML escaping.
        pub fn new() -> Self {
            let mut handlebars = Handlebars::new();
            handlebars.set_strict_mode(true);
            handlebars.register_escape_fn(handlebars::no_escape);
            Self { handlebars }
        }

        /// Register a helper.
        pub fn register_helper<H: handlebars::HelperDef + Send + Sync + 'static>(
            mut self,
            name: &str,
            helper: H,
        ) -> Self {
            self.handlebars.register_helper(name, Box::new(helper));
            self
        }

        /// Register a partial.
        pub fn register_partial(mut self, name: &str, content: &str) -> Result<Self, TemplateError> {
            self.handlebars
                .register_partial(name, content)
                .map_err(|e| TemplateError::Syntax(e.to_string()))?;
            Ok(self)
        }

        fn render_one(&self, template: &str, context: &TemplateContext<'_>) -> Result<String, TemplateError> {
            self.check(template)?;
            self.handlebars
                .render_template(template, context)
                .map_err(|e| TemplateError::Render(e.to_string()))
        }
    }

    impl Default for HandlebarsRenderer {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TemplateRenderer for HandlebarsRenderer {
        fn render(
            &self,
            title_template: &str,
            body_template: &str,
            batch: &AnnotatedBatch,
        ) -> Result<RenderedMessage, TemplateError> {
            let context = TemplateContext::new(batch);
            Ok(RenderedMessage {
                title: self.render_one(title_template, &context)?.trim().to_string(),
                body: self.render_one(body_template, &context)?,
            })
        }

        fn check(&self, template: &str) -> Result<(), TemplateError> {
            Template::compile(template)
                .map(|_| ())
                .map_err(|e| TemplateError::Syntax(e.to_string()))
        }
    }
}
