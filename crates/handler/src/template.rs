//! Template evaluation for incident fields.
//!
//! The pipeline only depends on [`TemplateEvaluator`]; the binary plugs in
//! [`HandlebarsEvaluator`]. Templates see the serialized event, e.g.
//! `{{entity.metadata.name}}-{{check.metadata.name}}`.

use handlebars::{
    no_escape, Context as HbsContext, Handlebars, Helper, HelperResult, Output, RenderContext,
    RenderErrorReason,
};
use thiserror::Error;

use crate::event::Event;

/// A template that failed to evaluate.
#[derive(Debug, Clone, Error)]
#[error("failed to evaluate template {name} ({template:?}): {message}")]
pub struct TemplateError {
    /// Logical field name (`summary`, `dedupKey`, ...)
    pub name: String,
    /// Template source
    pub template: String,
    pub message: String,
}

impl TemplateError {
    pub fn new(name: &str, template: &str, message: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            template: template.to_string(),
            message: message.to_string(),
        }
    }
}

/// Renders a named template against an event.
pub trait TemplateEvaluator: Send + Sync {
    fn evaluate(&self, name: &str, source: &str, event: &Event) -> Result<String, TemplateError>;
}

/// Renders its argument as a JSON literal.
/// Usage: `{"Output": {{toJSON check.output}}}`
fn to_json_helper(
    h: &Helper,
    _: &Handlebars,
    _: &HbsContext,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h
        .param(0)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("toJSON", 0))?;
    out.write(&param.value().to_string())?;
    Ok(())
}

/// Handlebars-backed evaluator.
///
/// A reference to a field the event does not have (a missing label, say)
/// renders as an empty string. Output is not HTML-escaped.
pub struct HandlebarsEvaluator {
    handlebars: Handlebars<'static>,
}

impl HandlebarsEvaluator {
    #[must_use]
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(no_escape);
        handlebars.register_helper("toJSON", Box::new(to_json_helper));
        Self { handlebars }
    }
}

impl Default for HandlebarsEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEvaluator for HandlebarsEvaluator {
    fn evaluate(&self, name: &str, source: &str, event: &Event) -> Result<String, TemplateError> {
        self.handlebars
            .render_template(source, event)
            .map_err(|err| TemplateError::new(name, source, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::fixture;

    #[test]
    fn test_render_event_fields() {
        let evaluator = HandlebarsEvaluator::new();
        let event = fixture("foo", "bar");

        let rendered = evaluator
            .evaluate(
                "dedupKey",
                "{{entity.metadata.name}}-{{check.metadata.name}}",
                &event,
            )
            .unwrap();
        assert_eq!(rendered, "foo-bar");
    }

    #[test]
    fn test_output_is_not_escaped() {
        let evaluator = HandlebarsEvaluator::new();
        let mut event = fixture("foo", "bar");
        if let Some(check) = event.check.as_mut() {
            check.output = "<b>\"quoted\" & more</b>".to_string();
        }

        let rendered = evaluator
            .evaluate("summary", "{{check.output}}", &event)
            .unwrap();
        assert_eq!(rendered, "<b>\"quoted\" & more</b>");
    }

    #[test]
    fn test_to_json_helper() {
        let evaluator = HandlebarsEvaluator::new();
        let mut event = fixture("foo", "bar");
        if let Some(check) = event.check.as_mut() {
            check.output = "bar\nxaz\n".to_string();
        }

        let rendered = evaluator
            .evaluate("details", r#"{"Output": {{toJSON check.output}}}"#, &event)
            .unwrap();
        assert_eq!(rendered, r#"{"Output": "bar\nxaz\n"}"#);
    }

    #[test]
    fn test_missing_label_renders_empty() {
        let evaluator = HandlebarsEvaluator::new();
        let event = fixture("foo", "bar");

        let rendered = evaluator
            .evaluate("group", "{{check.metadata.labels.group}}", &event)
            .unwrap();
        assert_eq!(rendered, "");
    }

    #[test]
    fn test_untyped_metadata_is_visible() {
        let evaluator = HandlebarsEvaluator::new();
        let mut event = fixture("foo", "bar");
        event
            .entity
            .metadata
            .extra
            .insert("created_by".to_string(), "admin".into());

        let rendered = evaluator
            .evaluate("class", "{{entity.metadata.created_by}}", &event)
            .unwrap();
        assert_eq!(rendered, "admin");
    }

    #[test]
    fn test_malformed_template_is_an_error() {
        let evaluator = HandlebarsEvaluator::new();
        let event = fixture("foo", "bar");

        let err = evaluator
            .evaluate("summary", "{{#if entity}}unclosed", &event)
            .unwrap_err();
        assert_eq!(err.name, "summary");
        assert_eq!(err.template, "{{#if entity}}unclosed");
    }
}
