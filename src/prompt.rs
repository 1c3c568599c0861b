//! Prompt template rendering
//!
//! Templates are read once when the renderer is built and then rendered
//! against plain serializable contexts. Only built-in block helpers
//! (`each`, `if`) are available; no custom helpers are registered.

use crate::error::AssistantError;
use crate::Result;
use handlebars::Handlebars;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Template used by the fallback pipeline
pub const FINANCIAL_DEFAULT: &str = "financial_default";

const TEMPLATE_EXTENSION: &str = "hbs";

const EMBEDDED_FINANCIAL_DEFAULT: &str = include_str!("../templates/financial_default.hbs");

pub struct PromptRenderer {
    hbs: Handlebars<'static>,
}

impl PromptRenderer {
    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        // Prompts are plain text, not HTML
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Renderer holding only the compiled-in default template.
    pub fn embedded() -> Result<Self> {
        let mut renderer = Self { hbs: Self::engine() };
        renderer.register(FINANCIAL_DEFAULT, EMBEDDED_FINANCIAL_DEFAULT)?;
        Ok(renderer)
    }

    /// Load `{dir}/{id}.hbs` for every id. Fails on the first unreadable or
    /// malformed template.
    pub fn from_dir(dir: impl AsRef<Path>, template_ids: &[&str]) -> Result<Self> {
        let dir = dir.as_ref();
        let mut renderer = Self { hbs: Self::engine() };

        for id in template_ids {
            let path = dir.join(format!("{}.{}", id, TEMPLATE_EXTENSION));
            debug!("Loading prompt template from {:?}", path);

            let text = std::fs::read_to_string(&path).map_err(|e| {
                AssistantError::TemplateError(format!(
                    "Failed to read template {}: {}",
                    path.display(),
                    e
                ))
            })?;
            renderer.register(id, &text)?;
        }

        Ok(renderer)
    }

    /// Register (or replace) a template from raw text.
    pub fn register(&mut self, template_id: &str, text: &str) -> Result<()> {
        self.hbs
            .register_template_string(template_id, text)
            .map_err(|e| {
                AssistantError::TemplateError(format!("Invalid template {}: {}", template_id, e))
            })
    }

    pub fn has_template(&self, template_id: &str) -> bool {
        self.hbs.has_template(template_id)
    }

    pub fn render<T: Serialize>(&self, template_id: &str, context: &T) -> Result<String> {
        self.hbs.render(template_id, context).map_err(|e| {
            AssistantError::TemplateError(format!("Failed to render {}: {}", template_id, e))
        })
    }
}
