//! Fallback completion pipeline
//!
//! Renders the snapshot and the raw question into one prompt and asks the
//! completion provider once. No retries.

use crate::completion::{CompletionProvider, CompletionRequest};
use crate::composer::{format_amount, CURRENCY_SYMBOL};
use crate::config::{AssistantConfig, CompletionSettings};
use crate::error::AssistantError;
use crate::models::FinancialSnapshot;
use crate::prompt::{PromptRenderer, FINANCIAL_DEFAULT};
use crate::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SYSTEM_INSTRUCTION: &str = "You are a helpful financial assistant.";

/// Template context: snapshot values pre-formatted, plus the query
#[derive(Debug, Serialize)]
pub struct PromptContext {
    pub query: String,
    pub name: String,
    pub email: String,
    pub currency: &'static str,
    pub total_expenses: String,
    pub last_month_expenses: String,
    pub last_three_months_expenses: String,
    pub owed: String,
    pub settled: String,
    pub group_count: u64,
    pub total_group_members: u64,
    pub categories: Vec<PromptLine>,
    pub groups: Vec<PromptGroupLine>,
    pub target_group: Option<String>,
    pub trends: Vec<PromptTrendLine>,
}

#[derive(Debug, Serialize)]
pub struct PromptLine {
    pub name: String,
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct PromptGroupLine {
    pub name: String,
    pub amount: String,
    pub is_target_group: bool,
}

#[derive(Debug, Serialize)]
pub struct PromptTrendLine {
    pub period: String,
    pub category: String,
    pub amount: String,
}

impl PromptContext {
    pub fn new(query: &str, snapshot: &FinancialSnapshot) -> Self {
        Self {
            query: query.to_string(),
            name: snapshot.identity.display_name.clone(),
            email: snapshot.identity.email.clone(),
            currency: CURRENCY_SYMBOL,
            total_expenses: format_amount(snapshot.total_expenses),
            last_month_expenses: format_amount(snapshot.last_month_expenses),
            last_three_months_expenses: format_amount(snapshot.last_three_months_expenses),
            owed: format_amount(snapshot.owed_amount),
            settled: format_amount(snapshot.settled_amount),
            group_count: snapshot.group_count,
            total_group_members: snapshot.total_group_members,
            categories: snapshot
                .category_breakdown
                .iter()
                .map(|c| PromptLine {
                    name: c.category.to_string(),
                    amount: format_amount(c.total),
                })
                .collect(),
            groups: snapshot
                .group_expenses
                .iter()
                .map(|g| PromptGroupLine {
                    name: g.name.clone(),
                    amount: format_amount(g.total),
                    is_target_group: g.is_target_group,
                })
                .collect(),
            target_group: snapshot.target_group.clone(),
            trends: snapshot
                .monthly_category_trend
                .iter()
                .map(|t| PromptTrendLine {
                    period: format!("{:04}-{:02}", t.year, t.month),
                    category: t.category.to_string(),
                    amount: format_amount(t.total),
                })
                .collect(),
        }
    }
}

pub struct FinancialPipeline {
    renderer: Arc<PromptRenderer>,
    provider: Arc<dyn CompletionProvider>,
    settings: CompletionSettings,
    template_id: String,
}

impl FinancialPipeline {
    pub fn new(
        renderer: Arc<PromptRenderer>,
        provider: Arc<dyn CompletionProvider>,
        settings: CompletionSettings,
    ) -> Self {
        Self {
            renderer,
            provider,
            settings,
            template_id: FINANCIAL_DEFAULT.to_string(),
        }
    }

    /// Use a different registered template for the prompt.
    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = template_id.into();
        self
    }

    /// Build the renderer the config asks for and select its template.
    ///
    /// Templates come from `prompt_template_dir` when set, otherwise the
    /// embedded default is used. An unknown template id is a config error.
    pub fn from_config(
        config: &AssistantConfig,
        provider: Arc<dyn CompletionProvider>,
    ) -> Result<Self> {
        let template_id = config.prompt_template.as_str();

        let renderer = match &config.prompt_template_dir {
            Some(dir) => {
                info!(dir = %dir.display(), template = template_id, "Loading prompt template from disk");
                PromptRenderer::from_dir(dir, &[template_id])?
            }
            None => PromptRenderer::embedded()?,
        };

        if !renderer.has_template(template_id) {
            return Err(AssistantError::ConfigError(format!(
                "Prompt template {} is not available; set PROMPT_TEMPLATE_DIR to load it",
                template_id
            )));
        }

        Ok(Self::new(Arc::new(renderer), provider, config.completion).with_template(template_id))
    }

    pub fn build_prompt(&self, query: &str, snapshot: &FinancialSnapshot) -> Result<String> {
        let context = PromptContext::new(query, snapshot);
        self.renderer.render(&self.template_id, &context)
    }

    pub async fn analyze(&self, query: &str, snapshot: &FinancialSnapshot) -> Result<String> {
        let prompt = self.build_prompt(query, snapshot)?;
        debug!(prompt_len = prompt.len(), "Fallback prompt rendered");

        let request = CompletionRequest {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            user_prompt: prompt,
            max_output_tokens: self.settings.max_output_tokens,
            temperature: self.settings.temperature,
        };

        let text = self.provider.complete(&request).await?;
        let trimmed = text.trim();

        if trimmed.is_empty() {
            warn!("Completion provider returned no content");
            return Err(AssistantError::CompletionError(
                "Completion provider returned no content".to_string(),
            ));
        }

        Ok(trimmed.to_string())
    }
}
