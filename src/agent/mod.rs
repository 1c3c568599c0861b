//! Query orchestrator
//!
//! RECEIVED → VALIDATED → SNAPSHOT → CLASSIFY → COMPOSE | FALLBACK → ANSWERED
//!
//! Every terminal state maps to a user-facing string. The only error handed
//! back to the caller is `UserNotFound`, which the transport reports as a
//! server error.

use crate::aggregator::FinancialContextAggregator;
use crate::classifier::{Intent, IntentClassifier};
use crate::composer::{self, CAPABILITY_MENU};
use crate::error::AssistantError;
use crate::models::FinancialSnapshot;
use crate::pipeline::FinancialPipeline;
use crate::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DATA_UNAVAILABLE_MESSAGE: &str = "Sorry, we couldn't retrieve your financial data.";

pub const COMPLETION_ERROR_MESSAGE: &str =
    "Sorry, I couldn't understand that. Please ask about expenses or finance-related queries.";

lazy_static! {
    static ref GROUP_NAME: Regex = Regex::new(r"(?i)group (.+)").unwrap();
}

/// Which terminal state produced the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "intent")]
pub enum AnswerSource {
    CapabilityMenu,
    Composed(Intent),
    Fallback,
    DataUnavailable,
    CompletionFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub message: String,
    pub source: AnswerSource,
}

impl Answer {
    fn new(message: impl Into<String>, source: AnswerSource) -> Self {
        Self {
            message: message.into(),
            source,
        }
    }
}

/// Extract the lower-cased, trimmed name following "group " in the query.
pub fn extract_group_name(query: &str) -> Option<String> {
    GROUP_NAME
        .captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_lowercase())
        .filter(|name| !name.is_empty())
}

/// Main orchestrator that answers one query per call
pub struct Orchestrator {
    aggregator: FinancialContextAggregator,
    pipeline: FinancialPipeline,
}

impl Orchestrator {
    pub fn new(aggregator: FinancialContextAggregator, pipeline: FinancialPipeline) -> Self {
        Self {
            aggregator,
            pipeline,
        }
    }

    /// Answer `query` for `user_id`; never fails for anything but an unknown user.
    pub async fn answer(&self, query: &str, user_id: Uuid) -> Result<Answer> {
        let start_time = Instant::now();

        let snapshot = match self.prepare(query, user_id).await {
            Ok(snapshot) => snapshot,
            Err(AssistantError::EmptyQuery) => {
                debug!(user_id = %user_id, "Blank query, returning capability menu");
                return Ok(Answer::new(CAPABILITY_MENU, AnswerSource::CapabilityMenu));
            }
            Err(AssistantError::DataUnavailable(reason)) => {
                warn!(user_id = %user_id, reason = %reason, "Financial data unavailable");
                return Ok(Answer::new(
                    DATA_UNAVAILABLE_MESSAGE,
                    AnswerSource::DataUnavailable,
                ));
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Query rejected");
                return Err(e);
            }
        };

        let answer = self.answer_with_snapshot(query, &snapshot).await;

        info!(
            user_id = %user_id,
            source = ?answer.source,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Query answered"
        );

        Ok(answer)
    }

    /// Validate the query and build the snapshot.
    ///
    /// Blank input is `EmptyQuery`; any aggregation failure other than an
    /// unknown user becomes `DataUnavailable`.
    async fn prepare(&self, query: &str, user_id: Uuid) -> Result<FinancialSnapshot> {
        // === VALIDATE ===
        if query.trim().is_empty() {
            return Err(AssistantError::EmptyQuery);
        }

        // === SNAPSHOT ===
        match self.aggregator.build_snapshot(user_id).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) if e.is_fatal_for_request() => Err(e),
            Err(e) => Err(AssistantError::DataUnavailable(e.to_string())),
        }
    }

    /// Same as [`answer`](Self::answer) but always yields a string.
    pub async fn answer_query(&self, query: &str, user_id: Uuid) -> String {
        match self.answer(query, user_id).await {
            Ok(answer) => answer.message,
            Err(_) => DATA_UNAVAILABLE_MESSAGE.to_string(),
        }
    }

    /// Group targeting, classification, composition and fallback over a
    /// snapshot that has already been built.
    pub async fn answer_with_snapshot(&self, query: &str, snapshot: &FinancialSnapshot) -> Answer {
        let targeted;
        let snapshot = match extract_group_name(query) {
            Some(name) => {
                debug!(group = %name, "Query names a group");
                targeted = snapshot.with_target_group(&name);
                &targeted
            }
            None => snapshot,
        };

        // === CLASSIFY → COMPOSE ===
        let intent = IntentClassifier::classify(query);
        debug!(intent = ?intent, "Query classified");

        if let Some(intent) = intent {
            if let Some(text) = composer::compose(intent, snapshot, query) {
                if !text.is_empty() {
                    return Answer::new(text, AnswerSource::Composed(intent));
                }
            }
        }

        // === FALLBACK ===
        debug!("No deterministic answer, invoking completion fallback");
        match self.pipeline.analyze(query, snapshot).await {
            Ok(text) => Answer::new(text, AnswerSource::Fallback),
            Err(e) => {
                warn!(error = %e, "Completion fallback failed");
                Answer::new(COMPLETION_ERROR_MESSAGE, AnswerSource::CompletionFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CompletionProvider, ScriptedProvider};
    use crate::config::CompletionSettings;
    use crate::ledger::memory::LedgerOp;
    use crate::ledger::{InMemoryLedger, LedgerStore};
    use crate::models::{ExpenseCategory, ExpenseRecord, GroupRecord, MemberShare, UserProfile};
    use crate::prompt::PromptRenderer;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    const AVA: &str = "ava@example.com";

    struct Harness {
        orchestrator: Orchestrator,
        ledger: Arc<InMemoryLedger>,
        provider: Arc<ScriptedProvider>,
        user_id: Uuid,
    }

    async fn harness(provider: ScriptedProvider) -> Harness {
        let ledger = Arc::new(InMemoryLedger::new());
        let user_id = Uuid::new_v4();
        ledger
            .insert_user(UserProfile {
                user_id,
                first_name: "Ava".to_string(),
                last_name: "Shah".to_string(),
                email: AVA.to_string(),
            })
            .await;

        let roommates = Uuid::new_v4();
        let trip = Uuid::new_v4();
        for (id, name) in [(roommates, "Roommates"), (trip, "Trip")] {
            ledger
                .insert_group(GroupRecord {
                    group_id: id,
                    name: name.to_string(),
                    members: vec![AVA.to_string(), "ben@example.com".to_string()],
                })
                .await;
        }
        for (group_id, amount, category) in [
            (roommates, Decimal::from(1000), ExpenseCategory::Utilities),
            (roommates, Decimal::from(200), ExpenseCategory::Food),
            (trip, Decimal::new(345, 1), ExpenseCategory::Transportation),
        ] {
            ledger
                .insert_expense(ExpenseRecord {
                    expense_id: Uuid::new_v4(),
                    group_id,
                    amount,
                    category,
                    date: Utc::now(),
                    owner: AVA.to_string(),
                    members: vec![AVA.to_string()],
                    shares: vec![MemberShare {
                        member: AVA.to_string(),
                        amount_owed: amount,
                        paid: true,
                    }],
                })
                .await;
        }

        let provider = Arc::new(provider);
        let store: Arc<dyn LedgerStore> = ledger.clone();
        let completion: Arc<dyn CompletionProvider> = provider.clone();
        let orchestrator = Orchestrator::new(
            FinancialContextAggregator::new(store),
            FinancialPipeline::new(
                Arc::new(PromptRenderer::embedded().unwrap()),
                completion,
                CompletionSettings::default(),
            ),
        );

        Harness {
            orchestrator,
            ledger,
            provider,
            user_id,
        }
    }

    #[tokio::test]
    async fn test_blank_query_returns_menu_for_any_user() {
        let h = harness(ScriptedProvider::replying("unused")).await;

        for query in ["", "   ", "\n\t"] {
            let known = h.orchestrator.answer(query, h.user_id).await.unwrap();
            let unknown = h.orchestrator.answer(query, Uuid::new_v4()).await.unwrap();

            assert_eq!(known.message, CAPABILITY_MENU);
            assert_eq!(unknown.message, CAPABILITY_MENU);
            assert_eq!(known.source, AnswerSource::CapabilityMenu);
        }
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_greeting() {
        let h = harness(ScriptedProvider::replying("unused")).await;
        let answer = h.orchestrator.answer("hello", h.user_id).await.unwrap();

        assert!(answer.message.starts_with("Hello Ava Shah! "));
        assert!(answer.message.ends_with(CAPABILITY_MENU));
        assert_eq!(answer.source, AnswerSource::Composed(Intent::Greeting));
    }

    #[tokio::test]
    async fn test_total_expenses() {
        let h = harness(ScriptedProvider::replying("unused")).await;
        let answer = h.orchestrator.answer("total expenses", h.user_id).await.unwrap();

        assert_eq!(answer.message, "Your total expenses are ₹1234.50.");
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_category_lookup() {
        let h = harness(ScriptedProvider::replying("unused")).await;
        let lower = h.orchestrator.answer_query("spending on food", h.user_id).await;
        let upper = h.orchestrator.answer_query("spending on FOOD", h.user_id).await;

        assert_eq!(lower, "You've spent ₹200.00 on Food.");
        assert_eq!(lower, upper);
    }

    #[tokio::test]
    async fn test_named_group_is_flagged_in_fallback_prompt() {
        let h = harness(ScriptedProvider::replying("Roommates is your biggest group.")).await;
        let answer = h.orchestrator.answer("group Roommates", h.user_id).await.unwrap();

        // "group roommates" matches no intent, so the flag reaches the prompt
        assert_eq!(answer.source, AnswerSource::Fallback);
        assert_eq!(answer.message, "Roommates is your biggest group.");

        let prompt = &h.provider.requests()[0].user_prompt;
        assert!(prompt.contains("- Roommates: ₹1200.00 (the group the user is asking about)"));
        assert!(prompt.contains("- Trip: ₹34.50\n"));
    }

    #[tokio::test]
    async fn test_unrecognised_query_uses_fallback_once() {
        let h = harness(ScriptedProvider::replying("Diversify.")).await;
        let answer = h.orchestrator.answer("what should I invest in", h.user_id).await.unwrap();

        assert_eq!(answer.message, "Diversify.");
        assert_eq!(answer.source, AnswerSource::Fallback);
        assert_eq!(h.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_failure_returns_generic_message() {
        let h = harness(ScriptedProvider::failing("provider exploded: 503")).await;
        let answer = h.orchestrator.answer("what should I invest in", h.user_id).await.unwrap();

        assert_eq!(answer.message, COMPLETION_ERROR_MESSAGE);
        assert_eq!(answer.source, AnswerSource::CompletionFailed);
        assert!(!answer.message.contains("503"));
        assert_eq!(h.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_reserved_intent_falls_through() {
        let h = harness(ScriptedProvider::replying("Cut back on utilities.")).await;
        let answer = h.orchestrator.answer("saving advice", h.user_id).await.unwrap();

        assert_eq!(answer.source, AnswerSource::Fallback);
        assert_eq!(h.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_aggregation_failure_is_data_unavailable() {
        let h = harness(ScriptedProvider::replying("unused")).await;
        h.ledger.fail_on(LedgerOp::MonthlyTotals).await;

        let answer = h.orchestrator.answer("total expenses", h.user_id).await.unwrap();
        assert_eq!(answer.message, DATA_UNAVAILABLE_MESSAGE);
        assert_eq!(answer.source, AnswerSource::DataUnavailable);
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let h = harness(ScriptedProvider::replying("unused")).await;
        let stranger = Uuid::new_v4();

        let result = h.orchestrator.answer("total expenses", stranger).await;
        assert!(matches!(result, Err(AssistantError::UserNotFound(id)) if id == stranger));

        let text = h.orchestrator.answer_query("total expenses", stranger).await;
        assert_eq!(text, DATA_UNAVAILABLE_MESSAGE);
    }

    #[test]
    fn test_extract_group_name() {
        assert_eq!(extract_group_name("group Roommates").as_deref(), Some("roommates"));
        assert_eq!(
            extract_group_name("How much did we spend in GROUP  Goa Trip  ").as_deref(),
            Some("goa trip")
        );
        assert_eq!(extract_group_name("my groups"), None);
        assert_eq!(extract_group_name("group    "), None);
    }
}
