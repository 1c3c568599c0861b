//! Ledger Query Assistant
//!
//! Answers natural-language questions about a user's shared-expense ledger:
//! - Builds a per-request financial snapshot from the ledger (read-only)
//! - Classifies the question against an ordered intent table
//! - Answers known intents from the snapshot with fixed phrasings
//! - Falls back to a single LLM completion for everything else
//!
//! REQUEST FLOW:
//! QUERY → SNAPSHOT → TARGET GROUP? → CLASSIFY → COMPOSE | FALLBACK

pub mod agent;
pub mod aggregator;
pub mod api;
pub mod classifier;
pub mod completion;
pub mod composer;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod pipeline;
pub mod prompt;

pub use error::Result;

// Re-export common types
pub use agent::{Answer, AnswerSource, Orchestrator};
pub use classifier::{Intent, IntentClassifier};
pub use models::*;
