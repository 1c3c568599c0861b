//! Ledger read API
//!
//! The assistant only ever reads from the ledger. Every aggregation the
//! snapshot needs is a separate call so the aggregator can issue them
//! concurrently.

use crate::models::{CategoryTotal, MonthlyCategoryTotal, UserProfile};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryLedger;
pub use postgres::PgLedger;

/// Half-open date window `[start, end)`; `end = None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && self.end.map_or(true, |end| at < end)
    }
}

/// Read-only aggregation surface over users, groups, expenses and settlements
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserProfile>>;

    /// Σ amount over expenses owned by `email`
    async fn sum_by_owner(&self, email: &str) -> Result<Decimal>;

    async fn sum_by_owner_per_category(&self, email: &str) -> Result<Vec<CategoryTotal>>;

    async fn sum_by_owner_in_range(&self, email: &str, range: DateRange) -> Result<Decimal>;

    /// Σ amount over expenses where `email` is a member, keyed by group id
    async fn sum_by_member_per_group(&self, email: &str) -> Result<Vec<(Uuid, Decimal)>>;

    /// Names for the given group ids; ids without a record are omitted
    async fn group_names(&self, group_ids: &[Uuid]) -> Result<HashMap<Uuid, String>>;

    /// Σ of `email`'s own share on expenses owned by somebody else
    async fn sum_owed_shares(&self, email: &str) -> Result<Decimal>;

    async fn sum_settled_by_payer(&self, email: &str) -> Result<Decimal>;

    async fn count_groups_for_member(&self, email: &str) -> Result<u64>;

    /// Total member slots across every group `email` belongs to
    async fn count_group_memberships(&self, email: &str) -> Result<u64>;

    async fn monthly_category_totals(&self, email: &str) -> Result<Vec<MonthlyCategoryTotal>>;
}
