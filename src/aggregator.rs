//! Financial context aggregation
//!
//! Builds one `FinancialSnapshot` per query. Every constituent read is issued
//! concurrently and joined; a single failed read fails the whole build.

use crate::error::AssistantError;
use crate::ledger::{DateRange, LedgerStore};
use crate::models::{
    CategoryTotal, ExpenseCategory, FinancialSnapshot, GroupTotal, MonthlyCategoryTotal,
    UserIdentity,
};
use crate::Result;
use chrono::{DateTime, Datelike, Months, TimeZone, Utc};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};
use uuid::Uuid;

const MULTI_MONTH_LOOKBACK: u32 = 3;

/// Previous calendar month: `[first of last month, first of this month)`.
pub fn last_calendar_month(now: DateTime<Utc>) -> DateRange {
    let current_start = month_start(now.year(), now.month());
    let previous_start = current_start
        .checked_sub_months(Months::new(1))
        .unwrap_or(current_start);

    DateRange {
        start: previous_start,
        end: Some(current_start),
    }
}

/// Rolling lookback of `months` from `now`, open-ended.
pub fn rolling_months(now: DateTime<Utc>, months: u32) -> DateRange {
    DateRange {
        start: now.checked_sub_months(Months::new(months)).unwrap_or(now),
        end: None,
    }
}

fn month_start(year: i32, month: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn by_amount_desc(a: Decimal, b: Decimal) -> Ordering {
    b.cmp(&a)
}

/// Computes snapshots from a shared ledger reader
pub struct FinancialContextAggregator {
    ledger: Arc<dyn LedgerStore>,
}

impl FinancialContextAggregator {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    pub async fn build_snapshot(&self, user_id: Uuid) -> Result<FinancialSnapshot> {
        self.build_snapshot_at(user_id, Utc::now()).await
    }

    /// Build a snapshot with both time windows anchored at `now`.
    pub async fn build_snapshot_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<FinancialSnapshot> {
        let start_time = Instant::now();

        let user = self
            .ledger
            .find_user(user_id)
            .await?
            .ok_or(AssistantError::UserNotFound(user_id))?;

        let email = user.email.as_str();
        let ledger = self.ledger.as_ref();

        debug!(user_id = %user_id, "Aggregating financial context");

        let joined = tokio::try_join!(
            ledger.sum_by_owner(email),
            ledger.sum_by_owner_per_category(email),
            ledger.sum_by_owner_in_range(email, last_calendar_month(now)),
            ledger.sum_by_owner_in_range(email, rolling_months(now, MULTI_MONTH_LOOKBACK)),
            self.named_group_totals(email),
            ledger.sum_owed_shares(email),
            ledger.sum_settled_by_payer(email),
            ledger.count_groups_for_member(email),
            ledger.count_group_memberships(email),
            ledger.monthly_category_totals(email),
        );

        let (
            total_expenses,
            categories,
            last_month_expenses,
            last_three_months_expenses,
            group_expenses,
            owed_amount,
            settled_amount,
            group_count,
            total_group_members,
            trend,
        ) = joined.map_err(|e| {
            error!(user_id = %user_id, error = %e, "Financial context aggregation failed");
            e
        })?;

        debug!(
            user_id = %user_id,
            groups = group_expenses.len(),
            categories = categories.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Financial context ready"
        );

        Ok(FinancialSnapshot {
            identity: UserIdentity {
                display_name: user.display_name(),
                email: user.email.clone(),
            },
            total_expenses,
            category_breakdown: normalize_categories(categories),
            last_month_expenses,
            last_three_months_expenses,
            group_expenses,
            group_count,
            total_group_members,
            owed_amount,
            settled_amount,
            monthly_category_trend: normalize_trend(trend),
            target_group: None,
            generated_at: now,
        })
    }

    /// Group totals joined with group names.
    ///
    /// The name lookup depends on the ids from the numeric aggregation, so it
    /// runs after it. Ids without a name get a synthetic one.
    async fn named_group_totals(&self, email: &str) -> Result<Vec<GroupTotal>> {
        let totals = self.ledger.sum_by_member_per_group(email).await?;
        let ids: Vec<Uuid> = totals.iter().map(|(id, _)| *id).collect();
        let names = self.ledger.group_names(&ids).await?;

        let mut groups: Vec<GroupTotal> = totals
            .into_iter()
            .map(|(group_id, total)| GroupTotal {
                group_id,
                name: names
                    .get(&group_id)
                    .cloned()
                    .unwrap_or_else(|| format!("Group {}", group_id)),
                total,
                is_target_group: false,
            })
            .collect();

        groups.sort_by(|a, b| by_amount_desc(a.total, b.total).then_with(|| a.name.cmp(&b.name)));
        Ok(groups)
    }
}

/// Merge duplicate categories and sort descending by amount.
fn normalize_categories(raw: Vec<CategoryTotal>) -> Vec<CategoryTotal> {
    let mut merged: BTreeMap<ExpenseCategory, Decimal> = BTreeMap::new();
    for c in raw {
        *merged.entry(c.category).or_insert(Decimal::ZERO) += c.total;
    }

    let mut out: Vec<CategoryTotal> = merged
        .into_iter()
        .map(|(category, total)| CategoryTotal { category, total })
        .collect();

    out.sort_by(|a, b| {
        by_amount_desc(a.total, b.total).then_with(|| a.category.label().cmp(b.category.label()))
    });
    out
}

/// Merge duplicate `(year, month, category)` rows, chronological ascending.
fn normalize_trend(raw: Vec<MonthlyCategoryTotal>) -> Vec<MonthlyCategoryTotal> {
    let mut merged: BTreeMap<(i32, u32, &'static str), (ExpenseCategory, Decimal)> = BTreeMap::new();
    for t in raw {
        let entry = merged
            .entry((t.year, t.month, t.category.label()))
            .or_insert((t.category, Decimal::ZERO));
        entry.1 += t.total;
    }

    merged
        .into_iter()
        .map(|((year, month, _), (category, total))| MonthlyCategoryTotal {
            year,
            month,
            category,
            total,
        })
        .collect()
}
