//! In-memory ledger
//!
//! Backs tests, the CLI demo and local runs without a database.

use super::{DateRange, LedgerStore};
use crate::error::AssistantError;
use crate::models::{
    CategoryTotal, ExpenseCategory, ExpenseRecord, GroupRecord, MonthlyCategoryTotal,
    SettlementRecord, UserProfile,
};
use crate::Result;
use chrono::Datelike;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Read operations that can be forced to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerOp {
    FindUser,
    SumByOwner,
    SumByCategory,
    SumInRange,
    SumByGroup,
    GroupNames,
    SumOwed,
    SumSettled,
    CountGroups,
    CountMemberships,
    MonthlyTotals,
}

pub struct InMemoryLedger {
    users: Arc<RwLock<HashMap<Uuid, UserProfile>>>,
    groups: Arc<RwLock<HashMap<Uuid, GroupRecord>>>,
    expenses: Arc<RwLock<Vec<ExpenseRecord>>>,
    settlements: Arc<RwLock<Vec<SettlementRecord>>>,
    failing: Arc<RwLock<HashSet<LedgerOp>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            groups: Arc::new(RwLock::new(HashMap::new())),
            expenses: Arc::new(RwLock::new(Vec::new())),
            settlements: Arc::new(RwLock::new(Vec::new())),
            failing: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    pub async fn insert_user(&self, user: UserProfile) {
        self.users.write().await.insert(user.user_id, user);
    }

    pub async fn insert_group(&self, group: GroupRecord) {
        self.groups.write().await.insert(group.group_id, group);
    }

    pub async fn insert_expense(&self, expense: ExpenseRecord) {
        self.expenses.write().await.push(expense);
    }

    pub async fn insert_settlement(&self, settlement: SettlementRecord) {
        self.settlements.write().await.push(settlement);
    }

    /// Make every subsequent call to `op` return a ledger error.
    pub async fn fail_on(&self, op: LedgerOp) {
        self.failing.write().await.insert(op);
    }

    async fn check(&self, op: LedgerOp) -> Result<()> {
        if self.failing.read().await.contains(&op) {
            return Err(AssistantError::LedgerError(format!("{:?} unavailable", op)));
        }
        Ok(())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedger {

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        self.check(LedgerOp::FindUser).await?;
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn sum_by_owner(&self, email: &str) -> Result<Decimal> {
        self.check(LedgerOp::SumByOwner).await?;
        let expenses = self.expenses.read().await;

        Ok(expenses
            .iter()
            .filter(|e| e.owner == email)
            .map(|e| e.amount)
            .sum())
    }

    async fn sum_by_owner_per_category(&self, email: &str) -> Result<Vec<CategoryTotal>> {
        self.check(LedgerOp::SumByCategory).await?;
        let expenses = self.expenses.read().await;

        let mut totals: BTreeMap<ExpenseCategory, Decimal> = BTreeMap::new();
        for e in expenses.iter().filter(|e| e.owner == email) {
            *totals.entry(e.category).or_insert(Decimal::ZERO) += e.amount;
        }

        Ok(totals
            .into_iter()
            .map(|(category, total)| CategoryTotal { category, total })
            .collect())
    }

    async fn sum_by_owner_in_range(&self, email: &str, range: DateRange) -> Result<Decimal> {
        self.check(LedgerOp::SumInRange).await?;
        let expenses = self.expenses.read().await;

        Ok(expenses
            .iter()
            .filter(|e| e.owner == email && range.contains(e.date))
            .map(|e| e.amount)
            .sum())
    }

    async fn sum_by_member_per_group(&self, email: &str) -> Result<Vec<(Uuid, Decimal)>> {
        self.check(LedgerOp::SumByGroup).await?;
        let expenses = self.expenses.read().await;

        let mut totals: HashMap<Uuid, Decimal> = HashMap::new();
        for e in expenses.iter().filter(|e| e.members.iter().any(|m| m == email)) {
            *totals.entry(e.group_id).or_insert(Decimal::ZERO) += e.amount;
        }

        Ok(totals.into_iter().collect())
    }

    async fn group_names(&self, group_ids: &[Uuid]) -> Result<HashMap<Uuid, String>> {
        self.check(LedgerOp::GroupNames).await?;
        let groups = self.groups.read().await;

        Ok(group_ids
            .iter()
            .filter_map(|id| groups.get(id).map(|g| (*id, g.name.clone())))
            .collect())
    }

    async fn sum_owed_shares(&self, email: &str) -> Result<Decimal> {
        self.check(LedgerOp::SumOwed).await?;
        let expenses = self.expenses.read().await;

        Ok(expenses
            .iter()
            .filter(|e| e.owner != email && e.members.iter().any(|m| m == email))
            .flat_map(|e| e.shares.iter())
            .filter(|s| s.member == email)
            .map(|s| s.amount_owed)
            .sum())
    }

    async fn sum_settled_by_payer(&self, email: &str) -> Result<Decimal> {
        self.check(LedgerOp::SumSettled).await?;
        let settlements = self.settlements.read().await;

        Ok(settlements
            .iter()
            .filter(|s| s.payer == email)
            .map(|s| s.amount)
            .sum())
    }

    async fn count_groups_for_member(&self, email: &str) -> Result<u64> {
        self.check(LedgerOp::CountGroups).await?;
        let groups = self.groups.read().await;

        Ok(groups
            .values()
            .filter(|g| g.members.iter().any(|m| m == email))
            .count() as u64)
    }

    async fn count_group_memberships(&self, email: &str) -> Result<u64> {
        self.check(LedgerOp::CountMemberships).await?;
        let groups = self.groups.read().await;

        Ok(groups
            .values()
            .filter(|g| g.members.iter().any(|m| m == email))
            .map(|g| g.members.len() as u64)
            .sum())
    }

    async fn monthly_category_totals(&self, email: &str) -> Result<Vec<MonthlyCategoryTotal>> {
        self.check(LedgerOp::MonthlyTotals).await?;
        let expenses = self.expenses.read().await;

        let mut totals: BTreeMap<(i32, u32, ExpenseCategory), Decimal> = BTreeMap::new();
        for e in expenses.iter().filter(|e| e.owner == email) {
            *totals
                .entry((e.date.year(), e.date.month(), e.category))
                .or_insert(Decimal::ZERO) += e.amount;
        }

        Ok(totals
            .into_iter()
            .map(|((year, month, category), total)| MonthlyCategoryTotal {
                year,
                month,
                category,
                total,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemberShare;
    use chrono::{TimeZone, Utc};

    fn expense(owner: &str, members: &[&str], group_id: Uuid, amount: Decimal) -> ExpenseRecord {
        let per_member = amount / Decimal::from(members.len());
        ExpenseRecord {
            expense_id: Uuid::new_v4(),
            group_id,
            amount,
            category: ExpenseCategory::Food,
            date: Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap(),
            owner: owner.to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
            shares: members
                .iter()
                .map(|m| MemberShare {
                    member: m.to_string(),
                    amount_owed: per_member,
                    paid: false,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_owed_shares_skip_own_expenses() {
        let ledger = InMemoryLedger::new();
        let group = Uuid::new_v4();
        ledger
            .insert_expense(expense("ava@x.io", &["ava@x.io", "ben@x.io"], group, Decimal::from(100)))
            .await;
        ledger
            .insert_expense(expense("ben@x.io", &["ava@x.io", "ben@x.io"], group, Decimal::from(60)))
            .await;

        assert_eq!(ledger.sum_owed_shares("ava@x.io").await.unwrap(), Decimal::from(30));
        assert_eq!(ledger.sum_owed_shares("ben@x.io").await.unwrap(), Decimal::from(50));
    }

    #[tokio::test]
    async fn test_sums_without_records_are_positive_zero() {
        let ledger = InMemoryLedger::new();
        let range = DateRange {
            start: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            end: None,
        };

        let sums = [
            ledger.sum_by_owner("ava@x.io").await.unwrap(),
            ledger.sum_by_owner_in_range("ava@x.io", range).await.unwrap(),
            ledger.sum_owed_shares("ava@x.io").await.unwrap(),
            ledger.sum_settled_by_payer("ava@x.io").await.unwrap(),
        ];
        for sum in sums {
            assert!(sum.is_zero());
            assert!(sum.is_sign_positive());
            assert_eq!(sum.to_string(), "0");
        }
    }

    #[tokio::test]
    async fn test_sums_ignore_insertion_order() {
        let group = Uuid::new_v4();
        let amounts = [Decimal::new(1, 1), Decimal::new(2, 1), Decimal::new(3, 1)];

        let forward = InMemoryLedger::new();
        let backward = InMemoryLedger::new();
        for amount in amounts {
            forward.insert_expense(expense("ava@x.io", &["ava@x.io"], group, amount)).await;
        }
        for amount in amounts.iter().rev() {
            backward.insert_expense(expense("ava@x.io", &["ava@x.io"], group, *amount)).await;
        }

        let expected = Decimal::new(6, 1);
        assert_eq!(forward.sum_by_owner("ava@x.io").await.unwrap(), expected);
        assert_eq!(backward.sum_by_owner("ava@x.io").await.unwrap(), expected);
        assert_eq!(
            forward.sum_by_owner_per_category("ava@x.io").await.unwrap(),
            backward.sum_by_owner_per_category("ava@x.io").await.unwrap()
        );
        assert_eq!(
            forward.sum_by_member_per_group("ava@x.io").await.unwrap(),
            vec![(group, expected)]
        );
    }

    #[tokio::test]
    async fn test_membership_counts() {
        let ledger = InMemoryLedger::new();
        ledger
            .insert_group(GroupRecord {
                group_id: Uuid::new_v4(),
                name: "Trip".to_string(),
                members: vec!["ava@x.io".into(), "ben@x.io".into(), "cy@x.io".into()],
            })
            .await;
        ledger
            .insert_group(GroupRecord {
                group_id: Uuid::new_v4(),
                name: "Flat".to_string(),
                members: vec!["ava@x.io".into(), "ben@x.io".into()],
            })
            .await;
        ledger
            .insert_group(GroupRecord {
                group_id: Uuid::new_v4(),
                name: "Office".to_string(),
                members: vec!["cy@x.io".into()],
            })
            .await;

        assert_eq!(ledger.count_groups_for_member("ava@x.io").await.unwrap(), 2);
        assert_eq!(ledger.count_group_memberships("ava@x.io").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_forced_failure() {
        let ledger = InMemoryLedger::new();
        ledger.fail_on(LedgerOp::SumSettled).await;

        assert!(ledger.sum_settled_by_payer("ava@x.io").await.is_err());
        assert!(ledger.sum_by_owner("ava@x.io").await.is_ok());
    }
}
