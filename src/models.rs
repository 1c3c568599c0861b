//! Core data models: ledger records and the per-request financial snapshot

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

/// Closed set of expense categories; anything unrecognised is `Others`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExpenseCategory {
    Food,
    Transportation,
    Entertainment,
    Utilities,
    Groceries,
    Others,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 6] = [
        ExpenseCategory::Food,
        ExpenseCategory::Transportation,
        ExpenseCategory::Entertainment,
        ExpenseCategory::Utilities,
        ExpenseCategory::Groceries,
        ExpenseCategory::Others,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ExpenseCategory::Food => "Food",
            ExpenseCategory::Transportation => "Transportation",
            ExpenseCategory::Entertainment => "Entertainment",
            ExpenseCategory::Utilities => "Utilities",
            ExpenseCategory::Groceries => "Groceries",
            ExpenseCategory::Others => "Others",
        }
    }

    /// Case-insensitive parse, defaulting to `Others`.
    pub fn from_label(label: &str) -> Self {
        let wanted = label.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.label().eq_ignore_ascii_case(wanted))
            .unwrap_or(ExpenseCategory::Others)
    }
}

impl Default for ExpenseCategory {
    fn default() -> Self {
        ExpenseCategory::Others
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

//
// ================= Ledger records =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    /// Stable key used by every ledger record that references this user
    pub email: String,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberShare {
    pub member: String,
    pub amount_owed: Decimal,
    pub paid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub expense_id: Uuid,
    pub group_id: Uuid,
    pub amount: Decimal,
    pub category: ExpenseCategory,
    pub date: DateTime<Utc>,
    pub owner: String,
    pub members: Vec<String>,
    pub shares: Vec<MemberShare>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub settlement_id: Uuid,
    pub group_id: Uuid,
    pub payer: String,
    pub payee: String,
    pub amount: Decimal,
    pub settled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRecord {
    pub group_id: Uuid,
    pub name: String,
    pub members: Vec<String>,
}

//
// ================= Snapshot =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserIdentity {
    pub display_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryTotal {
    pub category: ExpenseCategory,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupTotal {
    pub group_id: Uuid,
    pub name: String,
    pub total: Decimal,
    #[serde(default)]
    pub is_target_group: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyCategoryTotal {
    pub year: i32,
    pub month: u32,
    pub category: ExpenseCategory,
    pub total: Decimal,
}

/// Read projection of one user's ledger state, built fresh for every query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub identity: UserIdentity,
    pub total_expenses: Decimal,
    pub category_breakdown: Vec<CategoryTotal>,
    pub last_month_expenses: Decimal,
    pub last_three_months_expenses: Decimal,
    pub group_expenses: Vec<GroupTotal>,
    pub group_count: u64,
    pub total_group_members: u64,
    pub owed_amount: Decimal,
    pub settled_amount: Decimal,
    pub monthly_category_trend: Vec<MonthlyCategoryTotal>,
    /// Lower-cased group name the query asked about, if any
    #[serde(default)]
    pub target_group: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl FinancialSnapshot {
    /// Derive a snapshot whose group entries are flagged against `name`.
    ///
    /// Matching is case-insensitive on the trimmed name. The original value
    /// is left untouched.
    pub fn with_target_group(&self, name: &str) -> Self {
        let wanted = name.trim().to_lowercase();
        let mut derived = self.clone();

        for group in &mut derived.group_expenses {
            group.is_target_group = group.name.to_lowercase() == wanted;
        }
        derived.target_group = Some(wanted);
        derived
    }

    pub fn category_total(&self, label: &str) -> Option<&CategoryTotal> {
        self.category_breakdown
            .iter()
            .find(|c| c.category.label().eq_ignore_ascii_case(label.trim()))
    }
}
