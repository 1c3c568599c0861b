//! Postgres-backed ledger reader
//!
//! Issues read-only aggregation queries against the schema in
//! `sql/ledger_schema.sql`. Connections are established lazily.

use super::{DateRange, LedgerStore};
use crate::error::AssistantError;
use crate::models::{CategoryTotal, ExpenseCategory, MonthlyCategoryTotal, UserProfile};
use crate::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn connect_lazy(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(database_url)?;

        info!("Ledger backend: postgres");
        Ok(Self { pool })
    }
}

fn ledger_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> AssistantError {
    move |e| AssistantError::LedgerError(format!("{}: {}", context, e))
}

#[async_trait]
impl LedgerStore for PgLedger {

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        let row = sqlx::query(
            "SELECT user_id, first_name, last_name, email FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ledger_err("Failed to load user"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(UserProfile {
            user_id: row.try_get("user_id").map_err(ledger_err("Bad user row"))?,
            first_name: row.try_get("first_name").map_err(ledger_err("Bad user row"))?,
            last_name: row.try_get("last_name").map_err(ledger_err("Bad user row"))?,
            email: row.try_get("email").map_err(ledger_err("Bad user row"))?,
        }))
    }

    async fn sum_by_owner(&self, email: &str) -> Result<Decimal> {
        sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(amount), 0)::NUMERIC FROM expenses WHERE owner_email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(ledger_err("Failed to sum expenses by owner"))
    }

    async fn sum_by_owner_per_category(&self, email: &str) -> Result<Vec<CategoryTotal>> {
        let rows = sqlx::query(
            r#"
            SELECT category, COALESCE(SUM(amount), 0)::NUMERIC AS total
            FROM expenses
            WHERE owner_email = $1
            GROUP BY category
            ORDER BY total DESC
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(ledger_err("Failed to sum expenses by category"))?;

        // Labels outside the closed set collapse into Others
        let mut totals: HashMap<ExpenseCategory, Decimal> = HashMap::new();
        for row in rows {
            let label: String = row.try_get("category").map_err(ledger_err("Bad category row"))?;
            let total: Decimal = row.try_get("total").map_err(ledger_err("Bad category row"))?;
            *totals.entry(ExpenseCategory::from_label(&label)).or_insert(Decimal::ZERO) += total;
        }

        Ok(totals
            .into_iter()
            .map(|(category, total)| CategoryTotal { category, total })
            .collect())
    }

    async fn sum_by_owner_in_range(&self, email: &str, range: DateRange) -> Result<Decimal> {
        sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(amount), 0)::NUMERIC
            FROM expenses
            WHERE owner_email = $1
              AND expense_date >= $2
              AND ($3::TIMESTAMPTZ IS NULL OR expense_date < $3)
            "#,
        )
        .bind(email)
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await
        .map_err(ledger_err("Failed to sum expenses in range"))
    }

    async fn sum_by_member_per_group(&self, email: &str) -> Result<Vec<(Uuid, Decimal)>> {
        let rows = sqlx::query(
            r#"
            SELECT e.group_id, COALESCE(SUM(e.amount), 0)::NUMERIC AS total
            FROM expenses e
            JOIN expense_members em ON em.expense_id = e.expense_id
            WHERE em.member_email = $1
            GROUP BY e.group_id
            ORDER BY total DESC
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(ledger_err("Failed to sum group expenses"))?;

        rows.into_iter()
            .map(|row| {
                let group_id: Uuid = row.try_get("group_id").map_err(ledger_err("Bad group row"))?;
                let total: Decimal = row.try_get("total").map_err(ledger_err("Bad group row"))?;
                Ok((group_id, total))
            })
            .collect()
    }

    async fn group_names(&self, group_ids: &[Uuid]) -> Result<HashMap<Uuid, String>> {
        if group_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query("SELECT group_id, group_name FROM groups WHERE group_id = ANY($1)")
            .bind(group_ids.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(ledger_err("Failed to load group names"))?;

        rows.into_iter()
            .map(|row| {
                let group_id: Uuid = row.try_get("group_id").map_err(ledger_err("Bad group row"))?;
                let name: String = row.try_get("group_name").map_err(ledger_err("Bad group row"))?;
                Ok((group_id, name))
            })
            .collect()
    }

    async fn sum_owed_shares(&self, email: &str) -> Result<Decimal> {
        sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(em.amount_owed), 0)::NUMERIC
            FROM expense_members em
            JOIN expenses e ON e.expense_id = em.expense_id
            WHERE em.member_email = $1 AND e.owner_email <> $1
            "#,
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(ledger_err("Failed to sum owed shares"))
    }

    async fn sum_settled_by_payer(&self, email: &str) -> Result<Decimal> {
        sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(amount), 0)::NUMERIC FROM settlements WHERE settle_from = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(ledger_err("Failed to sum settlements"))
    }

    async fn count_groups_for_member(&self, email: &str) -> Result<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT group_id) FROM group_members WHERE member_email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(ledger_err("Failed to count groups"))?;

        Ok(count.max(0) as u64)
    }

    async fn count_group_memberships(&self, email: &str) -> Result<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM group_members gm
            WHERE gm.group_id IN (
              SELECT group_id FROM group_members WHERE member_email = $1
            )
            "#,
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(ledger_err("Failed to count group memberships"))?;

        Ok(count.max(0) as u64)
    }

    async fn monthly_category_totals(&self, email: &str) -> Result<Vec<MonthlyCategoryTotal>> {
        let rows = sqlx::query(
            r#"
            SELECT
              EXTRACT(YEAR FROM expense_date AT TIME ZONE 'UTC')::INT4 AS year,
              EXTRACT(MONTH FROM expense_date AT TIME ZONE 'UTC')::INT4 AS month,
              category,
              COALESCE(SUM(amount), 0)::NUMERIC AS total
            FROM expenses
            WHERE owner_email = $1
            GROUP BY 1, 2, 3
            ORDER BY 1 ASC, 2 ASC
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(ledger_err("Failed to load monthly category totals"))?;

        rows.into_iter()
            .map(|row| {
                let year: i32 = row.try_get("year").map_err(ledger_err("Bad trend row"))?;
                let month: i32 = row.try_get("month").map_err(ledger_err("Bad trend row"))?;
                let label: String = row.try_get("category").map_err(ledger_err("Bad trend row"))?;
                let total: Decimal = row.try_get("total").map_err(ledger_err("Bad trend row"))?;

                Ok(MonthlyCategoryTotal {
                    year,
                    month: month.max(1) as u32,
                    category: ExpenseCategory::from_label(&label),
                    total,
                })
            })
            .collect()
    }
}
