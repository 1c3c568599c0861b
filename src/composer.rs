//! Deterministic answer composition
//!
//! Fixed-format answers for the intents that have one. Returning `None`
//! hands the query to the fallback pipeline.

use crate::classifier::Intent;
use crate::models::FinancialSnapshot;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};

pub const CURRENCY_SYMBOL: &str = "₹";

/// Help text listing the supported question types
pub const CAPABILITY_MENU: &str = "Hello! I am your financial assistant. I can help you with:
- Checking your total expenses
- Viewing last month's expenses
- Getting a category-wise breakdown
- Checking expenses within groups
- Tracking how much you owe or have settled
- Comparing spending across time periods
- Providing savings advice based on your spending

Quick questions you can try:
1. What is my total expense?
2. How much did I spend last month?
3. Give me a category-wise breakdown
4. How much do I owe?
5. Show my group expenses

How can I assist you today?";

pub const NO_GROUP_EXPENSES_MESSAGE: &str = "No group expenses found.";

lazy_static! {
    static ref SPENDING_ON: Regex = Regex::new(r"(?i)spending on (\w+)").unwrap();
}

/// Format an amount as `₹1234.50`, half away from zero. Never prints `-0.00`.
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        rounded = Decimal::ZERO;
    }
    format!("{}{:.2}", CURRENCY_SYMBOL, rounded)
}

/// Compose the fixed answer for `intent`, if it has one.
pub fn compose(intent: Intent, snapshot: &FinancialSnapshot, raw_query: &str) -> Option<String> {
    if intent.is_reserved() {
        return None;
    }

    let name = &snapshot.identity.display_name;

    let answer = match intent {
        Intent::Greeting => format!("Hello {}! {}", name, CAPABILITY_MENU),
        Intent::Identity => format!("You are {}, a valued member of PennyShare.", name),
        Intent::TotalExpenses => format!(
            "Your total expenses are {}.",
            format_amount(snapshot.total_expenses)
        ),
        Intent::LastMonthExpenses => format!(
            "Last month's expenses: {}.",
            format_amount(snapshot.last_month_expenses)
        ),
        Intent::CategoryExpenses => compose_category(snapshot, raw_query),
        Intent::GroupCount => format!("You are part of {} groups.", snapshot.group_count),
        Intent::GroupMembers => format!(
            "Your groups have {} total members.",
            snapshot.total_group_members
        ),
        Intent::GroupExpenses => compose_groups(snapshot),
        Intent::OwedAmount => format!(
            "You currently owe {} to others.",
            format_amount(snapshot.owed_amount)
        ),
        Intent::SettledAmount => format!(
            "You've settled {} so far.",
            format_amount(snapshot.settled_amount)
        ),
        _ => return None,
    };

    Some(answer)
}

fn compose_category(snapshot: &FinancialSnapshot, raw_query: &str) -> String {
    if let Some(caps) = SPENDING_ON.captures(raw_query) {
        let wanted = caps.get(1).map(|m| m.as_str()).unwrap_or_default().to_lowercase();

        return match snapshot.category_total(&wanted) {
            Some(found) => format!(
                "You've spent {} on {}.",
                format_amount(found.total),
                found.category
            ),
            None => format!("No expenses found for {}.", wanted),
        };
    }

    let breakdown: Vec<String> = snapshot
        .category_breakdown
        .iter()
        .map(|c| format!("{}: {}", c.category, format_amount(c.total)))
        .collect();

    format!("Here's your category-wise spending:\n{}", breakdown.join("\n"))
}

// All groups are listed; the target flag is only consumed by the fallback prompt
fn compose_groups(snapshot: &FinancialSnapshot) -> String {
    if snapshot.group_expenses.is_empty() {
        return NO_GROUP_EXPENSES_MESSAGE.to_string();
    }

    snapshot
        .group_expenses
        .iter()
        .map(|g| format!("{}: {}", g.name, format_amount(g.total)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::IntentClassifier;
    use crate::models::{CategoryTotal, ExpenseCategory, GroupTotal, UserIdentity};
    use chrono::Utc;
    use uuid::Uuid;

    fn snapshot() -> FinancialSnapshot {
        FinancialSnapshot {
            identity: UserIdentity {
                display_name: "Ava".to_string(),
                email: "ava@example.com".to_string(),
            },
            total_expenses: Decimal::new(12345, 1),
            category_breakdown: vec![
                CategoryTotal { category: ExpenseCategory::Food, total: Decimal::from(200) },
                CategoryTotal { category: ExpenseCategory::Transportation, total: Decimal::from(50) },
            ],
            last_month_expenses: Decimal::new(99999, 3),
            last_three_months_expenses: Decimal::from(400),
            group_expenses: vec![
                GroupTotal {
                    group_id: Uuid::new_v4(),
                    name: "Roommates".to_string(),
                    total: Decimal::from(300),
                    is_target_group: false,
                },
                GroupTotal {
                    group_id: Uuid::new_v4(),
                    name: "Trip".to_string(),
                    total: Decimal::new(7525, 2),
                    is_target_group: false,
                },
            ],
            group_count: 2,
            total_group_members: 7,
            owed_amount: Decimal::from(12),
            settled_amount: Decimal::ZERO,
            monthly_category_trend: vec![],
            target_group: None,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_greeting_includes_menu() {
        let answer = compose(Intent::Greeting, &snapshot(), "hello").unwrap();
        assert!(answer.starts_with("Hello Ava! "));
        assert!(answer.ends_with(CAPABILITY_MENU));
    }

    #[test]
    fn test_amounts_have_two_decimals() {
        let s = snapshot();
        assert_eq!(
            compose(Intent::TotalExpenses, &s, "total expenses").unwrap(),
            "Your total expenses are ₹1234.50."
        );
        assert_eq!(
            compose(Intent::LastMonthExpenses, &s, "last month").unwrap(),
            "Last month's expenses: ₹100.00."
        );
        assert_eq!(
            compose(Intent::OwedAmount, &s, "how much do i owe").unwrap(),
            "You currently owe ₹12.00 to others."
        );
        assert_eq!(
            compose(Intent::SettledAmount, &s, "paid back").unwrap(),
            "You've settled ₹0.00 so far."
        );
    }

    #[test]
    fn test_format_amount_rounding_and_zero() {
        assert_eq!(format_amount(Decimal::ZERO), "₹0.00");
        assert_eq!(format_amount(-Decimal::ZERO), "₹0.00");
        assert_eq!(format_amount(Decimal::new(-1, 3)), "₹0.00");
        assert_eq!(format_amount(Decimal::new(5, 3)), "₹0.01");
        assert_eq!(format_amount(Decimal::new(1234567, 3)), "₹1234.57");
        assert_eq!(format_amount(Decimal::from(42)), "₹42.00");
    }

    #[test]
    fn test_zero_activity_snapshot() {
        let mut s = snapshot();
        s.total_expenses = Decimal::ZERO;
        s.last_month_expenses = -Decimal::ZERO;
        s.owed_amount = Decimal::ZERO;
        s.settled_amount = Decimal::ZERO;
        s.category_breakdown.clear();
        s.group_expenses.clear();

        assert_eq!(
            compose(Intent::TotalExpenses, &s, "total expenses").unwrap(),
            "Your total expenses are ₹0.00."
        );
        assert_eq!(
            compose(Intent::LastMonthExpenses, &s, "last month").unwrap(),
            "Last month's expenses: ₹0.00."
        );
        assert_eq!(
            compose(Intent::OwedAmount, &s, "my debt").unwrap(),
            "You currently owe ₹0.00 to others."
        );
        assert_eq!(
            compose(Intent::CategoryExpenses, &s, "spending on food").unwrap(),
            "No expenses found for food."
        );
        assert_eq!(
            compose(Intent::GroupExpenses, &s, "group expenses").unwrap(),
            NO_GROUP_EXPENSES_MESSAGE
        );
    }

    #[test]
    fn test_identity_and_counts() {
        let s = snapshot();
        assert_eq!(
            compose(Intent::Identity, &s, "who am i").unwrap(),
            "You are Ava, a valued member of PennyShare."
        );
        assert_eq!(
            compose(Intent::GroupCount, &s, "group count").unwrap(),
            "You are part of 2 groups."
        );
        assert_eq!(
            compose(Intent::GroupMembers, &s, "group members").unwrap(),
            "Your groups have 7 total members."
        );
    }

    #[test]
    fn test_single_category_lookup_is_case_insensitive() {
        let s = snapshot();
        let lower = compose(Intent::CategoryExpenses, &s, "spending on food").unwrap();
        let upper = compose(Intent::CategoryExpenses, &s, "spending on FOOD").unwrap();

        assert_eq!(lower, "You've spent ₹200.00 on Food.");
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_missing_category() {
        let answer = compose(Intent::CategoryExpenses, &snapshot(), "spending on Rent").unwrap();
        assert_eq!(answer, "No expenses found for rent.");
    }

    #[test]
    fn test_full_breakdown() {
        let answer = compose(Intent::CategoryExpenses, &snapshot(), "category breakdown").unwrap();
        assert_eq!(
            answer,
            "Here's your category-wise spending:\nFood: ₹200.00\nTransportation: ₹50.00"
        );
    }

    #[test]
    fn test_group_expenses() {
        let s = snapshot();
        assert_eq!(
            compose(Intent::GroupExpenses, &s, "group expenses").unwrap(),
            "Roommates: ₹300.00\nTrip: ₹75.25"
        );

        let mut empty = s.clone();
        empty.group_expenses.clear();
        assert_eq!(
            compose(Intent::GroupExpenses, &empty, "group expenses").unwrap(),
            NO_GROUP_EXPENSES_MESSAGE
        );
    }

    #[test]
    fn test_targeted_group_still_lists_every_group() {
        let s = snapshot().with_target_group("trip");
        let answer = compose(Intent::GroupExpenses, &s, "group expenses for group trip").unwrap();
        assert_eq!(answer.lines().count(), 2);
    }

    #[test]
    fn test_reserved_intents_fall_through() {
        let s = snapshot();
        let reserved: Vec<Intent> = IntentClassifier::table()
            .order()
            .filter(Intent::is_reserved)
            .collect();
        assert_eq!(reserved.len(), 4);

        for intent in reserved {
            assert!(compose(intent, &s, "anything").is_none());
        }
        for intent in IntentClassifier::table().order().filter(|i| !i.is_reserved()) {
            assert!(compose(intent, &s, "anything").is_some(), "{}", intent);
        }
    }
}
