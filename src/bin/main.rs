use chrono::{Duration, Utc};
use ledger_query_assistant::{
    aggregator::FinancialContextAggregator,
    agent::Orchestrator,
    completion::GeminiClient,
    config::AssistantConfig,
    ledger::{InMemoryLedger, LedgerStore, PgLedger},
    models::{ExpenseCategory, ExpenseRecord, GroupRecord, MemberShare, SettlementRecord, UserProfile},
    pipeline::FinancialPipeline,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const USAGE: &str = "usage: assistant <user-id> <question...>\n       assistant --demo <question...>";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((first, rest)) = args.split_first() else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };
    let question = rest.join(" ");

    let config = AssistantConfig::from_env()?;

    let (ledger, user_id): (Arc<dyn LedgerStore>, Uuid) = if first == "--demo" {
        let demo = Arc::new(InMemoryLedger::new());
        let user_id = seed_demo_ledger(&demo).await;
        (demo, user_id)
    } else {
        let user_id = Uuid::parse_str(first).map_err(|e| format!("invalid user id {}: {}", first, e))?;
        let url = config
            .database_url
            .as_deref()
            .ok_or("DATABASE_URL must be set unless --demo is used")?;
        let ledger = PgLedger::connect_lazy(url, config.database_max_connections)?;
        (Arc::new(ledger), user_id)
    };

    let provider = GeminiClient::new(
        config.gemini_api_key.clone(),
        &config.gemini_model,
        &config.gemini_base_url,
    )?;

    let pipeline = FinancialPipeline::from_config(&config, Arc::new(provider))?;
    let orchestrator = Orchestrator::new(FinancialContextAggregator::new(ledger), pipeline);

    info!(user_id = %user_id, "Answering question");

    match orchestrator.answer(&question, user_id).await {
        Ok(answer) => {
            println!("{}", answer.message);
            Ok(())
        }
        Err(e) => {
            eprintln!("Query failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}

/// Two groups, a handful of expenses across the last few months, one settlement.
async fn seed_demo_ledger(ledger: &InMemoryLedger) -> Uuid {
    let user_id = Uuid::new_v4();
    let me = "ava@example.com".to_string();
    let roommate = "ben@example.com".to_string();
    let friend = "chloe@example.com".to_string();

    ledger
        .insert_user(UserProfile {
            user_id,
            first_name: "Ava".to_string(),
            last_name: "Shah".to_string(),
            email: me.clone(),
        })
        .await;

    let flat = GroupRecord {
        group_id: Uuid::new_v4(),
        name: "Flat 4B".to_string(),
        members: vec![me.clone(), roommate.clone()],
    };
    let trip = GroupRecord {
        group_id: Uuid::new_v4(),
        name: "Goa Trip".to_string(),
        members: vec![me.clone(), roommate.clone(), friend.clone()],
    };

    let now = Utc::now();
    let expenses = [
        (&flat, 1800, ExpenseCategory::Utilities, 12, roommate.clone()),
        (&flat, 2400, ExpenseCategory::Groceries, 40, me.clone()),
        (&trip, 3600, ExpenseCategory::Transportation, 65, me.clone()),
        (&trip, 1500, ExpenseCategory::Food, 63, friend.clone()),
        (&trip, 900, ExpenseCategory::Entertainment, 62, me.clone()),
    ];

    for (group, rupees, category, days_ago, owner) in expenses {
        let amount = Decimal::from(rupees);
        let per_head = amount / Decimal::from(group.members.len());
        ledger
            .insert_expense(ExpenseRecord {
                expense_id: Uuid::new_v4(),
                group_id: group.group_id,
                amount,
                category,
                date: now - Duration::days(days_ago),
                owner: owner.clone(),
                members: group.members.clone(),
                shares: group
                    .members
                    .iter()
                    .filter(|m| **m != owner)
                    .map(|m| MemberShare {
                        member: m.clone(),
                        amount_owed: per_head,
                        paid: false,
                    })
                    .collect(),
            })
            .await;
    }

    ledger
        .insert_settlement(SettlementRecord {
            settlement_id: Uuid::new_v4(),
            group_id: trip.group_id,
            payer: me.clone(),
            payee: friend,
            amount: Decimal::from(500),
            settled_at: now - Duration::days(30),
        })
        .await;

    ledger.insert_group(flat).await;
    ledger.insert_group(trip).await;

    user_id
}
