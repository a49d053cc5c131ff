//! Demo account seeder for Tollgate development and testing.
//!
//! Inserts one complimentary and one paying account into an already migrated
//! database, so a billing session can be opened against either.
//!
//! Usage: DBPATH=/var/lib/tollgate cargo run --bin seeder

use anyhow::Context;
use sea_orm::{EntityTrait, NotSet, Set};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tollgate_db::Store;
use tollgate_db::entities::accounts;
use tollgate_db::ledger::COMPLIMENTARY;
use tollgate_shared::AppConfig;

/// Placeholder credential; demo accounts never log in through a real check.
const DEMO_ENCRYPT: &str = "!demo";

struct DemoAccount {
    uid: i64,
    name: &'static str,
    complimentary: bool,
    minutes: i64,
}

const DEMO_ACCOUNTS: [DemoAccount; 2] = [
    DemoAccount {
        uid: 100_000,
        name: "Guest",
        complimentary: true,
        minutes: 0,
    },
    DemoAccount {
        uid: 100_001,
        name: "Subscriber",
        complimentary: false,
        minutes: 600,
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tollgate=debug,seeder=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let store = tollgate_db::connect(&config.database)
        .await
        .context("Failed to open database")?;
    let mut store = store.lock().await;

    for account in &DEMO_ACCOUNTS {
        seed_account(&store, account).await?;
    }

    store.disconnect().await.context("Failed to commit seed")?;
    info!("Seeding complete");
    Ok(())
}

async fn seed_account(store: &Store, account: &DemoAccount) -> anyhow::Result<()> {
    let txn = store.transaction()?;

    if accounts::Entity::find_by_id(account.uid)
        .one(txn)
        .await?
        .is_some()
    {
        info!(uid = account.uid, "Account already exists, skipping");
        return Ok(());
    }

    let model = accounts::ActiveModel {
        uid: Set(account.uid),
        name: Set(account.name.to_string()),
        name_key: Set(account.name.to_lowercase()),
        encrypt: Set(DEMO_ENCRYPT.to_string()),
        complimentary: Set(if account.complimentary { COMPLIMENTARY } else { "N" }.to_string()),
        minutes: Set(account.minutes),
        status: NotSet,
        created: NotSet,
    };
    accounts::Entity::insert(model)
        .exec(txn)
        .await
        .with_context(|| format!("Failed to insert account {}", account.uid))?;

    info!(
        uid = account.uid,
        name = account.name,
        complimentary = account.complimentary,
        minutes = account.minutes,
        "Created demo account"
    );
    Ok(())
}
