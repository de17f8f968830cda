//! Prepares a fresh deployment: applies migrations, seeds the first admin
//! and a set of sample plans. Safe to run repeatedly.

use anyhow::{Context, Result, bail};
use be_auth_service::hash_password;
use be_remote_db::{DatabaseManager, HotspotStore, NewAdmin, NewPlan};
use dotenv::dotenv;
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

struct SamplePlan {
    name: &'static str,
    description: &'static str,
    price: i64,
    duration_hours: i32,
    speed_mbps: i32,
    data_limit_gb: Option<i32>,
}

const SAMPLE_PLANS: [SamplePlan; 3] = [
    SamplePlan {
        name: "Basic",
        description: "24 hours of browsing at 5 Mbps",
        price: 50,
        duration_hours: 24,
        speed_mbps: 5,
        data_limit_gb: Some(2),
    },
    SamplePlan {
        name: "Standard",
        description: "3 days at 10 Mbps",
        price: 100,
        duration_hours: 72,
        speed_mbps: 10,
        data_limit_gb: Some(5),
    },
    SamplePlan {
        name: "Premium",
        description: "A full week at 20 Mbps, no data cap",
        price: 200,
        duration_hours: 168,
        speed_mbps: 20,
        data_limit_gb: None,
    },
];

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

async fn seed_admin(store: &dyn HotspotStore) -> Result<()> {
    let username = env_or("SETUP_ADMIN_USERNAME", "admin");

    match store.get_admin_by_username(&username).await {
        Ok(_) => {
            info!(%username, "Admin already exists, skipping");
            return Ok(());
        }
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err).context("Failed to look up admin"),
    }

    let password = std::env::var("SETUP_ADMIN_PASSWORD").unwrap_or_default();
    if password.len() < 8 {
        bail!("SETUP_ADMIN_PASSWORD must be set to at least 8 characters");
    }

    let admin = store
        .create_admin(NewAdmin {
            username,
            password_hash: hash_password(&password)?,
            name: env_or("SETUP_ADMIN_NAME", "Admin User"),
            email: env_or("SETUP_ADMIN_EMAIL", "admin@hotspot.local"),
            role: "admin".into(),
        })
        .await
        .context("Failed to create admin")?;
    info!(username = %admin.username, "Created admin");
    Ok(())
}

async fn seed_plans(store: &dyn HotspotStore) -> Result<()> {
    let existing = store.list_plans(false).await?;

    for sample in &SAMPLE_PLANS {
        if existing.iter().any(|plan| plan.name == sample.name) {
            info!(plan = sample.name, "Plan already exists, skipping");
            continue;
        }

        store
            .create_plan(NewPlan {
                name: sample.name.into(),
                description: Some(sample.description.into()),
                price: Decimal::new(sample.price, 0),
                duration_hours: sample.duration_hours,
                speed_mbps: sample.speed_mbps,
                data_limit_gb: sample.data_limit_gb,
                is_active: true,
            })
            .await
            .with_context(|| format!("Failed to create plan {}", sample.name))?;
        info!(plan = sample.name, "Created plan");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            Targets::new()
                .with_default(LevelFilter::WARN)
                .with_target("setup", LevelFilter::INFO)
                .with_target("be_", LevelFilter::INFO),
        )
        .try_init()?;

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL environment variable must be set")?;

    info!("Applying migrations");
    let db = DatabaseManager::new(&database_url).await?;

    seed_admin(&db).await?;
    seed_plans(&db).await?;

    info!("Setup complete");
    Ok(())
}
