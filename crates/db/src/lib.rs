//! Database layer for pollchain.

pub mod entities;
pub mod migrations;
pub mod repositories;
pub mod store;
pub mod test_utils;

pub use entities::PollKind;
pub use repositories::PollRepository;
pub use store::{
    Ballot, CastOutcome, ChoiceMap, NewPoll, PollStore, PollSummary, SharedPollStore, Tally,
    VoteRejection, validate_selection,
};

use pollchain_common::{AppError, Backoff, Config};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::log::LevelFilter;
use tracing::{info, warn};

/// Initialize database connection.
///
/// Each attempt connects and pings within a budget that grows per
/// [`Backoff::startup`]; the call fails once every attempt is used up.
pub async fn init(config: &Config) -> Result<DatabaseConnection, AppError> {
    let mut opt = ConnectOptions::new(&config.database.url);

    opt.max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    let backoff = Backoff::startup();
    let mut last_error = String::from("no connection attempted");
    for (attempt, budget) in backoff.budgets().enumerate() {
        let attempt = attempt as u32 + 1;
        match tokio::time::timeout(budget, connect_and_ping(opt.clone())).await {
            Ok(Ok(db)) => {
                info!(attempt, "Database connection verified");
                return Ok(db);
            }
            Ok(Err(e)) => last_error = e.to_string(),
            Err(_) => last_error = format!("no answer within {budget:?}"),
        }
        warn!(
            attempt,
            max_attempts = backoff.max_attempts,
            error = %last_error,
            "Database connection attempt failed"
        );
        if backoff.should_retry(attempt) {
            tokio::time::sleep(budget).await;
        }
    }

    Err(AppError::Unavailable(format!(
        "Database unreachable after {} attempts: {last_error}",
        backoff.max_attempts
    )))
}

async fn connect_and_ping(opt: ConnectOptions) -> Result<DatabaseConnection, sea_orm::DbErr> {
    let db = Database::connect(opt).await?;
    db.ping().await?;
    Ok(db)
}

/// Run pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    use sea_orm_migration::MigratorTrait;
    migrations::Migrator::up(db, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
