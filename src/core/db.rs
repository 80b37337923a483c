use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use diesel::{Connection, PgConnection};
use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::bb8::Pool;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness};

pub type DbPool = Pool<AsyncPgConnection>;

/// Connection checkout is bounded so a saturated pool surfaces an error
/// instead of hanging the caller.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn build_pool(database_url: &str) -> Result<DbPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    let pool = Pool::builder()
        .connection_timeout(POOL_CONNECTION_TIMEOUT)
        .build(manager)
        .await
        .context("Failed to build DB connection pool")?;
    Ok(pool)
}

/// Runs embedded migrations on a dedicated blocking connection. diesel's
/// migration harness is synchronous, so this must not run on the async
/// executor threads.
pub async fn run_migrations_blocking(
    migrations: EmbeddedMigrations,
    database_url: &str,
) -> Result<usize> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = PgConnection::establish(&database_url)
            .context("Failed to establish migration connection")?;
        let versions = conn
            .run_pending_migrations(migrations)
            .map_err(|err| anyhow!("Failed to run migrations: {err}"))?;
        Ok(versions.len())
    })
    .await
    .context("Migration task panicked")?
}
