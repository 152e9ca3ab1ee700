use sqlx::{migrate::Migrator, Executor, Pool, SqlitePool};
use tracing::{debug, Level};
use tracing_subscriber::{
    fmt::writer::MakeWriterExt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::position_store::StoreError;

pub mod config;

pub type DB = sqlx::Sqlite;

static MIGRATOR: Migrator = sqlx::migrate!(); // defaults to "./migrations"

// A single connection that is never recycled, closed by the caller at run end.
pub async fn connect_to_db(database_url: &str) -> Result<SqlitePool, StoreError> {
    let sqlx_options = sqlx::pool::PoolOptions::<DB>::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                let statements = vec![
                    "PRAGMA journal_mode = WAL;",
                    "PRAGMA synchronous = NORMAL;",
                    "PRAGMA busy_timeout = 15000;",
                ];

                for statement in statements {
                    conn.execute(statement).await?;
                }

                Ok(())
            })
        });

    let sqlx_pool: Pool<DB> = sqlx_options.connect(database_url).await?;
    migrate(&sqlx_pool).await?;
    debug!("Connected to {}", database_url);

    Ok(sqlx_pool)
}

async fn migrate(pool: &SqlitePool) -> Result<(), StoreError> {
    if let Err(err) = MIGRATOR.run(pool).await {
        pool.close().await;
        return Err(err.into());
    }

    Ok(())
}

pub fn setup_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::Layer::new()
                .with_writer(std::io::stdout.with_max_level(Level::INFO))
                .compact(),
        )
        .init();
}

#[cfg(test)]
pub async fn connect_in_memory() -> SqlitePool {
    connect_to_db("sqlite::memory:")
        .await
        .expect("in-memory database")
}
