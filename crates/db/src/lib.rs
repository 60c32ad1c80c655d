//! SQLite connection pool factory and migration runner.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use catalog_kernel::settings::DatabaseSettings;
use catalog_kernel::{Migration, Module};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

const MIGRATIONS_TABLE: &str = "_catalog_migrations";

/// Open a connection pool for the configured database.
///
/// In-memory databases live only as long as their connection, so they are
/// pinned to a single connection that is never recycled.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&settings.url)
        .with_context(|| format!("invalid database url '{}'", settings.url))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool_options = if is_in_memory(&settings.url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
    } else {
        SqlitePoolOptions::new().max_connections(settings.max_connections.max(1))
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to '{}'", settings.url))?;

    tracing::info!(target: "catalog-db", url = %settings.url, "database pool ready");
    Ok(pool)
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Apply every migration not yet recorded in the bookkeeping table.
///
/// Each migration runs in its own transaction together with its bookkeeping
/// row. Returns the number of migrations applied by this call.
pub async fn run_migrations(
    pool: &SqlitePool,
    migrations: &[(String, Migration)],
) -> anyhow::Result<usize> {
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
            module TEXT NOT NULL,
            id TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (module, id)
        )"
    ))
    .execute(pool)
    .await
    .with_context(|| "failed to create migrations table")?;

    let applied: Vec<(String, String)> =
        sqlx::query(&format!("SELECT module, id FROM {MIGRATIONS_TABLE}"))
            .fetch_all(pool)
            .await
            .with_context(|| "failed to read applied migrations")?
            .into_iter()
            .map(|row| -> Result<(String, String), sqlx::Error> {
                Ok((row.try_get("module")?, row.try_get("id")?))
            })
            .collect::<Result<_, sqlx::Error>>()?;

    let mut count = 0;
    for (module, migration) in migrations {
        if applied
            .iter()
            .any(|(m, id)| m == module && id == migration.id)
        {
            continue;
        }

        tracing::info!(target: "catalog-db", %module, migration = migration.id, "applying migration");

        let mut tx = pool.begin().await?;
        sqlx::raw_sql(&migration.up)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("migration '{}/{}' failed", module, migration.id))?;
        sqlx::query(&format!(
            "INSERT INTO {MIGRATIONS_TABLE} (module, id) VALUES (?, ?)"
        ))
        .bind(module.as_str())
        .bind(migration.id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        count += 1;
    }

    Ok(count)
}

/// Core module owning the pool's lifetime.
pub struct DatabaseModule {
    pool: SqlitePool,
}

impl DatabaseModule {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Module for DatabaseModule {
    fn name(&self) -> &'static str {
        "db"
    }

    async fn init(&self, _ctx: &catalog_kernel::InitCtx<'_>) -> anyhow::Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .with_context(|| "database did not answer a liveness probe")?;
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.pool.close().await;
        tracing::info!(target: "catalog-db", "database pool closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrations() -> Vec<(String, Migration)> {
        vec![
            (
                "books".to_string(),
                Migration::new("001_init", "CREATE TABLE shelf (id INTEGER PRIMARY KEY);"),
            ),
            (
                "books".to_string(),
                Migration::new(
                    "002_label",
                    "ALTER TABLE shelf ADD COLUMN label TEXT; CREATE INDEX shelf_label ON shelf (label);",
                ),
            ),
        ]
    }

    #[test]
    fn detects_in_memory_urls() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://file.db?mode=memory"));
        assert!(!is_in_memory("sqlite://catalog.db"));
    }

    #[tokio::test]
    async fn migrations_apply_once() {
        let pool = connect(&DatabaseSettings::in_memory()).await.unwrap();

        assert_eq!(run_migrations(&pool, &migrations()).await.unwrap(), 2);
        assert_eq!(run_migrations(&pool, &migrations()).await.unwrap(), 0);

        sqlx::query("INSERT INTO shelf (label) VALUES ('fiction')")
            .execute(&pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failed_migration_is_not_recorded() {
        let pool = connect(&DatabaseSettings::in_memory()).await.unwrap();
        let broken = vec![(
            "books".to_string(),
            Migration::new("001_broken", "CREATE TABLE oops ("),
        )];

        let err = run_migrations(&pool, &broken).await.unwrap_err();
        assert!(err.to_string().contains("books/001_broken"));

        let (recorded,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM _catalog_migrations")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(recorded, 0);
    }

    #[tokio::test]
    async fn stopping_the_module_closes_the_pool() {
        let pool = connect(&DatabaseSettings::in_memory()).await.unwrap();
        let module = DatabaseModule::new(pool.clone());

        module.stop().await.unwrap();
        assert!(pool.is_closed());
    }
}
