//! Application bootstrap: pool, registry, migrations, lifecycle, server.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use catalog_db::DatabaseModule;
use catalog_kernel::settings::Settings;
use catalog_kernel::{InitCtx, ModuleRegistry};

use crate::modules;

/// Connect to the database, register every module, and bring the schema up to date.
pub async fn build_registry(settings: &Settings) -> anyhow::Result<ModuleRegistry> {
    let pool = catalog_db::connect(&settings.database)
        .await
        .with_context(|| "failed to open the database")?;

    let mut registry = ModuleRegistry::new();
    registry.register_core(Arc::new(DatabaseModule::new(pool.clone())));
    modules::register_all(&mut registry, &pool);

    let applied = catalog_db::run_migrations(&pool, &registry.collect_migrations())
        .await
        .with_context(|| "failed to apply migrations")?;
    tracing::info!(applied, "database schema up to date");

    Ok(registry)
}

/// Apply pending migrations and exit. Returns how many were applied.
pub async fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let pool = catalog_db::connect(&settings.database).await?;
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &pool);

    let applied = catalog_db::run_migrations(&pool, &registry.collect_migrations()).await;
    pool.close().await;
    applied
}

/// Run the service until a shutdown signal arrives.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let registry = build_registry(&settings).await?;
    serve(&registry, &settings, catalog_http::shutdown_signal()).await
}

/// Bring the modules up, serve HTTP until `shutdown` resolves, then stop the
/// modules. Stop runs on every exit path, including a failed init or start.
pub async fn serve(
    registry: &ModuleRegistry,
    settings: &Settings,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let ctx = InitCtx { settings };

    let served: anyhow::Result<()> = async {
        registry.init_all(&ctx).await?;
        registry.start_all(&ctx).await?;
        catalog_http::start_server(registry, settings, shutdown).await
    }
    .await;

    let stopped = registry.stop_all().await;
    served.and(stopped)
}
