use anyhow::Context;
use catalog_kernel::settings::Settings;
use clap::{Parser, Subcommand};

/// Book catalog command line
#[derive(Debug, Parser)]
#[command(name = "catalog", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API until interrupted
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load catalog settings")?;

    match cli.command {
        Command::Serve => {
            catalog_telemetry::init(&settings.telemetry);
            catalog_app::app::run(settings).await
        }
        Command::Migrate => {
            catalog_telemetry::init(&settings.telemetry);
            let applied = catalog_app::app::migrate(&settings).await?;
            tracing::info!(applied, db = %settings.database.url, "migrations complete");
            println!("applied {} migration(s)", applied);
            Ok(())
        }
        Command::Config => {
            let rendered = serde_json::to_string_pretty(&settings)
                .with_context(|| "failed to render settings")?;
            println!("{}", rendered);
            Ok(())
        }
    }
}
