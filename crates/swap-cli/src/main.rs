use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "swap", version, about = "SkateSwap marketplace backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API.
    Serve,
    /// Apply pending database migrations.
    Migrate,
    /// Create the test user and sample listings.
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = swap_api::load_config()?;
            swap_api::run(config).await?;
        }
        Commands::Migrate => {
            swap_core::logging::init("swap-cli");
            let database_url = swap_core::config::required_env("DATABASE_URL")?;
            let pool = swap_core::db::connect(&database_url).await?;
            swap_core::migrations::run(&pool).await?;
            tracing::info!("migrations applied");
        }
        Commands::Seed => {
            swap_core::logging::init("swap-cli");
            let database_url = swap_core::config::required_env("DATABASE_URL")?;
            let pool = swap_core::db::connect(&database_url).await?;
            swap_core::migrations::run(&pool).await?;
            let report = swap_api::seed::seed(&pool).await?;
            if !report.test_user_created && report.listings_created == 0 {
                tracing::info!("database already seeded");
            } else {
                tracing::info!(
                    test_user_created = report.test_user_created,
                    listings_created = report.listings_created,
                    "database seeded"
                );
            }
        }
    }

    Ok(())
}
