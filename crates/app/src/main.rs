//! Ledger entry point.

use app::config::Config;
use app::{App, AppError, connect_postgres, run_demo};
use store::InMemoryStore;

const DEMO_EMAIL: &str = "demo@example.com";

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env()?;
    app::init_tracing(&config)?;

    // 2. Build the backend and run the demonstration
    let report = match &config.database {
        Some(db) => {
            let store = connect_postgres(db).await?;
            run_demo(&App::new(store), DEMO_EMAIL).await?
        }
        None => {
            tracing::info!("no database configured, using in-memory store");
            run_demo(&App::new(InMemoryStore::new()), DEMO_EMAIL).await?
        }
    };

    tracing::info!(
        account_id = %report.account_id,
        order_id = %report.order_id,
        "demo finished"
    );
    Ok(())
}
