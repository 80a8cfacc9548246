mod commands;
mod config;

use services::{Clock, ExamService};
use storage::repository::Storage;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{AppConfig, Command, prepare_sqlite_file, print_usage};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "app=info,services=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::parse(std::env::args().skip(1), |key| std::env::var(key).ok())
        .map_err(|e| {
            eprintln!("{e}");
            print_usage();
            e
        })?;
    if config.command == Command::Help {
        print_usage();
        return Ok(());
    }

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&config.db_url)?;
    let storage = Storage::sqlite(&config.db_url).await?;
    tracing::info!("Opened {}", config.db_url);

    let clock = Clock::default_clock();
    let exams = ExamService::new(storage.clone(), clock);

    match config.command {
        Command::Seed => commands::seed(&storage).await,
        Command::Paused => commands::paused(&exams, config.user_id).await,
        Command::History => commands::history(&exams, config.user_id).await,
        Command::Recover => commands::recover(&exams, config.user_id).await,
        Command::Bookmarks => commands::bookmarks(&storage, clock, config.user_id).await,
        Command::Help => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
