use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use m2w_sheet_sync::{SyncConfig, SyncError, SyncService};

#[derive(Parser)]
#[command(name = "m2w-sync", about = "Sync upcoming reservations into the guide spreadsheet")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one sync and exit
    Run,
    /// Serve the sync trigger endpoints
    Serve {
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match run(cli.command.unwrap_or(Command::Run)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("An error occurred: {e:#}");
            let code = e.downcast_ref::<SyncError>().map_or(1, SyncError::exit_code);
            ExitCode::from(code)
        }
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    let config = SyncConfig::from_env()?;
    let service = SyncService::from_config(config)?;

    match command {
        Command::Run => {
            let report = service.process_sync().await?;
            println!(
                "Data uploaded successfully: {} rows written{}",
                report.rows_written,
                report
                    .spreadsheet_url
                    .map(|url| format!(" to {url}"))
                    .unwrap_or_default()
            );
        }
        Command::Serve { bind } => {
            let app = service
                .router()
                .route("/health", axum::routing::get(|| async { "OK" }));

            let listener = TcpListener::bind(&bind).await?;
            info!("Server running on http://{}", bind);

            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
