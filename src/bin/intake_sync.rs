use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use intake_sync::shared::logging;
use intake_sync::{AppConfig, AppState, IntakeRecord, RecordId, RecordStatus};
use tracing::info;

#[derive(Parser)]
#[command(name = "intake-sync")]
#[command(about = "Offline-first intake record store and sync engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database URL
    #[arg(long, env = "INTAKE_DATABASE_URL")]
    database_url: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List local records, most recently modified first
    List {
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// Print one record as JSON
    Show { id: String },
    /// Create a draft intake record and queue it for sync
    New {
        /// Consigner name for a new consigner
        #[arg(long, conflicts_with = "number", required_unless_present = "number")]
        name: Option<String>,
        /// Consigner number for an existing consigner
        #[arg(long)]
        number: Option<String>,
        /// Record id; a random one is assigned when omitted
        #[arg(long)]
        id: Option<String>,
    },
    /// Print the sync status feed
    Status,
    /// Run one full push and pull
    Sync,
    /// Run the scheduler and realtime channel until Ctrl+C
    Run,
    /// Delete every local record and queued change
    Reset,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Draft,
    Signed,
}

impl From<StatusArg> for RecordStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Draft => RecordStatus::Draft,
            StatusArg::Signed => RecordStatus::Signed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.json_logs);

    let mut config = AppConfig::from_env();
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    let state = AppState::new(config).await?;

    match cli.command {
        Commands::List { status } => {
            let records = state.records.list_records(status.map(Into::into)).await?;
            for local in records {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    local.id(),
                    local.record.status,
                    local.sync_state,
                    local.local_modified_at.to_rfc3339(),
                    local.last_error.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Show { id } => {
            let id: RecordId = id.parse().map_err(|err: String| anyhow!(err))?;
            let local = state
                .records
                .load_local(&id)
                .await?
                .ok_or_else(|| anyhow!("record {id} not found"))?;
            println!("{}", serde_json::to_string_pretty(&local)?);
        }
        Commands::New { name, number, id } => {
            let id = match id {
                Some(id) => id.parse().map_err(|err: String| anyhow!(err))?,
                None => RecordId::generate(),
            };
            let record = match (name, number) {
                (Some(name), _) => IntakeRecord::for_new_consigner(id, name),
                (None, Some(number)) => IntakeRecord::for_existing_consigner(id, number),
                (None, None) => return Err(anyhow!("either --name or --number is required")),
            };
            let id = state.records.save_record(record).await?;
            println!("{id}");
        }
        Commands::Status => {
            println!("{}", serde_json::to_string_pretty(&state.records.status())?);
        }
        Commands::Sync => {
            let report = state.sync.sync_now().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Run => {
            state.sync.start().await;
            let initial = state.sync.sync_now().await;
            info!(
                pushed = initial.push.succeeded,
                pending = initial.push.remaining,
                "initial sync finished"
            );

            let mut status = state.sync.subscribe_status();
            info!("intake-sync is running. Press Ctrl+C to stop.");
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = status.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = status.borrow_and_update().clone();
                        info!(
                            online = snapshot.online,
                            syncing = snapshot.syncing,
                            pending = snapshot.pending_count,
                            discarded = snapshot.discarded_count,
                            last_error = snapshot.last_error.as_deref().unwrap_or(""),
                            "sync status"
                        );
                    }
                }
            }
            info!("shutting down");
        }
        Commands::Reset => {
            state.records.clear_all().await?;
            println!("local data cleared");
        }
    }

    state.shutdown().await;
    Ok(())
}
