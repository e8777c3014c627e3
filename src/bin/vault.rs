//! Unified ingestion CLI: run a single ingestor against one entity id, run
//! a full historical backfill, or list what's registered. Connects without
//! running migrations -- applying migrations here can break on drifted
//! schemas, so that stays a separate, explicit operational step.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use nba_vault::config::Config;
use nba_vault::ingestor::{IngestStatus, Kwargs, SourceContexts};
use nba_vault::orchestrator::{BackfillPlan, Orchestrator, Summary};
use nba_vault::quarantine::Quarantine;
use nba_vault::registry;
use nba_vault::store::Store;
use nba_vault::tracing_setup::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "vault", version, about = "NBA Vault ingestion CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single ingestor once against one entity id.
    Ingest {
        /// Registered entity kind, e.g. "players", "games", "bulk_elo".
        kind: String,
        /// Entity id the ingestor expects; "all" for bulk/global sources.
        entity_id: String,
        /// Season label, e.g. "2019-20", for ingestors that need one.
        #[arg(long)]
        season: Option<String>,
    },
    /// Run the full six-stage historical backfill from a plan file.
    Backfill {
        /// JSON file holding a `BackfillPlan`-shaped object.
        #[arg(long)]
        plan: PathBuf,
    },
    /// List every registered entity kind.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info")?;

    let cli = Cli::parse();

    match cli.command {
        Command::List => {
            let mut kinds: Vec<&str> = registry::list_all();
            kinds.sort_unstable();
            for kind in kinds {
                println!("{kind}");
            }
            Ok(())
        }
        Command::Ingest { kind, entity_id, season } => run_ingest(&kind, &entity_id, season).await,
        Command::Backfill { plan } => run_backfill(&plan).await,
    }
}

async fn connect(config: &Config) -> anyhow::Result<(Store, SourceContexts)> {
    let store = Store::connect(&config.store_path, config.max_connections).await?;
    nba_vault::audit::create_table(&store.pool).await?;
    let contexts = SourceContexts::from_config(config)?;
    Ok((store, contexts))
}

async fn run_ingest(kind: &str, entity_id: &str, season: Option<String>) -> anyhow::Result<()> {
    let config = Config::from_env();
    let (store, contexts) = connect(&config).await?;

    let ingestor = registry::create(kind, &contexts)
        .ok_or_else(|| anyhow::anyhow!("no ingestor registered for entity kind {kind:?}"))?;

    let quarantine = Quarantine::new(config.vault_root.join("data").join("quarantine"));
    let kwargs = Kwargs {
        season,
        ..Default::default()
    };
    let cancel = CancellationToken::new();

    let result = ingestor
        .ingest_dyn(entity_id, &store.pool, &quarantine, &config.retry, kwargs, &cancel)
        .await;

    info!(
        kind,
        entity_id,
        status = ?result.status,
        rows_affected = result.rows_affected,
        "ingest finished"
    );
    if let Some(err) = &result.error_message {
        error!(kind, entity_id, error = %err, "ingest reported an error");
    }
    if result.status == IngestStatus::Failed {
        anyhow::bail!("ingest of {kind} {entity_id} failed");
    }
    Ok(())
}

async fn run_backfill(plan_path: &PathBuf) -> anyhow::Result<()> {
    let config = Config::from_env();
    let (store, contexts) = connect(&config).await?;

    let raw = tokio::fs::read_to_string(plan_path).await?;
    let plan: BackfillPlan = serde_json::from_str(&raw)?;

    let orchestrator = Orchestrator::new(store, contexts, &config);
    let cancel = CancellationToken::new();
    let results = orchestrator.run_backfill(&plan, &cancel).await;

    let summary = Summary::from_results(&results);
    info!(
        total = summary.total(),
        success = summary.success,
        empty = summary.empty,
        failed = summary.failed,
        skipped = summary.skipped,
        "backfill run complete"
    );
    if !summary.is_clean() {
        anyhow::bail!("backfill completed with {} failed entities", summary.failed);
    }
    Ok(())
}
