mod config;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::CliConfig;
use rota::core::QueryExecutor;
use rota::storage::Fixture;
use rota::{
    Clock, FixedClock, IdentityContext, MemoryStore, OperatorShifts, OperatorStatsView, SyncHandle,
    SystemClock,
};
use rota_api::OperatorId;

/// Time given to the feed to deliver a write's signal before waiting on the views.
const SIGNAL_GRACE: Duration = Duration::from_millis(25);

/// Follow an operator's assigned shifts and shift counts over a fixture store.
///
/// Prints one JSON report after the initial load and one after each scripted write.
#[derive(Debug, Parser)]
#[command(name = "rota", version)]
struct Args {
    /// YAML fixture with the store contents and an optional write script
    #[arg(short, long)]
    fixture: PathBuf,

    /// YAML settings file
    #[arg(short, long, env = "ROTA_CONFIG")]
    config: Option<PathBuf>,

    /// Operator to follow; without one the views stay idle
    #[arg(short, long)]
    operator: Option<String>,

    /// Date counted as today in the stats (YYYY-MM-DD, default: local date)
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Seconds to wait for the views to settle after each step
    #[arg(long, default_value_t = 5)]
    settle_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => CliConfig::load_from_file(path)?,
        None => CliConfig::default(),
    };

    // Logs go to stderr so stdout carries only the reports.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .context("Invalid log filter")?;
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let fixture = Fixture::load_from_file(&args.fixture)?;
    let store = Arc::new(MemoryStore::with_signal_buffer(config.sync.signal_buffer));
    fixture.seed(&store).context("Failed to seed store")?;
    info!(
        "Seeded store from {} ({} assignments, {} scripted writes)",
        args.fixture.display(),
        fixture.assignments.len(),
        fixture.script.len()
    );

    let operator = args.operator.or(config.operator).map(OperatorId::from);
    let identity = IdentityContext::new(operator);
    let clock: Arc<dyn Clock> = match args.today {
        Some(today) => Arc::new(FixedClock::new(today)),
        None => Arc::new(SystemClock),
    };

    let sync_config = Arc::new(config.sync);
    let executor = QueryExecutor::new(store.clone());
    let shifts = OperatorShifts::spawn(
        executor.clone(),
        store.clone(),
        &identity,
        sync_config.clone(),
    );
    let stats = OperatorStatsView::spawn(executor, store.clone(), &identity, clock, sync_config);

    let settle_timeout = Duration::from_secs(args.settle_secs);

    settle(shifts.handle(), settle_timeout).await;
    settle(stats.handle(), settle_timeout).await;
    print_report("initial", &identity, &shifts, &stats)?;

    for step in &fixture.script {
        let label = step.describe();
        step.apply(&store)
            .with_context(|| format!("Failed to apply {}", label))?;

        tokio::time::sleep(SIGNAL_GRACE).await;
        settle(shifts.handle(), settle_timeout).await;
        settle(stats.handle(), settle_timeout).await;
        print_report(&label, &identity, &shifts, &stats)?;
    }

    shifts.shutdown().await;
    stats.shutdown().await;
    info!("Done, {} channels left open", store.active_channels());

    Ok(())
}

/// Wait until `handle` has no fetch in flight.
async fn settle<V: Clone>(handle: &SyncHandle<V>, timeout: Duration) {
    match tokio::time::timeout(timeout, handle.wait_for(|snapshot| !snapshot.loading())).await {
        Ok(Some(_)) => {}
        Ok(None) => warn!("View stopped before settling"),
        Err(_) => warn!("View did not settle within {:?}", timeout),
    }
}

fn print_report(
    step: &str,
    identity: &IdentityContext,
    shifts: &OperatorShifts,
    stats: &OperatorStatsView,
) -> Result<()> {
    let report = json!({
        "step": step,
        "operator": identity.current(),
        "shifts": shifts.shifts(),
        "loading": shifts.loading() || stats.loading(),
        "error": shifts.error(),
        "stats": stats.stats(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
