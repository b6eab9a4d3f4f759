// Lineup optimizer entry point.
//
// Usage: lineup-optimizer <team_id> <week> [scenarios.json]
//
// Startup sequence:
// 1. Initialize tracing (stderr; stdout carries the JSON report)
// 2. Load config
// 3. Build the file-backed stores and the lineup service
// 4. Run the base lineup plus any scenarios from the optional JSON file
// 5. Print the ranked report as JSON

use std::sync::Arc;

use lineup_optimizer::config;
use lineup_optimizer::service::{LineupService, OptimizeRequest};
use lineup_optimizer::session::Scenario;
use lineup_optimizer::store::FileStore;

use anyhow::{bail, Context};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (team_id, week, scenarios_path) = match args.as_slice() {
        [team, week] => (team.clone(), week, None),
        [team, week, path] => (team.clone(), week, Some(path.clone())),
        _ => bail!("usage: lineup-optimizer <team_id> <week> [scenarios.json]"),
    };
    let week: u32 = week
        .parse()
        .with_context(|| format!("week must be a positive integer, got `{week}`"))?;

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={} ({}), projections={}",
        config.league.name, config.league.id, config.data_paths.projections
    );

    // 3. Stores and service
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let store = Arc::new(FileStore::from_config(&config, &cwd).context("invalid league config")?);
    let service = LineupService::new(
        store.clone(),
        store,
        config.solver.clone(),
        config.session.options(),
    );

    // 4. Scenarios
    let scenarios: Vec<Scenario> = match scenarios_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read scenarios file {path}"))?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse scenarios file {path}"))?
        }
        None => Vec::new(),
    };

    let request = OptimizeRequest {
        league_id: config.league.id.clone(),
        team_id,
        week,
        scenarios,
    };
    let session = service.session();
    let cancel = session.cancel_token();
    let report = tokio::select! {
        report = service.optimize_in(&session, request) => report.context("optimization failed")?,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            bail!("interrupted");
        }
    };

    // 5. Output
    let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
    println!("{json}");
    Ok(())
}

/// Initialize tracing to stderr so stdout stays machine-readable.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lineup_optimizer=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
