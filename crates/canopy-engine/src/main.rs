//! Canopy Engine Binary
//!
//! Runs a scenario file through one engine instance:
//!
//! ```text
//! canopy scenarios/basic.json [--watch]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use canopy_common::{Agent, CollaborationRequest, FrictionSignal};
use canopy_engine::{CanopyEngine, CoordinationOutcome, EngineConfig};
use canopy_adaptive::SignalOutcome;
use canopy_mesh::NetworkSummary;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Scenario file layout
#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default)]
    agents: Vec<Agent>,
    #[serde(default)]
    requests: Vec<CollaborationRequest>,
    provider_id: Option<String>,
    #[serde(default = "default_resource_type")]
    resource_type: String,
    #[serde(default)]
    signals: Vec<FrictionSignal>,
}

fn default_resource_type() -> String {
    "compute".to_string()
}

#[derive(Debug, Serialize)]
struct Report {
    network: Option<NetworkSummary>,
    coordination: Option<CoordinationOutcome>,
    signals: Vec<SignalOutcome>,
    partition_failures: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting Canopy engine v{}", canopy_common::VERSION);

    let mut scenario_path: Option<PathBuf> = None;
    let mut watch = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--watch" => watch = true,
            flag if flag.starts_with("--") => bail!("unknown flag {}", flag),
            path => scenario_path = Some(PathBuf::from(path)),
        }
    }
    let Some(scenario_path) = scenario_path else {
        bail!("usage: canopy <scenario.json> [--watch]");
    };

    let config = EngineConfig::load()?;
    debug!("Loaded configuration: {:?}", config);

    let raw = tokio::fs::read_to_string(&scenario_path)
        .await
        .with_context(|| format!("reading {}", scenario_path.display()))?;
    let scenario: Scenario = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", scenario_path.display()))?;

    let engine = CanopyEngine::new(config)?;

    let mut events = engine.event_stream();
    let logger = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => info!(event = event.name(), "{}", json),
                    Err(e) => warn!(error = %e, "Event not serializable"),
                },
                Err(e) => warn!(error = %e, "Event logger lagged"),
            }
        }
    });

    let report = run(&engine, scenario)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if watch {
        engine.start_rebalancer()?;
        info!("Rebalancer running, press Ctrl-C to stop");
        tokio::signal::ctrl_c()
            .await
            .context("installing Ctrl-C handler")?;
        info!("Received shutdown signal");
    }

    engine.shutdown();
    drop(engine);
    // the stream ends once every sender is gone
    if tokio::time::timeout(Duration::from_secs(1), logger).await.is_err() {
        warn!("Event logger did not drain in time");
    }

    info!("Canopy engine stopped");
    Ok(())
}

fn run(engine: &CanopyEngine, scenario: Scenario) -> Result<Report> {
    let network = if scenario.agents.is_empty() {
        None
    } else {
        Some(engine.establish_network(scenario.agents)?)
    };

    let coordination = match (&scenario.provider_id, scenario.requests.is_empty()) {
        (Some(provider_id), false) => Some(engine.coordinate(
            scenario.requests,
            provider_id,
            &scenario.resource_type,
        )?),
        (None, false) => {
            info!("No provider_id, scoring requests only");
            let selection = engine.select(scenario.requests)?;
            let stats = selection.stats.clone();
            Some(CoordinationOutcome {
                selection,
                stats,
                transfer: None,
                friction: None,
            })
        }
        (_, true) => None,
    };

    let signals = scenario
        .signals
        .into_iter()
        .map(|signal| engine.process_signal(signal))
        .collect::<canopy_common::Result<Vec<_>>>()?;

    Ok(Report {
        network,
        coordination,
        signals,
        partition_failures: engine.partition_failures(),
    })
}
