use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use session_core::{
    HttpSimulationBackend, SessionController, SessionEvent, SessionIntent, SessionSnapshot,
};
use shared::domain::FailureScenario;
use tracing::{info, warn};

mod config;

#[derive(Parser, Debug)]
struct Args {
    /// Backend base URL; overrides console.toml and environment settings.
    #[arg(long)]
    backend_url: Option<String>,
    /// Failure scenario to inject; omit for a baseline run.
    #[arg(long)]
    scenario: Option<FailureScenario>,
    /// Run the simulation but skip the explanation request.
    #[arg(long)]
    no_explain: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if let Some(backend_url) = args.backend_url {
        settings.backend_url = backend_url;
    }
    let backend_url = config::validate_backend_url(&settings.backend_url)?;

    let controller = SessionController::new(Arc::new(HttpSimulationBackend::new(
        backend_url.clone(),
    )));
    info!(session = %controller.session_id(), backend_url = %backend_url, "session started");

    let mut events = controller.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::SimulationFailed(message) => {
                    warn!(%message, "simulation failed")
                }
                SessionEvent::ExplanationFailed(message) => {
                    warn!(%message, "explanation failed")
                }
                SessionEvent::ExplanationBlocked(reason) => {
                    warn!(%reason, "explanation blocked")
                }
                other => info!(event = ?other, "session event"),
            }
        }
    });

    if !controller.health_check().await? {
        warn!("backend reports non-ok health; continuing anyway");
    }

    let advertised = controller.list_scenarios().await?;
    info!(
        scenarios = %advertised
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        "backend scenarios"
    );

    match args.scenario {
        Some(scenario) => {
            controller
                .dispatch(SessionIntent::InjectFailure(scenario))
                .await?;
            run_intent(&controller, SessionIntent::RunSimulation).await;
            if !args.no_explain {
                run_intent(&controller, SessionIntent::RequestExplanation).await;
            }
        }
        None => run_intent(&controller, SessionIntent::RunSimulation).await,
    }

    print_snapshot(&controller.snapshot().await);
    Ok(())
}

/// Network failures are non-fatal: the snapshot keeps whatever state the
/// session had before the failed call.
async fn run_intent(controller: &SessionController, intent: SessionIntent) {
    if let Err(err) = controller.dispatch(intent).await {
        warn!(error = %err, "intent did not complete");
    }
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    println!("system mode: {}", snapshot.system_mode);
    if let Some(scenario) = snapshot.active_scenario {
        println!("scenario:    {scenario}");
    }

    if let Some(topology) = &snapshot.topology {
        println!("\nservices:");
        for service in &topology.services {
            println!(
                "  {:<24} {:<10} {:>8.1} ms {:>6.2}% errors",
                service.name, service.status, service.latency_ms, service.error_rate_pct
            );
        }
        println!("dependencies:");
        for edge in &topology.dependencies {
            println!("  {} -> {}", edge.source, edge.target);
        }
    }

    if let Some(metrics) = &snapshot.metrics {
        println!(
            "\nmetric points: latency={} error_rate={} volume={} queue={}",
            metrics.latency_ms.len(),
            metrics.error_rate_pct.len(),
            metrics.request_volume.len(),
            metrics.queue_depth.len()
        );
    }

    if let Some(explanation) = &snapshot.explanation {
        println!("\nexplanation:");
        for paragraph in &explanation.text {
            println!("  {paragraph}");
        }
        if !explanation.identified_factors.is_empty() {
            println!("identified factors:");
            for factor in &explanation.identified_factors {
                println!("  - {factor}");
            }
        }
        if !explanation.mitigation_suggestions.is_empty() {
            println!("mitigation suggestions:");
            for suggestion in &explanation.mitigation_suggestions {
                println!("  - {}: {}", suggestion.action, suggestion.description);
            }
        }
    }
}
