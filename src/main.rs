//! Demo binary: assembles the full pipeline with an echo generator and
//! runs a scripted set of analyses, printing each routing decision and a
//! final telemetry summary.
//!
//! Usage:
//! ```text
//! pattern-advisor [config.toml]
//! pattern-advisor --schema     # print the config JSON schema and exit
//! ```

use pattern_advisor::config::{load_config, AdvisorConfig};
use pattern_advisor::detect::PatternLibrary;
use pattern_advisor::generate::EchoGenerator;
use pattern_advisor::routing::ModeHint;
use pattern_advisor::service::{AdvisorService, CallerContext};
use pattern_advisor::{init_tracing, metrics, AdvisorError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("fatal: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AdvisorError> {
    init_tracing()?;
    metrics::init_metrics();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--schema") {
        println!("{}", AdvisorConfig::export_schema());
        return Ok(());
    }

    let config_path = args.get(1).map(Path::new);
    let config = load_config(config_path)?;

    let library = match &config.detection.pattern_file {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                AdvisorError::Config(format!("cannot read {}: {e}", path.display()))
            })?;
            PatternLibrary::from_toml(&text).map_err(|e| {
                AdvisorError::Config(format!("cannot parse {}: {e}", path.display()))
            })?
        }
        None => PatternLibrary::builtin(),
    };

    let generator = Arc::new(EchoGenerator::new().with_delay(Duration::from_millis(120)));
    let service = Arc::new(AdvisorService::new(&config, library, generator)?);

    #[cfg(feature = "metrics-server")]
    {
        let svc = Arc::clone(&service);
        let addr = config.observability.listen_addr.clone();
        tokio::spawn(async move {
            if let Err(e) = pattern_advisor::metrics_server::serve(svc, &addr).await {
                tracing::warn!(error = %e, "observability endpoint stopped");
            }
        });
    }

    let requests: Vec<(&str, CallerContext)> = vec![
        (
            "We're planning to build a custom HTTP client instead of using their SDK",
            CallerContext::new().with_intent("review"),
        ),
        (
            "Proposal: a complete rewrite of the billing service this quarter",
            CallerContext::new().with_intent("triage"),
        ),
        (
            "Should we shave a few ms off this loop before we profile it?",
            CallerContext::new(),
        ),
        (
            "Thinking about how to structure the new ingestion module",
            CallerContext::new()
                .with_file_paths(vec!["src/ingest.rs".to_string()])
                .with_intent("design"),
        ),
        (
            "Thinking about how to structure the new ingestion module",
            CallerContext::new()
                .with_file_paths(vec!["src/ingest.rs".to_string()])
                .with_intent("design"),
        ),
        (
            "Quick sanity check on this helper function",
            CallerContext::new().with_mode_hint(ModeHint::Fast),
        ),
    ];

    println!("── pattern-advisor demo ──");
    for (text, ctx) in requests {
        let result = service.analyze(text, &ctx).await;
        println!(
            "[{:>9}] conf {:.2} {:>4}ms  {}",
            result.route_type.as_str(),
            result.confidence,
            result.latency_ms,
            text
        );
        println!("            {}", result.reasoning);
    }

    let summary = service.summary();
    let json = serde_json::to_string_pretty(&summary)
        .map_err(|e| AdvisorError::Other(format!("summary serialization failed: {e}")))?;
    println!("\n── telemetry summary ──\n{json}");

    Ok(())
}
