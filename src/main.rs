use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use intent_engine::config::AppConfig;
use intent_engine::error::AppError;
use intent_engine::scoring::registry::RuleSource;
use intent_engine::scoring::{
    import, scoring_router, BatchRunner, EngineState, MemoryStore, RunSummary, ScoreStore,
    SignalStore,
};
use intent_engine::telemetry;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Buyer-Intent Scoring Engine",
    about = "Score buyer-intent signals into tiers and outreach triggers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Execute one batch cycle over CSV-seeded signals and print the summary
    Run(RunArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Signal export to score (CSV)
    #[arg(long)]
    signals_csv: PathBuf,
    /// Optional contact-channel export used by trigger preconditions (CSV)
    #[arg(long)]
    contacts_csv: Option<PathBuf>,
    /// JSON rules file overriding the built-in lookup tables
    #[arg(long)]
    rules: Option<PathBuf>,
    /// Evaluation instant (RFC 3339, defaults to now)
    #[arg(long, value_parser = parse_instant)]
    as_of: Option<DateTime<Utc>>,
    /// Emit the run summary as JSON instead of the readable report
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Run(args) => run_batch(args),
    }
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as RFC 3339 ({err})"))
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let engine_state = Arc::new(EngineState {
        store: Arc::new(MemoryStore::new()),
        rules: Arc::new(RuleSource::from_path(config.scoring.rules_path.clone())),
        settings: config.scoring.settings.clone(),
    });

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(scoring_router(engine_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "buyer-intent scoring engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_batch(args: RunArgs) -> Result<(), AppError> {
    let RunArgs {
        signals_csv,
        contacts_csv,
        rules,
        as_of,
        json,
    } = args;

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let store = MemoryStore::new();
    for signal in import::signals_from_path(signals_csv)? {
        let id = signal.id.0.clone();
        store
            .append(signal)
            .map_err(|_| import::ImportError::DuplicateSignal(id))?;
    }
    if let Some(path) = contacts_csv {
        for (person, channel, verified) in import::contacts_from_path(path)? {
            store.add_contact(person, channel, verified);
        }
    }

    let rule_source = RuleSource::from_path(rules.or(config.scoring.rules_path));
    let now = as_of.unwrap_or_else(Utc::now);

    let runner = BatchRunner::new(&store, &rule_source, &config.scoring.settings);
    let summary = runner.run(now)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).expect("summary serializes")
        );
    } else {
        render_run_summary(&summary, &store);
    }

    Ok(())
}

fn render_run_summary(summary: &RunSummary, store: &MemoryStore) {
    println!("Scoring run {} -> {}", summary.started_at, summary.finished_at);
    println!(
        "Pairs: {} discovered, {} scored, {} failed, {} skipped",
        summary.pairs_discovered, summary.pairs_scored, summary.pairs_failed, summary.pairs_skipped
    );
    println!(
        "Signals consumed: {} ({} unknown types, {} unknown sources)",
        summary.signals_consumed, summary.unknown_type_signals, summary.unknown_source_signals
    );
    println!(
        "Triggers: {} fired, {} suppressed by dedup, {} cap trips",
        summary.triggers_fired, summary.triggers_suppressed, summary.cap_trips
    );

    if !summary.errors.is_empty() {
        println!("\nFailed pairs (retried next run)");
        for failure in &summary.errors {
            println!("- {} / {}: {}", failure.person, failure.company, failure.error);
        }
    }

    match store.open_triggers() {
        Ok(triggers) if !triggers.is_empty() => {
            println!("\nOpen triggers");
            for trigger in triggers {
                println!(
                    "- {} | {} / {} | {} ({}) | score {:.1} | {}",
                    trigger.id,
                    trigger.pair.person.0,
                    trigger.pair.company.0,
                    trigger.action.label(),
                    trigger.priority.label(),
                    trigger.score,
                    trigger.reason
                );
            }
        }
        Ok(_) => println!("\nOpen triggers: none"),
        Err(err) => println!("\nOpen triggers unavailable: {err}"),
    }
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
