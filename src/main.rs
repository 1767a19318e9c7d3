//! driftwatch - source-of-truth reconciliation sentinel
//!
//! Samples work orders from the relational source of truth, fetches their
//! denormalized projection from the search store, walks the declarative
//! schema mapping to detect field- and row-level drift, and delivers
//! bounded reports to a webhook channel. Runs one batch by default or
//! loops on an interval in service mode.

mod checker;
mod config;
mod error;
mod fetch;
mod notify;
mod reconcile;
mod registry;
mod report;

use crate::checker::ConsistencyChecker;
use crate::config::{DatabaseConfig, Settings};
use crate::fetch::{DocumentFetcher, SourceFetcher};
use crate::notify::WebhookNotifier;
use crate::reconcile::ReconcileEngine;
use crate::registry::SchemaRegistry;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "driftwatch", about = "PostgreSQL vs Elasticsearch consistency checker")]
struct Cli {
    /// Run as a service, repeating the check on the configured interval
    #[arg(long)]
    service: bool,

    /// Override the configured sample size for this invocation
    #[arg(long)]
    sample: Option<usize>,

    /// Check one specific work order instead of sampling
    #[arg(long)]
    entity: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut settings = Settings::load().map_err(|e| anyhow::anyhow!("configuration: {}", e))?;
    if let Some(sample) = cli.sample {
        info!(sample, "sample size overridden from the command line");
        settings.check.sample_size = sample;
    }

    let registry = Arc::new(SchemaRegistry::work_order());
    info!(
        nested = registry.nested().count(),
        specials = registry.specials().len(),
        "schema registry loaded"
    );

    let pool = build_pool(&settings.database)?;
    let source = SourceFetcher::new(pool, Arc::clone(&registry));
    let documents = DocumentFetcher::new(settings.search.clone(), Arc::clone(&registry));
    let engine = ReconcileEngine::new(Arc::clone(&registry));
    let notifier = WebhookNotifier::new(&settings.webhook);
    if !notifier.is_enabled() {
        warn!("WEBHOOK_URL not set, reports will only be logged");
    }

    let checker = ConsistencyChecker::new(
        source,
        documents,
        engine,
        notifier,
        settings.check.sample_size,
    );

    if let Some(entity_id) = cli.entity {
        let result = checker.check_entity(entity_id).await?;
        info!(
            entity_id = result.entity_id,
            consistent = result.outcome.is_consistent(),
            "single entity check done"
        );
        return Ok(());
    }

    if cli.service {
        run_service(&checker, settings.check.interval_secs).await;
    } else {
        checker.run_once().await?;
    }

    Ok(())
}

/// Repeat the check on a fixed interval until a shutdown signal arrives
async fn run_service(checker: &ConsistencyChecker, interval_secs: u64) {
    info!(interval_secs, "consistency check service started");
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = checker.run_once().await {
                    warn!(error = %e, "check run failed");
                }
            }
            _ = shutdown_signal() => {
                info!("shutdown signal received, stopping service");
                break;
            }
        }
    }
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,driftwatch=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .compact(),
        )
        .init();
}

/// Build the source database pool, with TLS when the configuration
/// demands it
fn build_pool(database: &DatabaseConfig) -> anyhow::Result<deadpool_postgres::Pool> {
    use deadpool_postgres::{Config, ManagerConfig, PoolConfig, RecyclingMethod};

    let mut cfg = Config::new();
    cfg.host = Some(database.host.clone());
    cfg.port = Some(database.port);
    cfg.user = Some(database.user.clone());
    cfg.password = Some(database.password.clone());
    cfg.dbname = Some(database.database.clone());
    cfg.pool = Some(PoolConfig::new(database.max_pool_size));
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let pool = if database.use_tls {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
        cfg.create_pool(Some(deadpool_postgres::Runtime::Tokio1), tls)
            .map_err(|e| anyhow::anyhow!("Failed to create TLS pool: {}", e))?
    } else {
        cfg.create_pool(Some(deadpool_postgres::Runtime::Tokio1), tokio_postgres::NoTls)
            .map_err(|e| anyhow::anyhow!("Failed to create pool: {}", e))?
    };

    info!(tls = database.use_tls, "database pool created");
    Ok(pool)
}


/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            info!("received terminate signal, initiating graceful shutdown");
        },
    }
}
