//! # adpilotd: adpilot daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Initialise logging
//! - Initialise the `SQLite` connection pool and run migrations
//! - Construct store implementations and the ad platform client (adapters)
//! - Construct the rule engine, rule service and revert sweeper
//! - Spawn the periodic scheduler and sweeper tasks
//! - Build the axum router, bind to a TCP port and serve
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no domain logic belongs here.

mod config;
mod tasks;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use adpilot_adapter_ad_platform_http::GraphClient;
use adpilot_adapter_http_axum::backend::EngineBackend;
use adpilot_adapter_http_axum::state::AppState;
use adpilot_adapter_storage_sqlite_sqlx::{
    SqliteActionHistoryStore, SqliteAdAccountStore, SqliteExecutionLogStore, SqliteLabelStore,
    SqliteMetricsStore, SqlitePendingRevertStore, SqliteRuleRepository, SqliteSalesStore,
};
use adpilot_app::rule_engine::{EnginePorts, RuleEngine};
use adpilot_app::services::action_executor::ActionExecutor;
use adpilot_app::services::revert_scheduler::RevertScheduler;
use adpilot_app::services::revert_sweeper::RevertSweeper;
use adpilot_app::services::rule_service::RuleService;
use adpilot_domain::time;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Database
    let db = adpilot_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Stores
    let rules = SqliteRuleRepository::new(pool.clone());
    let accounts = SqliteAdAccountStore::new(pool.clone());
    let logs = SqliteExecutionLogStore::new(pool.clone());
    let reverts = SqlitePendingRevertStore::new(pool.clone());

    // Ad platform
    let platform = GraphClient::new(adpilot_adapter_ad_platform_http::Config {
        base_url: config.platform.base_url.clone(),
        api_version: config.platform.api_version.clone(),
        timeout: config.call_timeout(),
    })?;

    // Use-cases
    let settings = config.engine_settings()?;
    let engine = Arc::new(RuleEngine::new(
        EnginePorts {
            rules: rules.clone(),
            accounts: accounts.clone(),
            labels: SqliteLabelStore::new(pool.clone()),
            metrics: SqliteMetricsStore::new(pool.clone()),
            sales: SqliteSalesStore::new(pool.clone()),
            logs: logs.clone(),
            history: SqliteActionHistoryStore::new(pool),
            platform: platform.clone(),
            reverts: reverts.clone(),
        },
        settings.clone(),
    ));
    let rule_service = Arc::new(RuleService::new(rules, logs));
    let sweeper = Arc::new(RevertSweeper::new(
        reverts.clone(),
        accounts,
        ActionExecutor::new(platform, RevertScheduler::new(reverts), settings.executor),
        settings.timezone,
        config.sweeper.batch_size,
    ));

    // Background tasks
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut background = Vec::new();

    if config.scheduler.enabled {
        let engine = Arc::clone(&engine);
        background.push(tokio::spawn(tasks::every(
            "scheduler",
            Duration::from_secs(config.scheduler.interval_secs),
            shutdown_rx.clone(),
            move || {
                let engine = Arc::clone(&engine);
                async move {
                    match engine.run_scheduled(time::now()).await {
                        Ok(report) => tracing::info!(
                            succeeded = report.succeeded,
                            skipped = report.skipped,
                            failed = report.failed,
                            "scheduled cycles finished"
                        ),
                        Err(err) => {
                            tracing::error!(error = %err.detailed_message(), "scheduler tick failed");
                        }
                    }
                }
            },
        )));
    }

    if config.sweeper.enabled {
        let sweeper = Arc::clone(&sweeper);
        background.push(tokio::spawn(tasks::every(
            "revert-sweeper",
            Duration::from_secs(config.sweeper.interval_secs),
            shutdown_rx.clone(),
            move || {
                let sweeper = Arc::clone(&sweeper);
                async move {
                    match sweeper.sweep(time::now()).await {
                        Ok(report) if report.done + report.failed > 0 => tracing::info!(
                            done = report.done,
                            failed = report.failed,
                            "pending reverts processed"
                        ),
                        Ok(_) => {}
                        Err(err) => {
                            tracing::error!(error = %err.detailed_message(), "sweeper tick failed");
                        }
                    }
                }
            },
        )));
    }

    // HTTP
    let state = AppState::new(EngineBackend::new(engine, rule_service));
    let app = adpilot_adapter_http_axum::router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "adpilotd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down background tasks");
    // Receivers may already be gone if every task is disabled.
    let _ = shutdown_tx.send(true);
    for handle in background {
        if let Err(err) = handle.await {
            tracing::warn!(error = %err, "background task ended abnormally");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
