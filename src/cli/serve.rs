use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use crate::ack::AckQueue;
use crate::auth::AuthStore;
use crate::config::{Config, Environment};
use crate::dispatcher::Dispatcher;
use crate::server::{self, ServerState};
use crate::telegram::TelegramBot;

pub async fn run(config: &Config, auth: &AuthStore) -> Result<()> {
    let webhook_path = &config.server.webhook_path;
    if !webhook_path.starts_with('/') {
        anyhow::bail!("server.webhook_path must start with '/', got {webhook_path:?}");
    }

    let mut dispatcher = Dispatcher::from_config(config);

    // Ack worker only exists when test acks can actually fire
    let worker = if dispatcher.test_ack() {
        let token = auth.telegram_bot_token().context(
            "test ack mode needs a bot token. Set TELEGRAM_BOT_TOKEN or add it to credentials.toml",
        )?;
        let (queue, worker) = AckQueue::spawn(
            TelegramBot::new(&token)?,
            config.ack.queue_capacity,
            Duration::from_secs(config.ack.send_timeout_secs),
        );
        dispatcher = dispatcher.with_acks(queue);
        Some(worker)
    } else {
        None
    };

    let webhook_secret = auth.webhook_secret();
    if webhook_secret.is_none() {
        if config.environment == Environment::Production {
            anyhow::bail!("refusing to serve in production without TELEGRAM_WEBHOOK_SECRET");
        }
        tracing::warn!("no webhook secret configured, deliveries are not authenticated");
    }

    let state = Arc::new(ServerState {
        dispatcher,
        webhook_secret,
        start_time: chrono::Utc::now(),
    });
    let app = server::router(state.clone(), webhook_path);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    eprintln!(
        "{} {} {}",
        "📡".bold(),
        "tgrelay listening".green().bold(),
        format!("on http://{addr}{webhook_path}").dimmed()
    );
    if state.dispatcher.test_ack() {
        eprintln!("{}", "Test ack mode ON, every update gets a reply".yellow());
    }
    eprintln!("{}", "Press Ctrl+C to stop".dimmed());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving webhook")?;

    // The router held the last queue handle; the worker now drains and exits
    drop(state);
    if let Some(worker) = worker {
        let processed = worker.shutdown().await;
        tracing::info!(processed, "ack worker stopped");
    }

    eprintln!("{}", "Stopped.".dimmed());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl+c: {e}");
        std::future::pending::<()>().await;
    }
    eprintln!("\n{}", "Shutting down...".yellow());
}
