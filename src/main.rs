mod clock;
mod config;
mod contact_call;
mod error;
mod handlers;
mod mailer;
mod metrics;
mod models;
mod rate_limit;
mod relay;
mod router;
mod state;
mod worker;


use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Args;
use crate::mailer::{HttpMailer, LogMailer};
use crate::models::DispatchJob;
use crate::rate_limit::Throttle;
use crate::relay::OllamaChat;
use crate::router::app_router;
use crate::state::AppState;
use crate::worker::dispatch_worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // parse cli arguments
    let args = Args::parse();
    let (dispatch_tx, dispatch_rx) = mpsc::channel::<DispatchJob>(args.dispatch_queue as usize);

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(args.connect_timeout))
        .build()?;

    // spawn the mail worker, it owns the mailer for the life of the process
    match args.mail_key() {
        Some(key) => {
            let mailer = HttpMailer::new(
                client.clone(),
                args.mail_api_url.clone(),
                key.to_string(),
                args.mail_from.clone(),
                args.mail_to.clone(),
            );
            tokio::spawn(dispatch_worker(dispatch_rx, mailer));
        }
        None => {
            tracing::warn!("MAIL_API_KEY not set, contact emails will only be logged");
            tokio::spawn(dispatch_worker(dispatch_rx, LogMailer::new(args.mail_to.clone())));
        }
    }

    let throttle = Arc::new(Throttle::new(
        args.rate_limit,
        Duration::from_secs(args.rate_window),
    ));

    // creating shared state
    let state = Arc::new(AppState {
        throttle: Arc::clone(&throttle),
        dispatch_tx,
        chat: Arc::new(OllamaChat::new(client, &args.llm_url, args.llm_model.clone())),
        first_token_timeout: Duration::from_secs(args.llm_first_token_timeout),
    });

    let app = app_router(state, &args.cors_origin_list());

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "gateway listening");
    info!(url = %args.llm_url, model = %args.llm_model, "relaying chat");
    info!(
        limit = throttle.limit(),
        window_secs = throttle.window().as_secs(),
        "notification rate limit"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("gateway shut down");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received terminate signal, shutting down"),
    }
}
