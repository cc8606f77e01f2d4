// Framework bootstrap for the arena server runtime.

use crate::domain::tuning::arena::ArenaTuning;
use crate::frameworks::config;
use crate::interface_adapters::net::ws_handler;
use crate::interface_adapters::physics::RapierPhysics;
use crate::interface_adapters::state::AppState;
use crate::use_cases::{SessionManager, SessionSettings, session_task, simulation_task};

use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use tokio::sync::{mpsc, watch};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    // Stops the session tasks once the server is gone.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = build_state(shutdown_rx);

    // Start the Web Server
    let app = Router::new()
        .route("/bump/", get(ws_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    let served = axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    });
    // Err only means both tasks already exited.
    let _ = shutdown_tx.send(true);
    served
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state(shutdown: watch::Receiver<bool>) -> Arc<AppState> {
    let tuning = ArenaTuning::default();
    let settings = SessionSettings {
        sim_interval: config::SIM_TICK_INTERVAL,
        broadcast_interval: config::BROADCAST_INTERVAL,
        handshake_timeout: config::connect_handshake_timeout(),
    };
    tracing::debug!(
        arena_radius = tuning.radius,
        wall_segments = tuning.wall_segments,
        handshake_timeout_ms = settings.handshake_timeout.as_millis(),
        "session configured"
    );

    // One session owns the arena; walls and the center obstacle are built here.
    let manager = Arc::new(SessionManager::new(
        RapierPhysics::new(&tuning),
        tuning,
        settings,
    ));

    let (control_tx, control_rx) = mpsc::channel(config::CONTROL_CHANNEL_CAPACITY);
    let (inbound_tx, inbound_rx) = mpsc::channel(config::INBOUND_CHANNEL_CAPACITY);

    // Physics runs on its own tick, independent of network traffic.
    tokio::spawn(simulation_task(manager.clone(), shutdown.clone()));
    tokio::spawn(session_task(manager, control_rx, inbound_rx, shutdown));

    Arc::new(AppState {
        control_tx,
        inbound_tx,
        register_timeout: config::REGISTER_TIMEOUT,
        outbound_capacity: config::OUTBOUND_CHANNEL_CAPACITY,
    })
}
