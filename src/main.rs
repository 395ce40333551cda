// Proximity Server - Main Entry Point

use clap::Parser;
use proximity_server::config::Config;
use proximity_server::coordinator::Coordinator;
use proximity_server::movement::MovementTracker;
use proximity_server::net::listener::TcpServer;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    info!("Starting proximity server");

    let thresholds = config.thresholds();
    if let Err(e) = thresholds.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    let coordinator = Arc::new(Coordinator::with_options(
        thresholds,
        MovementTracker::new(config.min_sample_interval, config.movement_hysteresis),
        config.pair_max_age,
        config.work_dir.clone(),
        config.status_interval,
    ));
    coordinator.init_work_dir().await;
    info!("Coordinator initialized");

    // Optional: HTTP endpoint exposing the active vehicle list as JSON
    if let Ok(port_str) = std::env::var("HTTP_PORT") {
        if let Ok(port) = port_str.parse::<u16>() {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                let listener = match tokio::net::TcpListener::bind((
                    std::net::Ipv4Addr::UNSPECIFIED,
                    port,
                ))
                .await
                {
                    Ok(l) => l,
                    Err(e) => {
                        error!("HTTP server failed to bind to port {}: {}", port, e);
                        return;
                    }
                };
                info!("HTTP server on port {}", port);
                let app = axum::Router::new()
                    .route("/api/vehicles", axum::routing::get(vehicles_handler))
                    .route(
                        "/api/tracked-vehicles",
                        axum::routing::get(tracked_vehicles_handler),
                    )
                    .with_state(coordinator);
                if let Err(e) = axum::serve(listener, app).await {
                    error!("HTTP server error: {}", e);
                }
            });
        }
    }

    // Spawn periodic tasks for coordinator
    let coordinator_clone = coordinator.clone();
    tokio::spawn(async move {
        coordinator_clone.run().await;
    });

    // Setup client listeners
    let mut servers: Vec<TcpServer> = Vec::new();

    if config.client_listen.is_empty() {
        warn!("No client listeners specified! Use --client-listen [host:]port");
    }

    for listen_addr in &config.client_listen {
        // Parse [host:]port
        let (host, port) = match listen_addr.rsplit_once(':') {
            Some((host, port)) => (host, port),
            None => ("0.0.0.0", listen_addr.as_str()),
        };

        let addr_str = format!("{}:{}", host, port);
        match addr_str.parse::<std::net::SocketAddr>() {
            Ok(addr) => {
                match TcpServer::start(addr, coordinator.clone(), config.motd.clone()).await {
                    Ok(server) => {
                        info!("JSON client handler listening on {} (TCP)", server.addr());
                        servers.push(server);
                    }
                    Err(e) => error!("Failed to start TCP server on {}: {}", addr, e),
                }
            }
            Err(e) => error!("Invalid TCP address '{}': {}", addr_str, e),
        }
    }

    info!("Server ready");

    // Wait for shutdown signal (Ctrl+C)
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal (Ctrl+C)");
        }
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
            return Err(err.into());
        }
    }

    // Graceful shutdown
    info!("Shutting down...");
    for mut server in servers {
        server.shutdown().await;
    }

    // Report final statistics
    let vehicle_count = coordinator.vehicle_count().await;
    let alerts = *coordinator.total_alerts.read().await;
    info!(
        "Server stopped. Final vehicle count: {} ({} alerts delivered)",
        vehicle_count, alerts
    );

    Ok(())
}

/// GET /api/vehicles - active vehicle list
async fn vehicles_handler(
    axum::extract::State(coordinator): axum::extract::State<Arc<Coordinator>>,
) -> axum::Json<Vec<proximity_server::vehicle::Vehicle>> {
    axum::Json(coordinator.vehicles_snapshot().await)
}

/// GET /api/tracked-vehicles - vehicles tracking with a fix, most recent first
async fn tracked_vehicles_handler(
    axum::extract::State(coordinator): axum::extract::State<Arc<Coordinator>>,
) -> axum::Json<Vec<proximity_server::vehicle::Vehicle>> {
    axum::Json(coordinator.tracked_snapshot().await)
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_span_events(if verbose {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    if verbose {
        subscriber.with_max_level(tracing::Level::DEBUG).init();
        info!("Verbose logging enabled (DEBUG level)");
    } else {
        subscriber.with_max_level(tracing::Level::INFO).init();
    }
}
