//! Live scores server — HTTP + WebSocket backend.
//!
//! Required env: ADMIN_API_KEY
//! Optional: HOST, PORT, DATABASE_PATH, SIM_TICK_SECS, GOAL_PROBABILITY,
//! FINISH_PROBABILITY

use std::net::SocketAddr;
use std::sync::Arc;

use server::{api, config, db, realtime};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;
    let config = Arc::new(config);

    let db = db::Db::open(&config.database_path)?;
    db.run_migrations()?;
    {
        let conn = db.0.lock().unwrap();
        db::seed_demo_data(&conn)?;
    }
    let db = Arc::new(db);

    let hub = realtime::Hub::new();
    let broadcaster = Arc::new(realtime::Broadcaster::new(db.clone(), hub.clone()));

    let simulation =
        realtime::Simulation::new(db.clone(), broadcaster.clone(), config.simulation);
    tokio::spawn(simulation.run());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("invalid bind address");

    let state = api::AppState {
        db,
        hub,
        broadcaster,
        config,
    };
    let app = api::router(state);

    tracing::info!("scores server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
