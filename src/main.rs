/* src/main.rs */

use iplog::{AppState, Config, LogConfig, create_router};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

fn init_tracing(log: &LogConfig) {
    let timer = if log.micros {
        ChronoLocal::new("%Y/%m/%d %H:%M:%S%.6f".to_string())
    } else {
        ChronoLocal::new("%Y/%m/%d %H:%M:%S".to_string())
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&log.filter))
        .with_timer(timer)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> iplog::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log);

    let state = AppState::new(&config)?;
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(mode = ?config.mode, "Server starting on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
