use std::net::SocketAddr;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use event_manager::{config::Config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // в production логи пишутся в JSON
    let json_logs = config.app.json_logs();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    info!("Starting Event Manager ({})", config.app.environment);

    let missing = config.parse.missing();
    if !missing.is_empty() {
        warn!(
            "Parse environment variables are missing ({}). Authentication and data operations will fail.",
            missing.join(", ")
        );
    }

    // Create the shared application state and restore the saved session
    let app_state = AppState::new(config.clone()).await?;
    match app_state.session.current() {
        Some(identity) => info!("Session restored for {} ({})", identity.username, identity.role),
        None => info!("Starting without a session"),
    }

    let app = event_manager::app(app_state);

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
