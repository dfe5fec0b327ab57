use riskstore::{
    app::{build_app, serve},
    config::AppConfig,
    state::AppState,
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init("riskstore=debug,axum=info,tower_http=info");

    let config = AppConfig::from_env()?;
    tracing::info!(backend = config.store.backend_name(), "starting");

    let state = AppState::init(&config).await?;
    let app = build_app(state);
    serve(app, &config.host, config.port).await
}
