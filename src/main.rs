use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use docchat::args::Args;
use docchat::{
    AppState, CompletionGateway, Config, GatewayConfig, ModelCatalog, logger, router,
    shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();
    let config = Config::from_env();

    let http = reqwest::Client::new();
    let catalog = ModelCatalog::new(config.default_model.clone());
    catalog.refresh(&http, &config).await;

    tracing::info!(
        model = %catalog.current().await,
        api_key = %config.key_hint(),
        "document chat gateway starting"
    );

    let gateway = CompletionGateway::new(http, GatewayConfig::new(&config));
    let state = Arc::new(AppState::new(config, catalog, gateway));
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "serving chat gateway");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
