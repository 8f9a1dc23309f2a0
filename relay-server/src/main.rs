use anyhow::Context;
use relay_server::{run_server, AppState, LlmService, RelayConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = RelayConfig::from_env().context("failed to read configuration")?;
    let llm_service =
        Arc::new(LlmService::new(&config).context("failed to build completion client")?);

    run_server(AppState::new(llm_service), config.listen_addr()).await
}
