mod config;
mod models;
mod providers;
mod server;
mod services;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use providers::ProviderRouter;
use server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("invalid configuration")?;
    tracing::info!(
        classifier = %config.assistant.classifier_provider,
        chat = %config.assistant.chat_provider,
        "configuration loaded"
    );

    for id in models::ProviderId::ALL {
        let provider = config.providers.get(id);
        tracing::info!(
            provider = id.display_name(),
            base_url = %provider.base_url,
            model = %provider.model,
            "provider configured"
        );
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;
    let providers = Arc::new(ProviderRouter::with_openai_compat(client));

    let state = AppState::new(providers, &config);
    server::start_server(&config.server, state).await
}
