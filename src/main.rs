//! VIBE BITES backend warm-up - keeps the storefront backend awake

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vibe_bites_storefront::{check_backend_status, warm_up_backend, ApiClient, CartEngine, FileStore, KeepAlive, StorefrontConfig};

fn setup() -> vibe_bites_storefront::Result<(StorefrontConfig, Arc<FileStore>)> {
    let config = StorefrontConfig::from_env()?;
    let store = Arc::new(FileStore::open(&config.storage_dir)?);
    Ok((config, store))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let (config, store) = setup()?;
    let mut api = ApiClient::new(&config.api_base_url);
    if let Some(token) = &config.api_token { api = api.with_token(token); }
    let api = Arc::new(api);
    tracing::info!(api = %config.api_base_url, env = ?config.environment, "VIBE BITES warm-up starting");

    if !check_backend_status(api.as_ref()).await {
        let ready = warm_up_backend(api.as_ref(), &config.warm_up, |progress| tracing::info!("{progress}")).await;
        if !ready { tracing::warn!("backend did not come up, keep-alive will keep trying"); }
    }

    let mut cart = CartEngine::load(store, api.clone());
    cart.refresh_shipping().await;
    tracing::info!(items = cart.cart_count(), subtotal = %cart.subtotal(), total = %cart.cart_total(), "persisted cart");

    let keep_alive = KeepAlive::start(api, config.keep_alive_interval);
    tokio::signal::ctrl_c().await?;
    keep_alive.stop();
    Ok(())
}
