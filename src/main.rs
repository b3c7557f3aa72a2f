//! La Pesqueria cart service

use anyhow::Result;
use lapesqueria_cart::{http, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = Config::from_env()?;
    let discounts = config.load_discount_book()?;
    let codes = discounts.len();

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(%url, error = %e, "NATS unavailable, cart events will not be published");
                None
            }
        },
        None => None,
    };

    let state = http::AppState::new(config.storage_dir.clone(), config.pricing.clone(), discounts, nats);
    let app = http::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(%addr, codes, storage = %config.storage_dir.display(), "cart service listening");
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
