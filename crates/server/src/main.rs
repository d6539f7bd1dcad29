use std::{net::SocketAddr, sync::Arc};

use server_api::ApiContext;
use storage::Storage;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use weather_integration::{CachedWeather, OpenWeatherClient, WeatherProvider};

mod api;
mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, prepare_database_url};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let weather = settings.weather_api_key.as_ref().map(|key| {
        let client: Arc<dyn WeatherProvider> = Arc::new(OpenWeatherClient::new(key.clone()));
        Arc::new(CachedWeather::new(client)) as Arc<dyn WeatherProvider>
    });
    if weather.is_none() {
        info!("no weather api key configured; events are listed without weather");
    }
    if settings.block_writes {
        info!("running as a read only instance");
    }

    let api = ApiContext {
        storage,
        weather,
        block_writes: settings.block_writes,
    };
    let app = api::build_router(Arc::new(AppState { api }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
