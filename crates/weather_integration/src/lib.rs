//! Weather lookups used to decorate listed events.

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use shared::domain::Weather;
use tokio::{sync::RwLock, time::Instant};
use url::Url;

pub const OPEN_WEATHER_API_URL: &str = "http://api.openweathermap.org/data/2.5/weather";
pub const ICON_URL_PREFIX: &str = "http://openweathermap.org/img/w/";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn weather(&self, location: &str) -> Result<Weather>;
}

pub fn icon_url(icon: &str) -> String {
    format!("{ICON_URL_PREFIX}{icon}.png")
}

#[derive(Debug, Deserialize)]
struct ApiWeather {
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiResponse {
    weather: Vec<ApiWeather>,
    message: String,
}

/// OpenWeatherMap current-weather client.
pub struct OpenWeatherClient {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(OPEN_WEATHER_API_URL, api_key)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    fn request_url(&self, location: &str) -> Result<Url> {
        Url::parse_with_params(
            &self.endpoint,
            &[("APPID", self.api_key.as_str()), ("q", location)],
        )
        .with_context(|| format!("invalid weather endpoint '{}'", self.endpoint))
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn weather(&self, location: &str) -> Result<Weather> {
        let url = self.request_url(location)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("could not get weather")?;
        // Error payloads carry a `message`; the status code alone is not checked.
        let data: ApiResponse = response
            .json()
            .await
            .context("could not decode weather")?;

        if !data.message.is_empty() {
            return Err(anyhow!("no weather found: {}", data.message));
        }

        let first = data
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no weather found"))?;

        Ok(Weather {
            description: first.description,
            icon: icon_url(&first.icon),
        })
    }
}

struct CachedEntry {
    weather: Weather,
    expires_at: Instant,
}

/// Memoizes another provider per location for a fixed time.
pub struct CachedWeather {
    inner: Arc<dyn WeatherProvider>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedEntry>>,
}

impl CachedWeather {
    pub fn new(inner: Arc<dyn WeatherProvider>) -> Self {
        Self::with_ttl(inner, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(inner: Arc<dyn WeatherProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    async fn cached(&self, location: &str) -> Option<Weather> {
        let entries = self.entries.read().await;
        entries
            .get(location)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.weather.clone())
    }
}

#[async_trait]
impl WeatherProvider for CachedWeather {
    async fn weather(&self, location: &str) -> Result<Weather> {
        if let Some(weather) = self.cached(location).await {
            return Ok(weather);
        }

        let weather = self.inner.weather(location).await?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            location.to_string(),
            CachedEntry {
                weather: weather.clone(),
                expires_at: now + self.ttl,
            },
        );
        drop(entries);
        tracing::debug!(%location, "cached weather");
        Ok(weather)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
