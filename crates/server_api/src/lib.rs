use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use shared::{
    domain::EventRecord,
    error::{ApiError, ErrorCode},
    protocol::{NewEventRequest, EVENT_DATE_FORMAT},
};
use storage::Storage;
use weather_integration::WeatherProvider;

/// Maximum number of events returned by a listing.
pub const LIST_LIMIT: u32 = 5;

pub const READ_ONLY_MESSAGE: &str = "this is a read only instance, sorry";

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub weather: Option<Arc<dyn WeatherProvider>>,
    pub block_writes: bool,
}

impl ApiContext {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            weather: None,
            block_writes: false,
        }
    }
}

/// Upcoming events after `now`, soonest first, decorated with weather when a
/// provider is configured. Weather failures only drop the decoration.
pub async fn list_events(ctx: &ApiContext, now: DateTime<Utc>) -> Result<Vec<EventRecord>, ApiError> {
    let events: Vec<EventRecord> = ctx
        .storage
        .list_upcoming_events(now, LIST_LIMIT)
        .await
        .map_err(internal)?
        .into_iter()
        .map(|stored| stored.into_record())
        .collect();

    let Some(provider) = ctx.weather.as_ref() else {
        return Ok(events);
    };

    let lookups = events.into_iter().map(|mut event| {
        let provider = Arc::clone(provider);
        async move {
            match provider.weather(&event.location).await {
                Ok(weather) => event.weather = Some(weather),
                Err(error) => tracing::error!(
                    location = %event.location,
                    %error,
                    "fetching weather failed"
                ),
            }
            event
        }
    });
    Ok(join_all(lookups).await)
}

pub async fn add_event(ctx: &ApiContext, body: &[u8]) -> Result<i64, ApiError> {
    if ctx.block_writes {
        return Err(ApiError::new(ErrorCode::Forbidden, READ_ONLY_MESSAGE));
    }

    let event = decode_event(body)?;
    tracing::info!(title = %event.title, date = %event.date, "event decoded");
    ctx.storage.insert_event(&event).await.map_err(internal)
}

/// Parses and validates a `POST /api/events` body.
pub fn decode_event(body: &[u8]) -> Result<EventRecord, ApiError> {
    let data: NewEventRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::validation(format!("decode json: {e}")))?;

    if data.title.is_empty() {
        return Err(ApiError::validation("title can't be empty"));
    }
    if data.location.is_empty() {
        return Err(ApiError::validation("location is required"));
    }
    let date = NaiveDate::parse_from_str(&data.date, EVENT_DATE_FORMAT)
        .map_err(|e| ApiError::validation(format!("parse date: {e}")))?;

    Ok(EventRecord {
        title: data.title,
        description: data.description,
        date: date.and_time(chrono::NaiveTime::MIN).and_utc(),
        location: data.location,
        weather: None,
    })
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}
