use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{
    domain::{DraftEvent, Event},
    protocol::EVENTS_ROUTE,
};
use url::Url;

use crate::error::RequestFailure;

/// The two backend endpoints the controller depends on.
#[async_trait]
pub trait EventsApi: Send + Sync {
    async fn list_events(&self) -> Result<Vec<Event>, RequestFailure>;
    async fn create_event(&self, draft: &DraftEvent) -> Result<(), RequestFailure>;
}

pub struct HttpEventsApi {
    http: Client,
    events_url: Url,
}

impl HttpEventsApi {
    pub fn new(server_url: &str) -> Result<Self, url::ParseError> {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: &str) -> Result<Self, url::ParseError> {
        let events_url = Url::parse(server_url)?.join(EVENTS_ROUTE)?;
        Ok(Self { http, events_url })
    }

    pub fn events_url(&self) -> &Url {
        &self.events_url
    }
}

/// Success is judged by status class only; anything else carries the raw body.
async fn ensure_success(response: Response) -> Result<Response, RequestFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RequestFailure::new(status.as_u16(), body))
}

#[async_trait]
impl EventsApi for HttpEventsApi {
    async fn list_events(&self) -> Result<Vec<Event>, RequestFailure> {
        let response = self
            .http
            .get(self.events_url.clone())
            .send()
            .await
            .map_err(|e| RequestFailure::transport(&e))?;
        let response = ensure_success(response).await?;
        let status = response.status().as_u16();
        response
            .json::<Vec<Event>>()
            .await
            .map_err(|e| RequestFailure::new(status, format!("invalid events payload: {e}")))
    }

    async fn create_event(&self, draft: &DraftEvent) -> Result<(), RequestFailure> {
        let response = self
            .http
            .post(self.events_url.clone())
            .json(draft)
            .send()
            .await
            .map_err(|e| RequestFailure::transport(&e))?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
