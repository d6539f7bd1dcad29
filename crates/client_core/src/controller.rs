//! View-model for the events list and the new-event form.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex as StdMutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use serde_json::Value;
use shared::domain::{DraftEvent, Event};
use tokio::{
    sync::{broadcast, RwLock},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{api::EventsApi, error::RequestFailure};

/// Pause before the follow-up refresh that absorbs backend replication lag.
pub const DEFAULT_REFRESH_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    pub refresh_delay: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            refresh_delay: DEFAULT_REFRESH_DELAY,
        }
    }
}

/// Changes pushed to the hosting view.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    EventsReplaced(Vec<Event>),
    DraftCleared,
    Alert(RequestFailure),
}

#[derive(Default)]
struct ViewState {
    events: Vec<Event>,
    draft: DraftEvent,
    alert: Option<RequestFailure>,
}

/// State shared with the delayed refresh task.
struct Shared {
    api: Arc<dyn EventsApi>,
    view: RwLock<ViewState>,
    notifications: broadcast::Sender<ControllerEvent>,
}

impl Shared {
    async fn fetch_events(&self) -> Result<(), RequestFailure> {
        match self.api.list_events().await {
            Ok(events) => {
                debug!(count = events.len(), "events refreshed");
                // Last completion wins; in-flight fetches are not ordered.
                self.view.write().await.events = events.clone();
                let _ = self
                    .notifications
                    .send(ControllerEvent::EventsReplaced(events));
                Ok(())
            }
            Err(failure) => Err(self.alert_error(failure.body, failure.status).await),
        }
    }

    async fn alert_error(&self, body: String, status: u16) -> RequestFailure {
        let failure = RequestFailure::new(status, body);
        warn!(status, body = %failure.body, "events request failed");
        self.view.write().await.alert = Some(failure.clone());
        let _ = self
            .notifications
            .send(ControllerEvent::Alert(failure.clone()));
        failure
    }

    async fn clear_draft(&self) {
        self.view.write().await.draft.clear();
        let _ = self.notifications.send(ControllerEvent::DraftCleared);
    }
}

/// Owns the displayed event list and the draft for a single view.
///
/// Operations take `&self` and may overlap: two `add_event` calls issue two
/// create requests, and whichever fetch completes last sets the list.
/// Pending delayed refreshes are aborted by [`EventsController::shutdown`] or
/// when the controller is dropped.
pub struct EventsController {
    shared: Arc<Shared>,
    options: ControllerOptions,
    delayed_refreshes: StdMutex<Vec<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl EventsController {
    /// Builds a controller without touching the network.
    pub fn new(api: Arc<dyn EventsApi>, options: ControllerOptions) -> Self {
        let (notifications, _) = broadcast::channel(256);
        Self {
            shared: Arc::new(Shared {
                api,
                view: RwLock::new(ViewState::default()),
                notifications,
            }),
            options,
            delayed_refreshes: StdMutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Builds a controller and performs the initial fetch. A failed fetch is
    /// surfaced as an alert and leaves the list empty.
    pub async fn start(api: Arc<dyn EventsApi>, options: ControllerOptions) -> Self {
        let controller = Self::new(api, options);
        let _ = controller.fetch_events().await;
        controller
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.shared.notifications.subscribe()
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    /// Replaces the displayed list with the backend's. On failure the list
    /// is left as it was and the failure is alerted.
    pub async fn fetch_events(&self) -> Result<(), RequestFailure> {
        self.shared.fetch_events().await
    }

    /// Submits the current draft.
    ///
    /// On success the draft is cleared, the list is refreshed at once and one
    /// more refresh is scheduled after `refresh_delay`, unless the controller
    /// was shut down meanwhile. On a create failure the draft is kept for
    /// correction.
    ///
    /// The draft is snapshotted before the create; edits made while it is in
    /// flight are discarded when the draft is cleared.
    pub async fn add_event(&self) -> Result<(), RequestFailure> {
        let draft = self.shared.view.read().await.draft.clone();
        if let Err(failure) = self.shared.api.create_event(&draft).await {
            return Err(self.shared.alert_error(failure.body, failure.status).await);
        }

        self.shared.clear_draft().await;
        self.shared.fetch_events().await?;
        self.schedule_delayed_refresh();
        Ok(())
    }

    /// Records a failed request and surfaces it to the view.
    pub async fn alert_error(&self, body: impl Into<String>, status: u16) -> RequestFailure {
        self.shared.alert_error(body.into(), status).await
    }

    pub async fn events(&self) -> Vec<Event> {
        self.shared.view.read().await.events.clone()
    }

    pub async fn draft(&self) -> DraftEvent {
        self.shared.view.read().await.draft.clone()
    }

    pub async fn set_draft_field(&self, field: impl Into<String>, value: impl Into<Value>) {
        self.shared.view.write().await.draft.set(field, value);
    }

    pub async fn replace_draft(&self, draft: DraftEvent) {
        self.shared.view.write().await.draft = draft;
    }

    /// The most recent failure not yet dismissed by the view.
    pub async fn current_alert(&self) -> Option<RequestFailure> {
        self.shared.view.read().await.alert.clone()
    }

    pub async fn dismiss_alert(&self) {
        self.shared.view.write().await.alert = None;
    }

    /// Number of delayed refreshes that have not run yet.
    pub fn pending_refreshes(&self) -> usize {
        let mut pending = self.lock_delayed_refreshes();
        pending.retain(|handle| !handle.is_finished());
        pending.len()
    }

    /// Cancels delayed refreshes, including ones an in-flight `add_event`
    /// would schedule later, so a torn-down view is not updated.
    pub fn shutdown(&self) {
        let mut pending = self.lock_delayed_refreshes();
        self.shut_down.store(true, Ordering::SeqCst);
        for handle in pending.drain(..) {
            handle.abort();
        }
    }

    fn schedule_delayed_refresh(&self) {
        let mut pending = self.lock_delayed_refreshes();
        if self.shut_down.load(Ordering::SeqCst) {
            debug!("controller shut down; skipping delayed refresh");
            return;
        }

        let shared = Arc::clone(&self.shared);
        let delay = self.options.refresh_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Failures were already alerted.
            let _ = shared.fetch_events().await;
        });
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }

    fn lock_delayed_refreshes(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.delayed_refreshes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for EventsController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
