use super::*;
use std::{
    collections::VecDeque,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use serde_json::json;
use tokio::{sync::Barrier, time::Instant};

#[derive(Default)]
struct FakeEventsApi {
    list_calls: AtomicUsize,
    list_results: StdMutex<VecDeque<Result<Vec<Event>, RequestFailure>>>,
    default_events: Vec<Event>,
    create_failure: Option<RequestFailure>,
    created: StdMutex<Vec<DraftEvent>>,
    create_barrier: Option<Arc<Barrier>>,
}

impl FakeEventsApi {
    fn listing(events: Vec<Event>) -> Self {
        Self {
            default_events: events,
            ..Self::default()
        }
    }

    fn then_list(self, result: Result<Vec<Event>, RequestFailure>) -> Self {
        self.list_results
            .lock()
            .expect("list results")
            .push_back(result);
        self
    }

    fn failing_create(mut self, failure: RequestFailure) -> Self {
        self.create_failure = Some(failure);
        self
    }

    fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn created(&self) -> Vec<DraftEvent> {
        self.created.lock().expect("created").clone()
    }
}

#[async_trait]
impl EventsApi for FakeEventsApi {
    async fn list_events(&self) -> Result<Vec<Event>, RequestFailure> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.list_results.lock().expect("list results").pop_front();
        scripted.unwrap_or_else(|| Ok(self.default_events.clone()))
    }

    async fn create_event(&self, draft: &DraftEvent) -> Result<(), RequestFailure> {
        self.created.lock().expect("created").push(draft.clone());
        if let Some(barrier) = &self.create_barrier {
            barrier.wait().await;
        }
        match &self.create_failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }
}

fn event(title: &str) -> Event {
    serde_json::from_value(json!({ "title": title, "location": "Budapest" })).expect("event")
}

fn draft_named(name: &str) -> DraftEvent {
    let mut draft = DraftEvent::new();
    draft.set("name", name);
    draft
}

async fn next_refresh(rx: &mut broadcast::Receiver<ControllerEvent>) -> Vec<Event> {
    loop {
        match rx.recv().await.expect("controller event") {
            ControllerEvent::EventsReplaced(events) => return events,
            _ => continue,
        }
    }
}

#[tokio::test]
async fn start_fetches_once_and_populates_events() {
    let api = Arc::new(FakeEventsApi::listing(vec![event("Craft Conf"), event("Google I/O")]));
    let controller = EventsController::start(api.clone(), ControllerOptions::default()).await;

    assert_eq!(api.list_calls(), 1);
    let events = controller.events().await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].text("title"), Some("Craft Conf"));
    assert!(controller.draft().await.is_empty());
    assert_eq!(controller.current_alert().await, None);
}

#[tokio::test]
async fn start_failure_alerts_and_leaves_list_empty() {
    let api = Arc::new(
        FakeEventsApi::default().then_list(Err(RequestFailure::new(503, "unavailable"))),
    );
    let controller = EventsController::start(api.clone(), ControllerOptions::default()).await;

    assert_eq!(api.list_calls(), 1);
    assert!(controller.events().await.is_empty());
    let alert = controller.current_alert().await.expect("alert");
    assert_eq!(alert.to_string(), "code 503: unavailable");
}

#[tokio::test]
async fn new_does_not_touch_the_network() {
    let api = Arc::new(FakeEventsApi::listing(vec![event("Craft Conf")]));
    let controller = EventsController::new(api.clone(), ControllerOptions::default());

    assert_eq!(api.list_calls(), 0);
    assert!(controller.events().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn successful_add_clears_draft_and_refreshes_twice() {
    let api = Arc::new(FakeEventsApi::listing(vec![event("Craft Conf")]));
    let controller = EventsController::start(api.clone(), ControllerOptions::default()).await;
    controller.replace_draft(draft_named("X")).await;
    let mut rx = controller.subscribe();

    let added_at = Instant::now();
    controller.add_event().await.expect("add");

    assert_eq!(api.created(), vec![draft_named("X")]);
    assert!(controller.draft().await.is_empty());
    assert_eq!(rx.recv().await.expect("event"), ControllerEvent::DraftCleared);
    next_refresh(&mut rx).await;
    assert_eq!(api.list_calls(), 2, "initial fetch plus immediate refresh");
    assert_eq!(controller.pending_refreshes(), 1);

    next_refresh(&mut rx).await;
    assert!(added_at.elapsed() >= DEFAULT_REFRESH_DELAY);
    assert_eq!(api.list_calls(), 3);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(api.list_calls(), 3, "only one delayed refresh");
    assert_eq!(controller.pending_refreshes(), 0);
}

#[tokio::test(start_paused = true)]
async fn delayed_refresh_waits_for_the_full_delay() {
    let api = Arc::new(FakeEventsApi::listing(Vec::new()));
    let controller = EventsController::start(api.clone(), ControllerOptions::default()).await;
    controller.set_draft_field("name", "X").await;

    controller.add_event().await.expect("add");
    tokio::time::sleep(Duration::from_millis(999)).await;
    assert_eq!(api.list_calls(), 2);

    tokio::time::sleep(Duration::from_millis(2)).await;
    tokio::task::yield_now().await;
    assert_eq!(api.list_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn refresh_delay_is_configurable() {
    let api = Arc::new(FakeEventsApi::listing(Vec::new()));
    let options = ControllerOptions {
        refresh_delay: Duration::from_millis(250),
    };
    let controller = EventsController::start(api.clone(), options).await;
    let mut rx = controller.subscribe();

    let added_at = Instant::now();
    controller.add_event().await.expect("add");
    next_refresh(&mut rx).await;
    next_refresh(&mut rx).await;

    let elapsed = added_at.elapsed();
    assert!(elapsed >= Duration::from_millis(250));
    assert!(elapsed < DEFAULT_REFRESH_DELAY);
}

#[tokio::test]
async fn create_failure_alerts_and_keeps_draft() {
    let api = Arc::new(
        FakeEventsApi::listing(vec![event("Craft Conf")])
            .failing_create(RequestFailure::new(500, "oops")),
    );
    let controller = EventsController::start(api.clone(), ControllerOptions::default()).await;
    controller.replace_draft(draft_named("X")).await;
    let mut rx = controller.subscribe();

    let err = controller.add_event().await.expect_err("should fail");

    assert_eq!(err.to_string(), "code 500: oops");
    assert_eq!(
        rx.recv().await.expect("event"),
        ControllerEvent::Alert(RequestFailure::new(500, "oops"))
    );
    assert_eq!(controller.draft().await, draft_named("X"));
    assert_eq!(api.list_calls(), 1, "no refresh after a failed create");
    assert_eq!(controller.pending_refreshes(), 0);
    assert_eq!(controller.events().await.len(), 1);
}

#[tokio::test]
async fn fetch_failure_keeps_existing_events() {
    let api = Arc::new(
        FakeEventsApi::default()
            .then_list(Ok(vec![event("Craft Conf")]))
            .then_list(Err(RequestFailure::new(404, "not found"))),
    );
    let controller = EventsController::start(api.clone(), ControllerOptions::default()).await;

    let err = controller.fetch_events().await.expect_err("should fail");

    assert_eq!(err.to_string(), "code 404: not found");
    assert_eq!(
        controller.current_alert().await.map(|a| a.to_string()),
        Some("code 404: not found".to_string())
    );
    let events = controller.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].text("title"), Some("Craft Conf"));
}

#[tokio::test]
async fn successful_fetch_replaces_list_wholesale() {
    let api = Arc::new(
        FakeEventsApi::default()
            .then_list(Ok(vec![event("a"), event("b"), event("c")]))
            .then_list(Ok(vec![event("d")])),
    );
    let controller = EventsController::start(api.clone(), ControllerOptions::default()).await;
    assert_eq!(controller.events().await.len(), 3);

    controller.fetch_events().await.expect("fetch");
    let events = controller.events().await;
    assert_eq!(events, vec![event("d")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_adds_issue_independent_requests() {
    let api = Arc::new(FakeEventsApi {
        create_barrier: Some(Arc::new(Barrier::new(2))),
        ..FakeEventsApi::default()
    });
    let controller = EventsController::start(api.clone(), ControllerOptions::default()).await;
    controller.replace_draft(draft_named("X")).await;

    // Both creates must be in flight together for the barrier to release.
    let (first, second) = tokio::time::timeout(
        Duration::from_secs(5),
        futures::future::join(controller.add_event(), controller.add_event()),
    )
    .await
    .expect("creates were serialized");
    first.expect("first add");
    second.expect("second add");

    assert_eq!(api.created(), vec![draft_named("X"), draft_named("X")]);
    assert_eq!(controller.pending_refreshes(), 2);
}

#[tokio::test(start_paused = true)]
async fn immediate_refresh_failure_skips_delayed_refresh() {
    let api = Arc::new(
        FakeEventsApi::default()
            .then_list(Ok(Vec::new()))
            .then_list(Err(RequestFailure::new(500, "list broke"))),
    );
    let controller = EventsController::start(api.clone(), ControllerOptions::default()).await;
    controller.replace_draft(draft_named("X")).await;

    let err = controller.add_event().await.expect_err("refresh should fail");

    assert_eq!(err.to_string(), "code 500: list broke");
    assert!(controller.draft().await.is_empty(), "create itself succeeded");
    assert_eq!(controller.pending_refreshes(), 0);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(api.list_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_delayed_refresh() {
    let api = Arc::new(FakeEventsApi::listing(Vec::new()));
    let controller = EventsController::start(api.clone(), ControllerOptions::default()).await;

    controller.add_event().await.expect("add");
    assert_eq!(controller.pending_refreshes(), 1);
    controller.shutdown();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(api.list_calls(), 2);
    assert_eq!(controller.pending_refreshes(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_add_prevents_delayed_refresh() {
    let barrier = Arc::new(Barrier::new(2));
    let api = Arc::new(FakeEventsApi {
        create_barrier: Some(Arc::clone(&barrier)),
        ..FakeEventsApi::default()
    });
    let controller =
        Arc::new(EventsController::start(api.clone(), ControllerOptions::default()).await);

    let adding = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.add_event().await })
    };
    while api.created().is_empty() {
        tokio::task::yield_now().await;
    }

    controller.shutdown();
    barrier.wait().await;
    adding.await.expect("add task").expect("add");

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(api.list_calls(), 2, "initial fetch plus immediate refresh only");
    assert_eq!(controller.pending_refreshes(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_controller_cancels_delayed_refresh() {
    let api = Arc::new(FakeEventsApi::listing(Vec::new()));
    let controller = EventsController::start(api.clone(), ControllerOptions::default()).await;

    controller.add_event().await.expect("add");
    drop(controller);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(api.list_calls(), 2);
}

#[tokio::test]
async fn alert_error_reports_status_and_body() {
    let api = Arc::new(FakeEventsApi::default());
    let controller = EventsController::new(api, ControllerOptions::default());
    let mut rx = controller.subscribe();

    let failure = controller.alert_error("teapot", 418).await;

    assert_eq!(failure.to_string(), "code 418: teapot");
    assert_eq!(
        rx.recv().await.expect("event"),
        ControllerEvent::Alert(failure.clone())
    );
    assert_eq!(controller.current_alert().await, Some(failure));

    controller.dismiss_alert().await;
    assert_eq!(controller.current_alert().await, None);
}
