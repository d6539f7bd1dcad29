//! Runtime bridge between UI command queue and backend event intake.

use std::{sync::Arc, thread};

use client_core::{ControllerEvent, ControllerOptions, EventsController, HttpEventsApi};
use crossbeam_channel::{Receiver, Sender};
use tokio::{sync::broadcast, task::JoinHandle};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

struct Connection {
    controller: Arc<EventsController>,
    forwarder: JoinHandle<()>,
}

impl Connection {
    fn close(self) {
        self.controller.shutdown();
        self.forwarder.abort();
    }
}

pub fn launch(cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::new(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let mut connection: Option<Connection> = None;

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    BackendCommand::Connect { server_url } => {
                        if let Some(previous) = connection.take() {
                            previous.close();
                        }
                        connection = connect(&server_url, &ui_tx);
                    }
                    BackendCommand::Refresh => {
                        with_controller(&connection, &ui_tx, |controller| async move {
                            let _ = controller.fetch_events().await;
                        });
                    }
                    BackendCommand::SubmitDraft { draft } => {
                        with_controller(&connection, &ui_tx, |controller| async move {
                            controller.replace_draft(draft).await;
                            let _ = controller.add_event().await;
                        });
                    }
                    BackendCommand::DismissAlert => {
                        with_controller(&connection, &ui_tx, |controller| async move {
                            controller.dismiss_alert().await;
                        });
                    }
                }
            }

            if let Some(connection) = connection.take() {
                connection.close();
            }
            tracing::info!("ui command queue closed; backend worker stopping");
        });
    });
}

fn connect(server_url: &str, ui_tx: &Sender<UiEvent>) -> Option<Connection> {
    let api = match HttpEventsApi::new(server_url) {
        Ok(api) => api,
        Err(err) => {
            let _ = ui_tx.try_send(UiEvent::Error(UiError::new(
                UiErrorContext::Connect,
                format!("invalid server url '{server_url}': {err}"),
            )));
            return None;
        }
    };

    let controller = Arc::new(EventsController::new(
        Arc::new(api),
        ControllerOptions::default(),
    ));
    let forwarder = tokio::spawn(forward_controller_events(
        controller.subscribe(),
        ui_tx.clone(),
    ));

    let initial = Arc::clone(&controller);
    tokio::spawn(async move {
        let _ = initial.fetch_events().await;
    });

    let _ = ui_tx.try_send(UiEvent::Info(format!("Connected to {server_url}")));
    tracing::info!(%server_url, "events controller started");
    Some(Connection {
        controller,
        forwarder,
    })
}

/// Runs an operation without blocking the command loop; operations may overlap.
fn with_controller<F, Fut>(connection: &Option<Connection>, ui_tx: &Sender<UiEvent>, op: F)
where
    F: FnOnce(Arc<EventsController>) -> Fut,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    match connection {
        Some(connection) => {
            tokio::spawn(op(Arc::clone(&connection.controller)));
        }
        None => {
            let _ = ui_tx.try_send(UiEvent::Info("Connect to a server first".to_string()));
        }
    }
}

async fn forward_controller_events(
    mut events: broadcast::Receiver<ControllerEvent>,
    ui_tx: Sender<UiEvent>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if ui_tx.try_send(UiEvent::from(event)).is_err() {
                    tracing::warn!("ui event queue unavailable; dropping controller update");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "controller updates lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
