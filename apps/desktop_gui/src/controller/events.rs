//! UI/backend events and error modeling for desktop GUI controller.

use client_core::{ControllerEvent, RequestFailure};
use shared::domain::Event;

pub enum UiEvent {
    Info(String),
    EventsUpdated(Vec<Event>),
    DraftCleared,
    Error(UiError),
}

impl From<ControllerEvent> for UiEvent {
    fn from(value: ControllerEvent) -> Self {
        match value {
            ControllerEvent::EventsReplaced(events) => UiEvent::EventsUpdated(events),
            ControllerEvent::DraftCleared => UiEvent::DraftCleared,
            ControllerEvent::Alert(failure) => UiEvent::Error(UiError::from(failure)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    Connect,
    Request,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiError {
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn new(context: UiErrorContext, message: impl Into<String>) -> Self {
        Self {
            context,
            message: message.into(),
        }
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn title(&self) -> &'static str {
        match self.context {
            UiErrorContext::BackendStartup => "Backend unavailable",
            UiErrorContext::Connect => "Cannot connect",
            UiErrorContext::Request => "Request failed",
        }
    }
}

impl From<RequestFailure> for UiError {
    fn from(value: RequestFailure) -> Self {
        Self::new(UiErrorContext::Request, value.to_string())
    }
}
