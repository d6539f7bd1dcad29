//! Client side of the events board: the HTTP seam and the view-model that
//! hosting views drive.

pub mod api;
pub mod controller;
pub mod error;

pub use api::{EventsApi, HttpEventsApi};
pub use controller::{ControllerEvent, ControllerOptions, EventsController, DEFAULT_REFRESH_DELAY};
pub use error::RequestFailure;
