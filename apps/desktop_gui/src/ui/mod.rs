//! UI layer for the events board: the app shell and its panels.

pub mod app;

pub use app::{EventsBoardApp, DEFAULT_SERVER_URL};
