//! Worker side of the GUI: owns the tokio runtime and the events controller.

pub mod commands;
pub mod runtime;
