//! Worker thread that performs network requests for the UI.

pub mod commands;
pub mod runtime;
