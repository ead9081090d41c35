//! Glue between the form controller and the backend worker.

pub mod events;
pub mod orchestration;
