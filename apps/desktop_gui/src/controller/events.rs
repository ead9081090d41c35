//! Events sent from the backend worker to the UI thread.

use client_core::ProcessError;
use shared::protocol::ProcessResponse;

pub enum UiEvent {
    ProcessFinished(Result<ProcessResponse, ProcessError>),
    /// The worker could not start; every later submit will fail.
    BackendFailed(String),
}
