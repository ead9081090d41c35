use std::{fs, io, path::Path};

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use shared::{
    domain::Algorithm,
    protocol::{ProcessResponse, IMAGE_FIELD, PROCESS_ROUTE, SATURATION_FIELD},
};
use thiserror::Error;
use tracing::info;
use url::Url;

pub mod controller;

pub use controller::{FormController, UiMessage};

/// Why a processing request produced no result.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("processing service rejected the request with status {status}")]
    Rejected { status: u16 },
    #[error("request to processing service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("processing service returned an unreadable payload: {0}")]
    Decode(#[from] serde_json::Error),
    /// The request never left the client, e.g. the worker thread is gone.
    #[error("processing service unavailable: {0}")]
    Unavailable(String),
}

impl ProcessError {
    /// The server answered, but not with a success status.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// A file chosen in the file selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn read(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self { name, bytes })
    }
}

/// One `POST /process` call, as built by the controller on submit.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRequest {
    pub algorithm: Algorithm,
    pub file: SelectedFile,
    /// Wire value of the saturation factor; only set for the color algorithm.
    pub saturation: Option<String>,
}

#[async_trait]
pub trait ProcessingApi: Send + Sync {
    async fn process(&self, request: &ProcessRequest) -> Result<ProcessResponse, ProcessError>;
}

/// reqwest-backed client for the processing service.
#[derive(Debug, Clone)]
pub struct HttpProcessingClient {
    http: Client,
    process_url: Url,
}

impl HttpProcessingClient {
    pub fn new(server_url: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            http: Client::new(),
            process_url: server_url.join(PROCESS_ROUTE)?,
        })
    }

    pub fn process_url(&self) -> &Url {
        &self.process_url
    }
}

#[async_trait]
impl ProcessingApi for HttpProcessingClient {
    async fn process(&self, request: &ProcessRequest) -> Result<ProcessResponse, ProcessError> {
        let image = Part::bytes(request.file.bytes.clone()).file_name(request.file.name.clone());
        let mut form = Form::new().part(IMAGE_FIELD, image);
        if let Some(saturation) = &request.saturation {
            form = form.text(SATURATION_FIELD, saturation.clone());
        }

        let response = self
            .http
            .post(self.process_url.clone())
            .query(&[("algorithm", request.algorithm.as_str())])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProcessError::Rejected {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let payload: ProcessResponse = serde_json::from_slice(&body)?;
        info!(
            algorithm = %request.algorithm,
            grain_count = payload.grain_count,
            "processing finished"
        );
        Ok(payload)
    }
}

/// Drives one submit through `controller`, awaiting `api` in between.
/// Returns false when the controller refused to start a request.
pub async fn run_submission(controller: &mut FormController, api: &dyn ProcessingApi) -> bool {
    let Some(request) = controller.dispatch(UiMessage::SubmitRequested) else {
        return false;
    };
    let outcome = api.process(&request).await;
    controller.dispatch(UiMessage::ProcessCompleted(outcome));
    true
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
