//! Backend commands queued from UI to backend worker.

use client_core::ProcessRequest;
use url::Url;

pub enum BackendCommand {
    Process {
        server_url: Url,
        request: ProcessRequest,
    },
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::Process { .. } => "process",
        }
    }
}
