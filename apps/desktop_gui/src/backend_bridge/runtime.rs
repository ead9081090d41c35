//! Runtime bridge between UI command queue and backend event intake.

use std::{collections::HashMap, sync::Arc, thread};

use client_core::{HttpProcessingClient, ProcessError, ProcessingApi};
use crossbeam_channel::{Receiver, Sender};
use url::Url;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::UiEvent;

pub fn spawn_backend_thread(
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                tracing::error!("failed to build backend runtime: {err}");
                send_event(
                    &ui_tx,
                    UiEvent::BackendFailed(format!("backend worker startup failure: {err}")),
                );
                return;
            }
        };
        tracing::info!("backend worker started");

        let mut clients: HashMap<Url, Arc<HttpProcessingClient>> = HashMap::new();
        for cmd in cmd_rx.iter() {
            tracing::debug!(command = cmd.name(), "backend received command");
            match cmd {
                BackendCommand::Process {
                    server_url,
                    request,
                } => {
                    let client = match client_for(&mut clients, &server_url) {
                        Ok(client) => client,
                        Err(err) => {
                            send_event(&ui_tx, UiEvent::ProcessFinished(Err(err)));
                            continue;
                        }
                    };
                    let ui_tx = ui_tx.clone();
                    runtime.spawn(async move {
                        let outcome = client.process(&request).await;
                        send_event(&ui_tx, UiEvent::ProcessFinished(outcome));
                    });
                }
            }
        }
        tracing::info!("backend command queue closed; worker exiting");
    })
}

fn client_for(
    clients: &mut HashMap<Url, Arc<HttpProcessingClient>>,
    server_url: &Url,
) -> Result<Arc<HttpProcessingClient>, ProcessError> {
    if let Some(client) = clients.get(server_url) {
        return Ok(Arc::clone(client));
    }
    let client = HttpProcessingClient::new(server_url)
        .map(Arc::new)
        .map_err(|err| ProcessError::Unavailable(format!("invalid server url '{server_url}': {err}")))?;
    clients.insert(server_url.clone(), Arc::clone(&client));
    Ok(client)
}

/// Blocks while the UI queue is full; a completion must never be dropped.
fn send_event(ui_tx: &Sender<UiEvent>, event: UiEvent) {
    if ui_tx.send(event).is_err() {
        tracing::error!("backend->ui event queue disconnected; dropping event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_core::SelectedFile;
    use crossbeam_channel::bounded;
    use shared::domain::Algorithm;
    use std::time::Duration;

    fn unreachable_process_command() -> BackendCommand {
        std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .and_then(|listener| listener.local_addr())
            .expect("free port")
            .port();
        BackendCommand::Process {
            server_url: Url::parse(&format!("http://127.0.0.1:{port}")).expect("url"),
            request: client_core::ProcessRequest {
                algorithm: Algorithm::ContourAlg,
                file: SelectedFile::new("a.png", vec![1, 2, 3]),
                saturation: None,
            },
        }
    }

    #[test]
    fn unreachable_service_still_reports_completion() {
        let (cmd_tx, cmd_rx) = bounded(4);
        let (ui_tx, ui_rx) = bounded(4);
        let worker = spawn_backend_thread(cmd_rx, ui_tx);

        cmd_tx.send(unreachable_process_command()).expect("queue");

        let event = ui_rx
            .recv_timeout(Duration::from_secs(20))
            .expect("completion event");
        assert!(matches!(
            event,
            UiEvent::ProcessFinished(Err(ProcessError::Transport(_)))
        ));

        drop(cmd_tx);
        worker.join().expect("worker exits");
    }

    #[test]
    fn completion_waits_for_room_in_a_full_ui_queue() {
        let (cmd_tx, cmd_rx) = bounded(4);
        let (ui_tx, ui_rx) = bounded(1);
        ui_tx
            .send(UiEvent::BackendFailed("earlier event".into()))
            .expect("fill ui queue");
        let worker = spawn_backend_thread(cmd_rx, ui_tx);

        cmd_tx.send(unreachable_process_command()).expect("queue");
        // give the request time to fail while the queue is still full
        std::thread::sleep(Duration::from_millis(500));

        assert!(matches!(
            ui_rx.recv_timeout(Duration::from_secs(5)).expect("filler"),
            UiEvent::BackendFailed(_)
        ));
        let event = ui_rx
            .recv_timeout(Duration::from_secs(20))
            .expect("completion event");
        assert!(matches!(event, UiEvent::ProcessFinished(Err(_))));

        drop(cmd_tx);
        worker.join().expect("worker exits");
    }
}
