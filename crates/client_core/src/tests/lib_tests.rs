use super::*;
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use shared::{domain::AlgorithmTab, protocol::ProcessQuery};
use std::{collections::HashMap, sync::Arc};
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
};

/// What the fake service saw for one request.
#[derive(Debug)]
struct CapturedUpload {
    algorithm: Option<String>,
    fields: HashMap<String, Vec<u8>>,
    file_names: HashMap<String, String>,
}

#[derive(Clone)]
struct ServerState {
    tx: Arc<Mutex<Option<oneshot::Sender<CapturedUpload>>>>,
    reply: Reply,
}

#[derive(Clone, Copy)]
enum Reply {
    Payload,
    Status(StatusCode),
    Garbage,
}

fn sample_payload() -> ProcessResponse {
    ProcessResponse {
        average_length: 12.3,
        grain_count: 42,
        binary_image: "AAA".into(),
        contours_image: "BBB".into(),
        ellipses_image: "CCC".into(),
        histogram_image: "DDD".into(),
    }
}

async fn handle_process(
    State(state): State<ServerState>,
    Query(query): Query<ProcessQuery>,
    mut multipart: Multipart,
) -> axum::response::Response {
    use axum::response::IntoResponse;

    let mut fields = HashMap::new();
    let mut file_names = HashMap::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name() {
            file_names.insert(name.clone(), file_name.to_string());
        }
        let bytes = field.bytes().await.unwrap_or_default();
        fields.insert(name, bytes.to_vec());
    }
    if let Some(tx) = state.tx.lock().await.take() {
        let _ = tx.send(CapturedUpload {
            algorithm: query.algorithm,
            fields,
            file_names,
        });
    }

    match state.reply {
        Reply::Payload => Json(sample_payload()).into_response(),
        Reply::Status(status) => (status, "nope").into_response(),
        Reply::Garbage => (StatusCode::OK, "<html>not json</html>").into_response(),
    }
}

async fn spawn_process_server(
    reply: Reply,
) -> std::io::Result<(Url, oneshot::Receiver<CapturedUpload>)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel();
    let state = ServerState {
        tx: Arc::new(Mutex::new(Some(tx))),
        reply,
    };
    let app = Router::new()
        .route(PROCESS_ROUTE, post(handle_process))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    let url = Url::parse(&format!("http://{addr}")).expect("server url");
    Ok((url, rx))
}

fn loaded_controller(tab: AlgorithmTab) -> FormController {
    let mut controller = FormController::with_saturation(60);
    controller.dispatch(UiMessage::TabSelected(tab));
    controller.dispatch(UiMessage::FilesChanged(vec![SelectedFile::new(
        "grains.png",
        b"fake-png-bytes".to_vec(),
    )]));
    controller
}

#[test]
fn process_url_is_joined_onto_server_root() {
    let base = Url::parse("http://127.0.0.1:5000").expect("url");
    let client = HttpProcessingClient::new(&base).expect("client");
    assert_eq!(client.process_url().as_str(), "http://127.0.0.1:5000/process");
}

#[test]
fn selected_file_reads_name_and_bytes_from_disk() {
    let dir = std::env::temp_dir().join(format!("grainscope_client_{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("dir");
    let path = dir.join("sample.jpg");
    std::fs::write(&path, b"jpeg").expect("write");

    let file = SelectedFile::read(&path).expect("read");
    assert_eq!(file.name, "sample.jpg");
    assert_eq!(file.bytes, b"jpeg");

    std::fs::remove_dir_all(dir).expect("cleanup");
}

#[tokio::test]
async fn color_submission_posts_image_and_saturation() {
    let (server_url, captured_rx) = spawn_process_server(Reply::Payload)
        .await
        .expect("spawn server");
    let client = HttpProcessingClient::new(&server_url).expect("client");
    let mut controller = loaded_controller(AlgorithmTab::ColorAlg);

    assert!(run_submission(&mut controller, &client).await);

    let captured = captured_rx.await.expect("captured");
    assert_eq!(captured.algorithm.as_deref(), Some("coloralg"));
    assert_eq!(captured.fields.get(IMAGE_FIELD).map(Vec::as_slice), Some(&b"fake-png-bytes"[..]));
    assert_eq!(captured.file_names.get(IMAGE_FIELD).map(String::as_str), Some("grains.png"));
    assert_eq!(
        captured.fields.get(SATURATION_FIELD).map(Vec::as_slice),
        Some(&b"0.6"[..])
    );

    assert!(!controller.loader().is_visible());
    let content = controller
        .results_panel(Algorithm::ColorAlg)
        .content()
        .expect("rendered");
    assert_eq!(content.grain_count, 42);
    assert_eq!(content.images[3].src, "data:image/png;base64,DDD");
}

#[tokio::test]
async fn contour_submission_sends_no_saturation() {
    let (server_url, captured_rx) = spawn_process_server(Reply::Payload)
        .await
        .expect("spawn server");
    let client = HttpProcessingClient::new(&server_url).expect("client");
    let mut controller = loaded_controller(AlgorithmTab::ContourAlg);

    assert!(run_submission(&mut controller, &client).await);

    let captured = captured_rx.await.expect("captured");
    assert_eq!(captured.algorithm.as_deref(), Some("contouralg"));
    assert!(captured.fields.contains_key(IMAGE_FIELD));
    assert!(!captured.fields.contains_key(SATURATION_FIELD));
    assert!(controller
        .results_panel(Algorithm::ContourAlg)
        .content()
        .is_some());
}

#[tokio::test]
async fn error_status_becomes_rejection() {
    let (server_url, _captured_rx) = spawn_process_server(Reply::Status(StatusCode::BAD_REQUEST))
        .await
        .expect("spawn server");
    let client = HttpProcessingClient::new(&server_url).expect("client");
    let request = ProcessRequest {
        algorithm: Algorithm::ContourAlg,
        file: SelectedFile::new("a.png", vec![1, 2, 3]),
        saturation: None,
    };

    let err = client.process(&request).await.expect_err("rejected");
    assert!(matches!(err, ProcessError::Rejected { status: 400 }));
    assert!(err.is_rejection());
}

#[tokio::test]
async fn failed_submission_alerts_through_controller() {
    let (server_url, _captured_rx) =
        spawn_process_server(Reply::Status(StatusCode::INTERNAL_SERVER_ERROR))
            .await
            .expect("spawn server");
    let client = HttpProcessingClient::new(&server_url).expect("client");
    let mut controller = loaded_controller(AlgorithmTab::ColorAlg);

    assert!(run_submission(&mut controller, &client).await);
    assert!(!controller.loader().is_visible());
    assert_eq!(
        controller.alert().map(|a| a.message()),
        Some("Failed to process the image. Please try again.")
    );
}

#[tokio::test]
async fn unparsable_body_is_decode_error() {
    let (server_url, _captured_rx) = spawn_process_server(Reply::Garbage)
        .await
        .expect("spawn server");
    let client = HttpProcessingClient::new(&server_url).expect("client");
    let mut controller = loaded_controller(AlgorithmTab::ContourAlg);

    assert!(run_submission(&mut controller, &client).await);
    assert_eq!(
        controller.alert().map(|a| a.message()),
        Some("An error occurred. Please try again.")
    );
}

#[tokio::test]
async fn unreachable_service_is_transport_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let server_url = Url::parse(&format!("http://{addr}")).expect("url");
    let client = HttpProcessingClient::new(&server_url).expect("client");
    let mut controller = loaded_controller(AlgorithmTab::ColorAlg);

    assert!(run_submission(&mut controller, &client).await);
    assert!(!controller.is_submitting());
    assert!(!controller.loader().is_visible());
    assert_eq!(
        controller.alert().map(|a| a.message()),
        Some("An error occurred. Please try again.")
    );
}

#[tokio::test]
async fn submission_without_file_never_calls_service() {
    struct PanicApi;

    #[async_trait]
    impl ProcessingApi for PanicApi {
        async fn process(&self, _request: &ProcessRequest) -> Result<ProcessResponse, ProcessError> {
            panic!("no request expected");
        }
    }

    let mut controller = FormController::new();
    assert!(!run_submission(&mut controller, &PanicApi).await);
    assert_eq!(
        controller.alert().map(|a| a.message()),
        Some("Please upload a file first.")
    );
}
