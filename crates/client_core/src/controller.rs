//! State of the upload form and the reactions to every user or network event.
//!
//! The controller owns the whole page model: the tab bar, the saturation
//! slider, the selected file, the submission phase, the loading overlay, both
//! result panels, the preview modal and the pending alert. Front ends feed it
//! [`UiMessage`]s through [`FormController::dispatch`] and render whatever it
//! exposes afterwards. The only work it hands back is a [`ProcessRequest`],
//! which the caller sends and answers with [`UiMessage::ProcessCompleted`].

use shared::{
    domain::{Algorithm, AlgorithmTab, ImageKind},
    protocol::{png_data_uri, ProcessResponse},
};
use tracing::{debug, error, warn};

use crate::{ProcessError, ProcessRequest, SelectedFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabBar {
    active: AlgorithmTab,
}

impl Default for TabBar {
    fn default() -> Self {
        Self {
            active: AlgorithmTab::ColorAlg,
        }
    }
}

impl TabBar {
    pub fn active(&self) -> AlgorithmTab {
        self.active
    }

    pub fn is_active(&self, tab: AlgorithmTab) -> bool {
        self.active == tab
    }

    /// Id of the only visible content panel.
    pub fn active_panel(&self) -> &'static str {
        self.active.target()
    }

    pub fn select(&mut self, tab: AlgorithmTab) {
        self.active = tab;
    }
}

/// Integer slider over `0..=100`; the factor is `position / 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaturationSlider {
    position: u8,
}

impl Default for SaturationSlider {
    fn default() -> Self {
        Self {
            position: Self::MAX,
        }
    }
}

impl SaturationSlider {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 100;

    pub fn position(&self) -> u8 {
        self.position
    }

    pub fn set_position(&mut self, position: u8) {
        self.position = position.clamp(Self::MIN, Self::MAX);
    }

    pub fn factor(&self) -> f64 {
        f64::from(self.position) / 100.0
    }

    /// Factor with one decimal, rounded from its stored binary value: 15 is
    /// 0.1499.. and shows "0.1". The exact halves (25 and 75) round up.
    pub fn display(&self) -> String {
        if self.position % 50 == 25 {
            return format!("0.{}", self.position / 10 + 1);
        }
        format!("{:.1}", self.factor())
    }

    /// Factor as sent in the `saturation` form field, shortest form
    /// ("1", "0.5", "0.35").
    pub fn wire_value(&self) -> String {
        self.factor().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPhase {
    Idle,
    Submitting { algorithm: Algorithm },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingOverlay {
    visible: bool,
}

impl LoadingOverlay {
    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// The spinner lives inside the overlay.
    pub fn spinner_visible(&self) -> bool {
        self.visible
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModalViewer {
    src: Option<String>,
}

impl ModalViewer {
    pub fn open(&mut self, src: impl Into<String>) {
        self.src = Some(src.into());
    }

    pub fn close(&mut self) {
        self.src = None;
    }

    pub fn is_open(&self) -> bool {
        self.src.is_some()
    }

    pub fn src(&self) -> Option<&str> {
        self.src.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultImage {
    pub kind: ImageKind,
    pub src: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedResults {
    pub average_length: f64,
    pub grain_count: u64,
    /// Always in [`ImageKind::ORDER`].
    pub images: Vec<ResultImage>,
}

impl RenderedResults {
    pub fn from_payload(payload: &ProcessResponse) -> Self {
        Self {
            average_length: payload.average_length,
            grain_count: payload.grain_count,
            images: ImageKind::ORDER
                .iter()
                .map(|kind| ResultImage {
                    kind: *kind,
                    src: png_data_uri(payload.image_b64(*kind)),
                })
                .collect(),
        }
    }

    pub fn summary_lines(&self) -> [String; 2] {
        [
            format!("Average Length: {}", self.average_length),
            format!("Grain Count: {}", self.grain_count),
        ]
    }

    pub fn image(&self, kind: ImageKind) -> Option<&ResultImage> {
        self.images.iter().find(|image| image.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultsPanel {
    algorithm: Algorithm,
    content: Option<RenderedResults>,
}

impl ResultsPanel {
    fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            content: None,
        }
    }

    pub fn id(&self) -> &'static str {
        self.algorithm.results_panel_id()
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn content(&self) -> Option<&RenderedResults> {
        self.content.as_ref()
    }

    fn render(&mut self, payload: &ProcessResponse) {
        self.content = Some(RenderedResults::from_payload(payload));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    UploadFirst,
    ProcessingFailed,
    RequestFailed,
}

impl Alert {
    pub fn message(&self) -> &'static str {
        match self {
            Alert::UploadFirst => "Please upload a file first.",
            Alert::ProcessingFailed => "Failed to process the image. Please try again.",
            Alert::RequestFailed => "An error occurred. Please try again.",
        }
    }
}

/// Everything that can happen on the form.
#[derive(Debug)]
pub enum UiMessage {
    TabSelected(AlgorithmTab),
    SaturationInput(u8),
    /// The file input changed; only the first file is kept.
    FilesChanged(Vec<SelectedFile>),
    SubmitRequested,
    ProcessCompleted(Result<ProcessResponse, ProcessError>),
    ResultImageClicked {
        algorithm: Algorithm,
        kind: ImageKind,
    },
    /// Click on the open modal or Escape.
    ModalDismissed,
    AlertDismissed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormController {
    tabs: TabBar,
    saturation: SaturationSlider,
    selected_file: Option<SelectedFile>,
    phase: SubmissionPhase,
    loader: LoadingOverlay,
    results: [ResultsPanel; 2],
    modal: ModalViewer,
    alert: Option<Alert>,
}

impl Default for FormController {
    fn default() -> Self {
        Self {
            tabs: TabBar::default(),
            saturation: SaturationSlider::default(),
            selected_file: None,
            phase: SubmissionPhase::Idle,
            loader: LoadingOverlay::default(),
            results: [
                ResultsPanel::new(Algorithm::ColorAlg),
                ResultsPanel::new(Algorithm::ContourAlg),
            ],
            modal: ModalViewer::default(),
            alert: None,
        }
    }
}

impl FormController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_saturation(position: u8) -> Self {
        let mut controller = Self::default();
        controller.saturation.set_position(position);
        controller
    }

    /// Applies `message`. Returns the request to send when a submit was accepted.
    pub fn dispatch(&mut self, message: UiMessage) -> Option<ProcessRequest> {
        match message {
            UiMessage::TabSelected(tab) => {
                self.tabs.select(tab);
                None
            }
            UiMessage::SaturationInput(position) => {
                self.saturation.set_position(position);
                None
            }
            UiMessage::FilesChanged(files) => {
                self.selected_file = files.into_iter().next();
                None
            }
            UiMessage::SubmitRequested => self.submit(),
            UiMessage::ProcessCompleted(outcome) => {
                self.complete(outcome);
                None
            }
            UiMessage::ResultImageClicked { algorithm, kind } => {
                let src = self
                    .results_panel(algorithm)
                    .content()
                    .and_then(|content| content.image(kind))
                    .map(|image| image.src.clone());
                match src {
                    Some(src) => self.modal.open(src),
                    None => debug!(%algorithm, ?kind, "click on an image that is not rendered"),
                }
                None
            }
            UiMessage::ModalDismissed => {
                self.modal.close();
                None
            }
            UiMessage::AlertDismissed => {
                self.alert = None;
                None
            }
        }
    }

    fn submit(&mut self) -> Option<ProcessRequest> {
        if let SubmissionPhase::Submitting { algorithm } = self.phase {
            debug!(%algorithm, "submit ignored while a request is in flight");
            return None;
        }
        let Some(file) = self.selected_file.clone() else {
            self.alert = Some(Alert::UploadFirst);
            return None;
        };

        let algorithm = self.tabs.active().algorithm();
        let saturation = algorithm
            .uses_saturation()
            .then(|| self.saturation.wire_value());

        self.loader.show();
        self.phase = SubmissionPhase::Submitting { algorithm };
        Some(ProcessRequest {
            algorithm,
            file,
            saturation,
        })
    }

    fn complete(&mut self, outcome: Result<ProcessResponse, ProcessError>) {
        let SubmissionPhase::Submitting { algorithm } = self.phase else {
            warn!("completion received with no request in flight");
            return;
        };
        self.phase = SubmissionPhase::Idle;
        self.loader.hide();

        match outcome {
            Ok(payload) => self.results_panel_mut(algorithm).render(&payload),
            Err(ProcessError::Rejected { status }) => {
                warn!(%algorithm, status, "processing request rejected");
                self.alert = Some(Alert::ProcessingFailed);
            }
            Err(error) => {
                error!(%algorithm, %error, "processing request failed");
                self.alert = Some(Alert::RequestFailed);
            }
        }
    }

    pub fn tabs(&self) -> &TabBar {
        &self.tabs
    }

    pub fn saturation(&self) -> &SaturationSlider {
        &self.saturation
    }

    /// The saturation controls only apply to the color algorithm.
    pub fn saturation_controls_visible(&self) -> bool {
        self.tabs.active().algorithm().uses_saturation()
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.selected_file.as_ref()
    }

    pub fn phase(&self) -> SubmissionPhase {
        self.phase
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.phase, SubmissionPhase::Submitting { .. })
    }

    pub fn loader(&self) -> &LoadingOverlay {
        &self.loader
    }

    pub fn results_panels(&self) -> &[ResultsPanel] {
        &self.results
    }

    pub fn results_panel(&self, algorithm: Algorithm) -> &ResultsPanel {
        match algorithm {
            Algorithm::ColorAlg => &self.results[0],
            Algorithm::ContourAlg => &self.results[1],
        }
    }

    fn results_panel_mut(&mut self, algorithm: Algorithm) -> &mut ResultsPanel {
        match algorithm {
            Algorithm::ColorAlg => &mut self.results[0],
            Algorithm::ContourAlg => &mut self.results[1],
        }
    }

    pub fn modal(&self) -> &ModalViewer {
        &self.modal
    }

    pub fn alert(&self) -> Option<Alert> {
        self.alert
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
