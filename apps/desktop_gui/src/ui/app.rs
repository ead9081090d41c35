use std::collections::HashSet;

use client_core::{
    controller::{RenderedResults, ResultsPanel, SaturationSlider},
    FormController, ProcessError, SelectedFile, UiMessage,
};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use serde::{Deserialize, Serialize};
use shared::domain::{ids, AlgorithmTab};
use url::Url;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::{events::UiEvent, orchestration::queue_command};
use crate::ui::textures::TextureCache;

pub const SETTINGS_STORAGE_KEY: &str = "grainscope.settings";
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

const GRID_IMAGE_MAX: f32 = 320.0;
const MODAL_IMAGE_MAX: egui::Vec2 = egui::vec2(960.0, 720.0);
const IMAGE_FILE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// What survives a restart of the desktop app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedSettings {
    pub server_url: String,
    pub saturation: u8,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            saturation: SaturationSlider::MAX,
        }
    }
}

impl PersistedSettings {
    pub fn from_json(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(settings) => Some(settings),
            Err(err) => {
                tracing::warn!("ignoring unreadable persisted settings: {err}");
                None
            }
        }
    }
}

pub struct GrainscopeApp {
    form: FormController,
    server_url: String,
    status: String,
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    textures: TextureCache,
}

impl GrainscopeApp {
    pub fn new(
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        settings: PersistedSettings,
    ) -> Self {
        Self {
            form: FormController::with_saturation(settings.saturation),
            server_url: settings.server_url,
            status: String::new(),
            cmd_tx,
            ui_rx,
            textures: TextureCache::default(),
        }
    }

    fn persisted_settings(&self) -> PersistedSettings {
        PersistedSettings {
            server_url: self.server_url.clone(),
            saturation: self.form.saturation().position(),
        }
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::ProcessFinished(outcome) => {
                    if let Err(err) = &outcome {
                        self.status = err.to_string();
                    } else {
                        self.status.clear();
                    }
                    self.form.dispatch(UiMessage::ProcessCompleted(outcome));
                }
                UiEvent::BackendFailed(reason) => {
                    self.status = reason.clone();
                    if self.form.is_submitting() {
                        self.form.dispatch(UiMessage::ProcessCompleted(Err(
                            ProcessError::Unavailable(reason),
                        )));
                    }
                }
            }
        }
    }

    fn apply(&mut self, messages: Vec<UiMessage>) {
        for message in messages {
            let submit = matches!(message, UiMessage::SubmitRequested);
            let request = self.form.dispatch(message);
            if let (true, Some(request)) = (submit, request) {
                self.send_request(request);
            }
        }
    }

    /// Hands an accepted submit to the backend; any failure to do so completes
    /// the submission right away so the overlay never stays up.
    fn send_request(&mut self, request: client_core::ProcessRequest) {
        let queued = Url::parse(self.server_url.trim())
            .map_err(|err| format!("invalid server url '{}': {err}", self.server_url))
            .and_then(|server_url| {
                queue_command(
                    &self.cmd_tx,
                    BackendCommand::Process {
                        server_url,
                        request,
                    },
                )
            });
        if let Err(reason) = queued {
            self.status = reason.clone();
            self.form
                .dispatch(UiMessage::ProcessCompleted(Err(ProcessError::Unavailable(
                    reason,
                ))));
        }
    }

    fn pick_file(&mut self, messages: &mut Vec<UiMessage>) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", &IMAGE_FILE_EXTENSIONS)
            .pick_file()
        else {
            return;
        };
        match SelectedFile::read(&path) {
            Ok(file) => {
                self.status.clear();
                messages.push(UiMessage::FilesChanged(vec![file]));
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), "failed to read selected file: {err}");
                self.status = format!("Couldn't read {}: {err}", path.display());
            }
        }
    }

    fn show_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Grain analysis");
                ui.separator();
                ui.label("Server:");
                ui.add_enabled(
                    !self.form.is_submitting(),
                    egui::TextEdit::singleline(&mut self.server_url).desired_width(260.0),
                );
            });
            if !self.status.is_empty() {
                ui.colored_label(ui.visuals().warn_fg_color, &self.status);
            }
        });
    }

    fn show_form(&mut self, ctx: &egui::Context, messages: &mut Vec<UiMessage>) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                for tab in AlgorithmTab::ALL {
                    let button =
                        egui::Button::new(tab.label()).selected(self.form.tabs().is_active(tab));
                    if ui.add(button).clicked() {
                        messages.push(UiMessage::TabSelected(tab));
                    }
                }
            });
            ui.separator();

            if self.form.saturation_controls_visible() {
                ui.push_id(ids::SATURATION_CONTROLS, |ui| {
                    ui.horizontal(|ui| {
                        ui.label("Saturation Factor:");
                        let mut position = self.form.saturation().position();
                        let slider = egui::Slider::new(
                            &mut position,
                            SaturationSlider::MIN..=SaturationSlider::MAX,
                        )
                        .show_value(false);
                        if ui.add(slider).changed() {
                            messages.push(UiMessage::SaturationInput(position));
                        }
                        ui.label(self.form.saturation().display());
                    });
                });
            }

            ui.push_id(ids::UPLOAD_FORM, |ui| {
                ui.horizontal(|ui| {
                    if ui.button("Choose image…").clicked() {
                        self.pick_file(messages);
                    }
                    match self.form.selected_file() {
                        Some(file) => ui.label(&file.name),
                        None => ui.weak("No file selected"),
                    };
                    let submit = egui::Button::new("Upload and Process");
                    if ui.add_enabled(!self.form.is_submitting(), submit).clicked() {
                        messages.push(UiMessage::SubmitRequested);
                    }
                });
            });
            ui.separator();

            let algorithm = self.form.tabs().active().algorithm();
            let panel = self.form.results_panel(algorithm).clone();
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.show_results_panel(ui, &panel, messages);
            });
        });
    }

    fn show_results_panel(
        &mut self,
        ui: &mut egui::Ui,
        panel: &ResultsPanel,
        messages: &mut Vec<UiMessage>,
    ) {
        let Some(content) = panel.content() else {
            ui.weak("No results yet.");
            return;
        };
        ui.push_id(panel.id(), |ui| {
            for line in content.summary_lines() {
                ui.label(line);
            }
            self.show_image_grid(ui, panel, content, messages);
        });
    }

    fn show_image_grid(
        &mut self,
        ui: &mut egui::Ui,
        panel: &ResultsPanel,
        content: &RenderedResults,
        messages: &mut Vec<UiMessage>,
    ) {
        let cell = ((ui.available_width() - ui.spacing().item_spacing.x) / 2.0)
            .clamp(80.0, GRID_IMAGE_MAX);
        egui::Grid::new("result_image_grid")
            .num_columns(2)
            .spacing([8.0, 8.0])
            .show(ui, |ui| {
                for (index, image) in content.images.iter().enumerate() {
                    ui.vertical(|ui| {
                        ui.small(image.kind.label());
                        match self.textures.get_or_load(ui.ctx(), &image.src) {
                            Some(texture) => {
                                let mut size = texture.size_vec2();
                                size *= (cell / size.x).min(cell / size.y).min(1.0);
                                let button = egui::ImageButton::new(
                                    egui::Image::new(&texture).fit_to_exact_size(size),
                                )
                                .frame(false);
                                if ui.add(button).on_hover_text("Click to enlarge").clicked() {
                                    messages.push(UiMessage::ResultImageClicked {
                                        algorithm: panel.algorithm(),
                                        kind: image.kind,
                                    });
                                }
                            }
                            None => {
                                ui.colored_label(ui.visuals().error_fg_color, "Image unavailable");
                            }
                        }
                    });
                    if index % 2 == 1 {
                        ui.end_row();
                    }
                }
            });
    }

    fn show_modal(&mut self, ctx: &egui::Context, messages: &mut Vec<UiMessage>) {
        let Some(src) = self.form.modal().src().map(str::to_owned) else {
            return;
        };
        let texture = self.textures.get_or_load(ctx, &src);
        let response = egui::Modal::new(egui::Id::new(ids::MODAL)).show(ctx, |ui| {
            let Some(texture) = texture else {
                return ui.button("Close").clicked();
            };
            let max = MODAL_IMAGE_MAX;
            let mut size = texture.size_vec2();
            size *= (max.x / size.x).min(max.y / size.y).min(1.0);
            ui.push_id(ids::MODAL_IMAGE, |ui| {
                ui.add(
                    egui::Image::new(&texture)
                        .fit_to_exact_size(size)
                        .sense(egui::Sense::click()),
                )
                .clicked()
            })
            .inner
        });
        if response.inner || response.should_close() {
            messages.push(UiMessage::ModalDismissed);
        }
    }

    fn show_loader(&self, ctx: &egui::Context) {
        if !self.form.loader().is_visible() {
            return;
        }
        egui::Modal::new(egui::Id::new(ids::LOADER_MODAL)).show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.form.loader().spinner_visible() {
                    ui.spinner();
                }
                ui.label("Processing image…");
            });
        });
    }

    fn show_alert(&self, ctx: &egui::Context, messages: &mut Vec<UiMessage>) {
        let Some(alert) = self.form.alert() else {
            return;
        };
        egui::Window::new("Notice")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(alert.message());
                if ui.button("OK").clicked() {
                    messages.push(UiMessage::AlertDismissed);
                }
            });
    }

    fn prune_textures(&mut self) {
        let mut live: HashSet<&str> = self
            .form
            .results_panels()
            .iter()
            .filter_map(|panel| panel.content())
            .flat_map(|content| content.images.iter().map(|image| image.src.as_str()))
            .collect();
        if let Some(src) = self.form.modal().src() {
            live.insert(src);
        }
        self.textures.retain_sources(&live);
    }
}

impl eframe::App for GrainscopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();

        let mut messages = Vec::new();
        self.show_top_bar(ctx);
        self.show_form(ctx, &mut messages);
        self.show_modal(ctx, &mut messages);
        self.show_loader(ctx);
        self.show_alert(ctx, &mut messages);

        if self.form.modal().is_open() && ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            messages.push(UiMessage::ModalDismissed);
        }

        self.apply(messages);
        self.prune_textures();

        if self.form.is_submitting() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        if let Ok(serialized) = serde_json::to_string(&self.persisted_settings()) {
            storage.set_string(SETTINGS_STORAGE_KEY, serialized);
        }
    }
}
