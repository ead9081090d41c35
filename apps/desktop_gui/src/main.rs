mod backend_bridge;
mod controller;
mod ui;

use clap::Parser;
use crossbeam_channel::bounded;
use eframe::egui;
use tracing_subscriber::EnvFilter;

use backend_bridge::{commands::BackendCommand, runtime::spawn_backend_thread};
use controller::events::UiEvent;
use ui::{app::SETTINGS_STORAGE_KEY, GrainscopeApp, PersistedSettings};

const APP_NAME: &str = "Grainscope";

#[derive(Parser, Debug)]
struct Args {
    /// Overrides the server url remembered from the last session.
    #[arg(long)]
    server_url: Option<String>,
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(16);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(64);
    spawn_backend_thread(cmd_rx, ui_tx);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_NAME)
            .with_inner_size([900.0, 760.0])
            .with_min_inner_size([560.0, 480.0]),
        ..Default::default()
    };
    eframe::run_native(
        APP_NAME,
        options,
        Box::new(move |cc| {
            let mut settings = cc
                .storage
                .and_then(|storage| storage.get_string(SETTINGS_STORAGE_KEY))
                .and_then(|text| PersistedSettings::from_json(&text))
                .unwrap_or_default();
            if let Some(server_url) = args.server_url {
                settings.server_url = server_url;
            }
            Ok(Box::new(GrainscopeApp::new(cmd_tx, ui_rx, settings)))
        }),
    )
}
