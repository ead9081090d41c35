use std::{fs, path::Path};

use anyhow::Context;
use grain_analysis::AnalysisParams;
use serde::Deserialize;
use tracing::warn;

const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bind_addr: String,
    pub max_upload_bytes: usize,
    pub calibration_factor: f64,
    pub max_length_mm: f64,
    pub histogram_bins: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let params = AnalysisParams::default();
        Self {
            bind_addr: "127.0.0.1:5000".into(),
            max_upload_bytes: 16 * 1024 * 1024,
            calibration_factor: params.calibration_factor,
            max_length_mm: params.max_length_mm,
            histogram_bins: params.histogram_bins,
        }
    }
}

impl Settings {
    pub fn analysis_params(&self) -> AnalysisParams {
        AnalysisParams {
            calibration_factor: self.calibration_factor,
            max_length_mm: self.max_length_mm,
            histogram_bins: self.histogram_bins,
        }
    }
}

/// Keys accepted in `server.toml`; anything missing keeps its default.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileSettings {
    bind_addr: Option<String>,
    max_upload_bytes: Option<usize>,
    calibration_factor: Option<f64>,
    max_length_mm: Option<f64>,
    histogram_bins: Option<usize>,
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    match read_settings_file(Path::new(SETTINGS_FILE)) {
        Ok(Some(raw)) => {
            if let Err(error) = apply_file(&mut settings, &raw) {
                warn!(file = SETTINGS_FILE, %error, "ignoring invalid settings file");
            }
        }
        Ok(None) => {}
        Err(error) => warn!(file = SETTINGS_FILE, %error, "unable to read settings file"),
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn read_settings_file(path: &Path) -> anyhow::Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .with_context(|| format!("failed to read '{}'", path.display()))
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw).context("failed to parse settings")?;

    if let Some(v) = file_cfg.bind_addr {
        settings.bind_addr = v;
    }
    if let Some(v) = file_cfg.max_upload_bytes {
        settings.max_upload_bytes = v;
    }
    if let Some(v) = file_cfg.calibration_factor {
        settings.calibration_factor = v;
    }
    if let Some(v) = file_cfg.max_length_mm {
        settings.max_length_mm = v;
    }
    if let Some(v) = file_cfg.histogram_bins {
        settings.histogram_bins = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("GRAINSCOPE_BIND") {
        settings.bind_addr = v;
    }
    if let Some(v) = lookup("APP__BIND_ADDR") {
        settings.bind_addr = v;
    }

    if let Some(v) = parsed(&lookup, "APP__MAX_UPLOAD_BYTES") {
        settings.max_upload_bytes = v;
    }
    if let Some(v) = parsed(&lookup, "APP__CALIBRATION_FACTOR") {
        settings.calibration_factor = v;
    }
    if let Some(v) = parsed(&lookup, "APP__MAX_LENGTH_MM") {
        settings.max_length_mm = v;
    }
    if let Some(v) = parsed(&lookup, "APP__HISTOGRAM_BINS") {
        settings.histogram_bins = v;
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
