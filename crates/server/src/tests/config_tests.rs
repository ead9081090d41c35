use super::{apply_env, apply_file, read_settings_file, Settings};

use std::{
    collections::HashMap,
    env, fs,
    time::{SystemTime, UNIX_EPOCH},
};

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_match_the_reference_deployment() {
    let settings = Settings::default();
    assert_eq!(settings.bind_addr, "127.0.0.1:5000");
    assert_eq!(settings.max_upload_bytes, 16 * 1024 * 1024);
    assert_eq!(settings.histogram_bins, 60);
    assert_eq!(settings.max_length_mm, 3.0);
    assert_eq!(settings.analysis_params(), grain_analysis::AnalysisParams::default());
}

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
            bind_addr = "0.0.0.0:8080"
            max_upload_bytes = 1024
            max_length_mm = 2.5
        "#,
    )
    .expect("apply");
    assert_eq!(settings.bind_addr, "0.0.0.0:8080");
    assert_eq!(settings.max_upload_bytes, 1024);
    assert_eq!(settings.max_length_mm, 2.5);
    assert_eq!(settings.histogram_bins, 60);
}

#[test]
fn unknown_file_keys_are_rejected() {
    let mut settings = Settings::default();
    assert!(apply_file(&mut settings, "database_url = \"sqlite://x\"").is_err());
    assert_eq!(settings, Settings::default());
}

#[test]
fn app_prefixed_bind_wins_over_short_name() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env_of(&[
            ("GRAINSCOPE_BIND", "127.0.0.1:6000"),
            ("APP__BIND_ADDR", "127.0.0.1:7000"),
        ]),
    );
    assert_eq!(settings.bind_addr, "127.0.0.1:7000");
}

#[test]
fn unparsable_env_values_are_ignored() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env_of(&[
            ("APP__HISTOGRAM_BINS", "many"),
            ("APP__CALIBRATION_FACTOR", " 0.01 "),
        ]),
    );
    assert_eq!(settings.histogram_bins, 60);
    assert_eq!(settings.calibration_factor, 0.01);
}

#[test]
fn missing_settings_file_is_not_an_error() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = env::temp_dir().join(format!("grainscope_server_test_{suffix}"));
    fs::create_dir_all(&temp_root).expect("temp dir");

    let path = temp_root.join("server.toml");
    assert!(read_settings_file(&path).expect("read").is_none());

    fs::write(&path, "histogram_bins = 12\n").expect("write");
    let raw = read_settings_file(&path).expect("read").expect("contents");
    let mut settings = Settings::default();
    apply_file(&mut settings, &raw).expect("apply");
    assert_eq!(settings.histogram_bins, 12);

    fs::remove_dir_all(temp_root).expect("cleanup");
}
