//! Loading node configuration from disk.

use std::io::Write;

use orv_node::{ConfirmationHeightMode, LogFormat, NodeConfig};
use orv_types::NetworkId;

#[test]
fn written_config_loads_back_unchanged() {
    let mut config = NodeConfig::default();
    config.network = NetworkId::Test;
    config.log_format = LogFormat::Json;
    config.enable_metrics = true;
    config.confirmation_height.mode = ConfirmationHeightMode::Unbounded;
    config.confirmation_height.unbounded_cutoff = 64;

    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(config.to_toml_string().unwrap().as_bytes())
        .expect("write config");

    let loaded = NodeConfig::from_toml_file(file.path()).expect("config loads");
    assert_eq!(loaded, config);
    assert!(loaded.validate().is_ok());
}

#[test]
fn hand_written_config_fills_in_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("orv.toml");
    std::fs::write(
        &path,
        "log_level = \"debug\"\n\n[confirmation_height]\nmode = \"automatic\"\nunbounded_cutoff = 10\n",
    )
    .unwrap();

    let config = NodeConfig::from_toml_file(&path).unwrap();
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.confirmation_height.mode, ConfirmationHeightMode::Automatic);
    assert_eq!(config.confirmation_height.unbounded_cutoff, 10);
    assert_eq!(config.confirmation_height.min_batch_write_size, 16_384);
    assert_eq!(config.request_loop_interval_ms, 500);
}

#[test]
fn malformed_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "confirmation_height = [").unwrap();
    assert!(NodeConfig::from_toml_file(&path).is_err());
}
