use lfp_bms::config::Config;
use std::fs;

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("config.yaml");

    let mut cfg = Config::default();
    cfg.pack.nominal_capacity_ah = 12.0;
    cfg.protection.charge_ov_recover_ms = 8000;
    cfg.soh.state_file = tmp_dir
        .path()
        .join("soh.json")
        .to_string_lossy()
        .to_string();

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.pack.nominal_capacity_ah, 12.0);
    assert_eq!(loaded.protection.charge_ov_recover_ms, 8000);
    assert_eq!(loaded.soh.state_file, cfg.soh.state_file);
    assert!(loaded.validate().is_ok());
}

#[test]
fn config_validation_errors() {
    let mut cfg = Config::default();

    // Discharge UV release must sit above the trip
    cfg.protection.discharge_uv_release_v = 2.4;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.protection.discharge_temp_low_release_c = -12.0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.schedule.soc_interval_ms = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.balancing.off_ms = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.web.port = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.soh.namespace.clear();
    assert!(cfg.validate().is_err());
}

#[test]
fn from_file_with_invalid_yaml_fails() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), b"pack: [unclosed").unwrap();
    let err = Config::from_file(tmp.path()).unwrap_err();
    let msg = format!("{}", err);
    assert!(msg.contains("Serialization error"));
}

#[test]
fn partial_file_keeps_other_defaults() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(
        tmp.path(),
        b"balancing:\n  on_ms: 2000\n  off_ms: 8000\nlogging:\n  level: DEBUG\n",
    )
    .unwrap();
    let cfg = Config::from_file(tmp.path()).unwrap();
    assert_eq!(cfg.balancing.on_ms, 2000);
    assert_eq!(cfg.balancing.off_ms, 8000);
    assert_eq!(cfg.balancing.start_delta_v, 0.10);
    assert_eq!(cfg.logging.level, "DEBUG");
    assert_eq!(cfg.soc.ocv_blend_alpha, 0.85);
}
