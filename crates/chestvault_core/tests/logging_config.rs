use chestvault_core::{
    init_logging, init_logging_from_config, logging_status, LoaderConfig, LoggingError,
};

#[test]
fn config_level_drives_logging_and_later_conflicts_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let log_dir = dir.path().join("logs");
    let config = LoaderConfig::from_toml_str(r#"log_level = "WARN""#).unwrap();

    init_logging_from_config(&config, &log_dir).unwrap();
    init_logging_from_config(&config, &log_dir).unwrap();

    let (level, active_dir) = logging_status().unwrap();
    assert_eq!(level, "warn");
    assert_eq!(active_dir, log_dir);
    assert!(log_dir.is_dir());

    let err = init_logging("info", &log_dir).unwrap_err();
    assert!(matches!(err, LoggingError::Conflict { active_level: "warn", .. }));
}

#[test]
fn unsupported_config_level_is_rejected_before_start() {
    let dir = tempfile::tempdir().unwrap();
    let config = LoaderConfig::from_toml_str(r#"log_level = "verbose""#).unwrap();

    let err = init_logging_from_config(&config, dir.path()).unwrap_err();

    assert!(matches!(err, LoggingError::UnsupportedLevel(level) if level == "verbose"));
}
