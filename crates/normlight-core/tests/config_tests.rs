use normlight_core::{
    ConfigFile, CoreError, CurveProfile, FixtureCalibration, RoomConfig, CONFIG_FILE_VERSION,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn sample_config() -> ConfigFile {
    let mut config = ConfigFile::default();
    config.fixtures = vec![
        FixtureCalibration::identity("light.ceiling"),
        FixtureCalibration::new("light.floor_lamp", 10, 210, CurveProfile::Linear).unwrap(),
    ];
    config.rooms = vec![RoomConfig::new(
        "living_room",
        vec!["light.ceiling".to_string(), "light.floor_lamp".to_string()],
    )];
    config.control.echo_window_ms = 1500;
    config
}

#[test]
fn test_config_ron_roundtrip() {
    let original = sample_config();
    let file = NamedTempFile::new().unwrap();
    let path = file.path().with_extension("ron");

    original.save(&path).unwrap();
    let loaded = ConfigFile::load(&path).unwrap();

    assert_eq!(original, loaded);
    assert_eq!(loaded.fixture("light.floor_lamp").unwrap().hld, 210);
    assert_eq!(loaded.room("living_room").unwrap().members.len(), 2);
}

#[test]
fn test_config_json_roundtrip() {
    let original = sample_config();
    let file = NamedTempFile::new().unwrap();
    let path = file.path().with_extension("json");

    original.save(&path).unwrap();
    let loaded = ConfigFile::load(&path).unwrap();

    assert_eq!(original, loaded);
}

#[test]
fn test_minimal_json_uses_defaults() {
    let mut file = NamedTempFile::with_suffix(".json").unwrap();
    write!(
        file,
        r#"{{"version":"{}","fixtures":[{{"target_id":"light.a","llv":5,"hld":200}}]}}"#,
        CONFIG_FILE_VERSION
    )
    .unwrap();

    let loaded = ConfigFile::load(file.path()).unwrap();
    assert_eq!(loaded.fixtures[0].profile, CurveProfile::Linear);
    assert_eq!(loaded.control.tween_max_steps, 50);
    assert!(loaded.rooms.is_empty());
}

#[test]
fn test_unknown_profile_fails_to_load() {
    let mut file = NamedTempFile::with_suffix(".json").unwrap();
    write!(
        file,
        r#"{{"version":"{}","fixtures":[{{"target_id":"light.a","llv":5,"hld":200,"profile":"gamma"}}]}}"#,
        CONFIG_FILE_VERSION
    )
    .unwrap();

    let err = ConfigFile::load(file.path()).unwrap_err();
    assert!(matches!(err, CoreError::Json(_)));
    assert!(err.to_string().contains("gamma"));
}

#[test]
fn test_inverted_calibration_fails_to_load() {
    let mut file = NamedTempFile::with_suffix(".json").unwrap();
    write!(
        file,
        r#"{{"version":"{}","fixtures":[{{"target_id":"light.a","llv":220,"hld":200}}]}}"#,
        CONFIG_FILE_VERSION
    )
    .unwrap();

    assert!(matches!(
        ConfigFile::load(file.path()),
        Err(CoreError::InvalidCalibration { llv: 220, hld: 200, .. })
    ));
}

#[test]
fn test_version_mismatch() {
    let mut config = sample_config();
    config.version = "0.9.0".to_string();

    let file = NamedTempFile::new().unwrap();
    let path = file.path().with_extension("ron");
    config.save(&path).unwrap();

    let result = ConfigFile::load(&path);
    if let Err(CoreError::VersionMismatch { expected, found }) = result {
        assert_eq!(expected, CONFIG_FILE_VERSION);
        assert_eq!(found, "0.9.0");
    } else {
        panic!("Expected VersionMismatch");
    }
}

#[test]
fn test_unsupported_format() {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().with_extension("yaml");

    let result = sample_config().save(&path);
    assert!(matches!(result, Err(CoreError::UnsupportedFormat(ref ext)) if ext == "yaml"));
}

#[test]
fn test_demo_config_loads() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/home.ron");
    let config = ConfigFile::load(&path).unwrap();

    assert_eq!(config.fixtures.len(), 3);
    let strip = config.fixture("light.desk_strip").unwrap();
    assert_eq!(strip.profile, CurveProfile::Linear);
    assert_eq!((strip.llv, strip.hld), (38, 180));
    assert_eq!(config.room("office").unwrap().members, vec!["light.desk_strip"]);
}
