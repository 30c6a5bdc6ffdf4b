//! Settings persistence through the on-disk JSON store.

use std::path::PathBuf;
use std::sync::Arc;

use espresso_sense::sensitivity::SensitivityLevel;
use espresso_sense::settings::{
    keys, JsonFileStore, KeyValueStore, Settings, SettingsLoader, SettingsWriter,
    CURRENT_SETTINGS_VERSION,
};

fn temp_settings(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "espresso_sense_settings_it_{}_{}",
        std::process::id(),
        name
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir.join("settings.json")
}

#[test]
fn test_fresh_install_gets_defaults_and_version() {
    let path = temp_settings("fresh");
    let store = JsonFileStore::open(&path).unwrap();
    let loader = SettingsLoader::new(&store);

    assert_eq!(loader.version().unwrap(), 0);
    let settings = loader.load();
    assert_eq!(settings, Settings::default());
    assert_eq!(loader.version().unwrap(), CURRENT_SETTINGS_VERSION);
    assert!(path.exists());
}

#[test]
fn test_values_survive_reopen() {
    let path = temp_settings("reopen");
    {
        let store = JsonFileStore::open(&path).unwrap();
        store.set(keys::CALIBRATION_BASELINE, "0.072").unwrap();
        store.set(keys::CALIBRATION_SENSITIVITY, "14").unwrap();
        store.set(keys::LAST_SHOT_TIME, "28100").unwrap();
        store.set(keys::IS_SUPPORTER, "true").unwrap();
    }

    let reopened = JsonFileStore::open(&path).unwrap();
    let settings = SettingsLoader::new(&reopened).load();
    assert!((settings.baseline - 0.072).abs() < 1e-12);
    assert_eq!(settings.sensitivity, SensitivityLevel::clamped(14));
    assert_eq!(settings.last_shot_ms, Some(28_100));
    assert!(settings.is_supporter);
    assert!(!settings.has_seen_onboarding);
}

#[test]
fn test_legacy_document_is_migrated_once() {
    let path = temp_settings("legacy");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"{"calibrationSensitivity": "MEDIUM", "hysteresisLevel": "70"}"#,
    )
    .unwrap();

    let store = JsonFileStore::open(&path).unwrap();
    let settings = SettingsLoader::new(&store).load();
    assert_eq!(settings.sensitivity.get(), 10);
    assert_eq!(settings.hysteresis, 70);

    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk["calibrationSensitivity"], "10");
    assert_eq!(on_disk["settingsVersion"], "1");

    // A second load sees version 1 and leaves the numeric level alone.
    let again = SettingsLoader::new(&JsonFileStore::open(&path).unwrap()).load();
    assert_eq!(again.sensitivity.get(), 10);
}

#[test]
fn test_malformed_values_fall_back_to_defaults() {
    let path = temp_settings("malformed");
    let store = JsonFileStore::open(&path).unwrap();
    store.set(keys::SETTINGS_VERSION, "1").unwrap();
    store.set(keys::CALIBRATION_BASELINE, "not-a-number").unwrap();
    store.set(keys::DEBUG_MODE, "maybe").unwrap();
    store.set(keys::PRE_INFUSION_DELAY, "99999").unwrap();

    let settings = SettingsLoader::new(&store).load();
    let defaults = Settings::default();
    assert_eq!(settings.baseline, defaults.baseline);
    assert!(!settings.debug_mode);
    assert_eq!(settings.pre_infusion_delay_ms, 15_000);
}

#[test]
fn test_writer_persists_to_file() {
    let path = temp_settings("writer");
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&path).unwrap());
    let writer = SettingsWriter::spawn(Arc::clone(&store)).unwrap();

    writer.last_shot(26_400);
    writer.hysteresis(80);
    writer.debug_mode(true);
    writer.flush();

    let reopened = JsonFileStore::open(&path).unwrap();
    let settings = SettingsLoader::new(&reopened).load();
    assert_eq!(settings.last_shot_ms, Some(26_400));
    assert_eq!(settings.hysteresis, 80);
    assert!(settings.debug_mode);
}
