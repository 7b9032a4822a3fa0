//! Persistence behavior of the settings store, exercised through the public
//! API against real files.

use std::fs;
use tempfile::tempdir;
use tucl_bot::store::{ChatRef, SettingsStore};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn test_missing_file_yields_defaults() -> TestResult {
    let dir = tempdir()?;
    let store = SettingsStore::load(dir.path().join("tucl_settings.json"));
    assert!(!store.limited_mode());
    assert!(store.settings().allowed_chats.is_empty());
    Ok(())
}

#[test]
fn test_malformed_file_yields_defaults() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("tucl_settings.json");
    for garbage in ["{not json", "[]", "\"just a string\"", ""] {
        fs::write(&path, garbage)?;
        let store = SettingsStore::load(&path);
        assert!(!store.limited_mode(), "defaults expected for {garbage:?}");
        assert!(store.settings().allowed_chats.is_empty());
    }
    Ok(())
}

#[test]
fn test_save_then_load_round_trips() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("tucl_settings.json");

    let mut store = SettingsStore::load(&path);
    assert!(store.toggle_limited_mode());
    assert!(store.allow_chat(ChatRef::Id(-100_200_300)));
    assert!(store.allow_chat(ChatRef::Username("@example".into())));

    let reloaded = SettingsStore::load(&path);
    assert_eq!(reloaded.settings(), store.settings());
    assert!(reloaded.is_chat_allowed(-100_200_300, None));
    assert!(reloaded.is_chat_allowed(555, Some("example")));
    assert!(!reloaded.is_chat_allowed(555, Some("other")));
    Ok(())
}

#[test]
fn test_ids_stay_numbers_and_usernames_stay_strings() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("tucl_settings.json");

    let mut store = SettingsStore::load(&path);
    store.allow_chat(ChatRef::Id(-100_200_300));
    store.allow_chat(ChatRef::Username("@example".into()));

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    let chats = raw["allowed_chats"]
        .as_array()
        .ok_or("allowed_chats is not an array")?;
    assert!(chats.contains(&serde_json::json!(-100_200_300)));
    assert!(chats.contains(&serde_json::json!("@example")));
    Ok(())
}

#[test]
fn test_toggle_twice_restores_and_persists_each_time() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("tucl_settings.json");

    let mut store = SettingsStore::load(&path);
    assert!(store.toggle_limited_mode());
    assert!(SettingsStore::load(&path).limited_mode());

    assert!(!store.toggle_limited_mode());
    assert!(!SettingsStore::load(&path).limited_mode());
    Ok(())
}

#[test]
fn test_duplicate_allow_is_reported_and_harmless() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("tucl_settings.json");

    let mut store = SettingsStore::load(&path);
    assert!(store.allow_chat(ChatRef::Username("@example".into())));
    assert!(!store.allow_chat(ChatRef::Username("@example".into())));
    assert_eq!(SettingsStore::load(&path).settings().allowed_chats.len(), 1);
    Ok(())
}

#[test]
fn test_no_temp_file_is_left_behind() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("tucl_settings.json");

    let mut store = SettingsStore::load(&path);
    store.toggle_limited_mode();

    let names: Vec<String> = fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["tucl_settings.json".to_string()]);
    Ok(())
}
