use hub_fs::{ConfigStore, NormalizedPath};
use serde::{Deserialize, Serialize};
use std::fs;
use tempfile::TempDir;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct TestConfig {
    name: String,
    count: i32,
}

#[test]
fn test_load_toml() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("config.toml");
    fs::write(&file_path, r#"name = "test"
count = 42"#).unwrap();

    let store = ConfigStore::new();
    let path = NormalizedPath::new(&file_path);
    let config: TestConfig = store.load(&path).unwrap();

    assert_eq!(config.name, "test");
    assert_eq!(config.count, 42);
}

#[test]
fn test_load_json() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("config.json");
    fs::write(&file_path, r#"{"name": "test", "count": 42}"#).unwrap();

    let store = ConfigStore::new();
    let path = NormalizedPath::new(&file_path);
    let config: TestConfig = store.load(&path).unwrap();

    assert_eq!(config.name, "test");
    assert_eq!(config.count, 42);
}

#[test]
fn test_load_yaml() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("config.yaml");
    fs::write(&file_path, "name: test\ncount: 42").unwrap();

    let store = ConfigStore::new();
    let path = NormalizedPath::new(&file_path);
    let config: TestConfig = store.load(&path).unwrap();

    assert_eq!(config.name, "test");
    assert_eq!(config.count, 42);
}

#[test]
fn test_save_toml() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("config.toml");
    let path = NormalizedPath::new(&file_path);

    let config = TestConfig { name: "test".into(), count: 42 };
    let store = ConfigStore::new();
    store.save(&path, &config).unwrap();

    let content = fs::read_to_string(&file_path).unwrap();
    assert!(content.contains("name = \"test\""));
    assert!(content.contains("count = 42"));
}

#[test]
fn test_save_json() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("config.json");
    let path = NormalizedPath::new(&file_path);

    let config = TestConfig { name: "test".into(), count: 42 };
    let store = ConfigStore::new();
    store.save(&path, &config).unwrap();

    let content = fs::read_to_string(&file_path).unwrap();
    assert!(content.contains("\"name\""));
    assert!(content.contains("\"test\""));
}

#[test]
fn test_unsupported_format() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("config.xyz");
    fs::write(&file_path, "data").unwrap();

    let store = ConfigStore::new();
    let path = NormalizedPath::new(&file_path);
    let result: hub_fs::Result<TestConfig> = store.load(&path);

    assert!(result.is_err());
}

#[test]
fn test_roundtrip_toml() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("config.toml");
    let path = NormalizedPath::new(&file_path);

    let original = TestConfig { name: "roundtrip".into(), count: 123 };
    let store = ConfigStore::new();

    store.save(&path, &original).unwrap();
    let loaded: TestConfig = store.load(&path).unwrap();

    assert_eq!(original, loaded);
}

#[test]
fn test_malformed_yaml_reports_parse_error_with_path() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("config.yaml");
    fs::write(&file_path, "name: [unterminated").unwrap();

    let store = ConfigStore::new();
    let path = NormalizedPath::new(&file_path);
    let err = store.load::<TestConfig>(&path).unwrap_err();

    match err {
        hub_fs::Error::ConfigParse { path, format, .. } => {
            assert_eq!(path, file_path);
            assert_eq!(format, "YAML");
        }
        other => panic!("expected ConfigParse, got {other:?}"),
    }
}

#[test]
fn test_save_yaml_leaves_no_temp_files() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("mapping.yaml"));

    let store = ConfigStore::new();
    store.save(&path, &TestConfig { name: "clean".into(), count: 1 }).unwrap();

    let entries: Vec<_> = fs::read_dir(temp.path()).unwrap().flatten().collect();
    assert_eq!(entries.len(), 1, "only the target file should remain");
}
