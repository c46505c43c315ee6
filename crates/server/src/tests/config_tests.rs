use super::{load_settings_from, normalize_database_url, prepare_database_url};

use std::{
    collections::HashMap,
    env, fs,
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

fn unique_suffix() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos()
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
}

#[test]
fn keeps_in_memory_and_foreign_urls() {
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(
        normalize_database_url("postgres://db/admin"),
        "postgres://db/admin"
    );
}

#[test]
fn blank_url_falls_back_to_default() {
    assert_eq!(normalize_database_url("  "), "sqlite://./data/admin.db");
}

#[test]
fn creates_parent_dir_for_relative_sqlite_url() {
    let temp_root = env::temp_dir().join(format!("dashgrid_server_test_{}", unique_suffix()));
    let db_path = temp_root.join("data").join("test.db");

    prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare db url");
    assert!(temp_root.join("data").exists());

    fs::remove_dir_all(temp_root).expect("cleanup");
}

#[test]
fn keeps_windows_absolute_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("sqlite:C:\\Users\\alice\\test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn converts_sqlite_double_slash_windows_path() {
    assert_eq!(
        normalize_database_url("sqlite://C:/Users/alice/test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn environment_overrides_file_which_overrides_defaults() {
    let temp_root = env::temp_dir().join(format!("dashgrid_settings_test_{}", unique_suffix()));
    fs::create_dir_all(&temp_root).expect("temp root");
    let path = temp_root.join("server.toml");
    fs::write(
        &path,
        "bind_addr = \"0.0.0.0:9000\"\ndatabase_url = \"sqlite://file.db\"\ndefault_page_size = 50\n",
    )
    .expect("write settings");

    let env_vars: HashMap<&str, &str> = [("APP__DATABASE_URL", "sqlite://env.db")].into();
    let settings = load_settings_from(&path, |key| env_vars.get(key).map(|v| v.to_string()));

    assert_eq!(settings.server_bind, "0.0.0.0:9000");
    assert_eq!(settings.database_url, "sqlite://env.db");
    assert_eq!(settings.default_page_size, 50);
    assert_eq!(settings.public_url(), "http://0.0.0.0:9000");

    fs::remove_dir_all(temp_root).expect("cleanup");
}

#[test]
fn missing_file_keeps_defaults() {
    let settings = load_settings_from(Path::new("/nonexistent/server.toml"), |_| None);
    assert_eq!(settings.server_bind, "127.0.0.1:8080");
    assert!(settings.server_public_url.is_none());
}
