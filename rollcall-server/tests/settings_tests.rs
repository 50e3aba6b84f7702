//! Attendance settings loading tests
//!
//! Environment-variable tests are serialized; they share process state.

mod helpers;

use helpers::create_test_db;
use rollcall_common::config::TomlConfig;
use rollcall_common::db::{get_setting, set_setting};
use rollcall_common::Error;
use rollcall_server::config::{
    resolve_face_service_url, AttendanceSettings, DEFAULT_FACE_SERVICE_URL, FACE_SERVICE_URL_ENV,
};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn test_defaults_written_back() {
    std::env::remove_var(FACE_SERVICE_URL_ENV);
    let db = create_test_db().await;

    let settings = AttendanceSettings::load(&db, &TomlConfig::default()).await.unwrap();

    assert_eq!(settings, AttendanceSettings::default());
    assert_eq!(get_setting(&db, "match_threshold").await.unwrap().as_deref(), Some("0.55"));
    assert_eq!(get_setting(&db, "dispute_window_hours").await.unwrap().as_deref(), Some("72"));
    assert_eq!(
        get_setting(&db, "face_service_url").await.unwrap().as_deref(),
        Some(DEFAULT_FACE_SERVICE_URL)
    );
}

#[tokio::test]
#[serial]
async fn test_stored_values_win() {
    std::env::remove_var(FACE_SERVICE_URL_ENV);
    let db = create_test_db().await;
    set_setting(&db, "match_threshold", "0.7").await.unwrap();
    set_setting(&db, "upload_window_minutes", "30").await.unwrap();
    set_setting(&db, "campus_utc_offset_minutes", "330").await.unwrap();

    let settings = AttendanceSettings::load(&db, &TomlConfig::default()).await.unwrap();

    assert_eq!(settings.match_threshold, 0.7);
    assert_eq!(settings.upload_window_minutes, Some(30));
    assert_eq!(settings.campus_utc_offset_minutes, 330);
}

#[tokio::test]
#[serial]
async fn test_invalid_stored_value_rejected() {
    std::env::remove_var(FACE_SERVICE_URL_ENV);
    let db = create_test_db().await;
    set_setting(&db, "dispute_window_hours", "three days").await.unwrap();

    let result = AttendanceSettings::load(&db, &TomlConfig::default()).await;
    assert!(matches!(result, Err(Error::Config(_))));

    set_setting(&db, "dispute_window_hours", "72").await.unwrap();
    set_setting(&db, "match_threshold", "1.2").await.unwrap();
    let result = AttendanceSettings::load(&db, &TomlConfig::default()).await;
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
#[serial]
async fn test_oversized_windows_rejected() {
    std::env::remove_var(FACE_SERVICE_URL_ENV);
    let db = create_test_db().await;

    set_setting(&db, "dispute_window_hours", &i64::MAX.to_string()).await.unwrap();
    let result = AttendanceSettings::load(&db, &TomlConfig::default()).await;
    assert!(matches!(result, Err(Error::Config(_))));

    set_setting(&db, "dispute_window_hours", "72").await.unwrap();
    set_setting(&db, "upload_window_minutes", "9223372036854775807").await.unwrap();
    let result = AttendanceSettings::load(&db, &TomlConfig::default()).await;
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
#[serial]
async fn test_face_service_url_priority() {
    let toml_config = TomlConfig {
        face_service_url: Some("http://from-toml:8000".into()),
        ..Default::default()
    };

    // TOML beats the default
    std::env::remove_var(FACE_SERVICE_URL_ENV);
    let db = create_test_db().await;
    assert_eq!(
        resolve_face_service_url(&db, &toml_config).await.unwrap(),
        "http://from-toml:8000"
    );

    // Environment beats TOML
    std::env::set_var(FACE_SERVICE_URL_ENV, "http://from-env:8000");
    let db = create_test_db().await;
    assert_eq!(
        resolve_face_service_url(&db, &toml_config).await.unwrap(),
        "http://from-env:8000"
    );

    // Once stored, the database copy wins
    assert_eq!(
        get_setting(&db, "face_service_url").await.unwrap().as_deref(),
        Some("http://from-env:8000")
    );
    std::env::set_var(FACE_SERVICE_URL_ENV, "http://changed:8000");
    assert_eq!(
        resolve_face_service_url(&db, &toml_config).await.unwrap(),
        "http://from-env:8000"
    );

    std::env::remove_var(FACE_SERVICE_URL_ENV);
}
