use super::*;
use crate::influx::{FieldValue, MemoryBackend, Point};

#[tokio::test]
async fn test_no_session_before_connect() {
    let manager = SessionManager::new();
    assert!(manager.current().await.is_none());
    assert!(!manager.is_ready().await);
    assert!(manager.database().await.is_none());
}

#[tokio::test]
async fn test_connect_provisions_database_and_policy() {
    let manager = SessionManager::new();
    let backend = Arc::new(MemoryBackend::new());

    assert!(manager.connect_with(backend.clone(), "indigo", false).await);
    assert!(manager.is_ready().await);
    assert_eq!(manager.database().await.as_deref(), Some("indigo"));

    assert!(backend.has_database("indigo"));
    assert_eq!(
        backend.retention_policy("indigo"),
        Some(RetentionPolicy::two_year())
    );
    assert!(!backend.statements().iter().any(|s| s.starts_with("DROP")));
}

#[tokio::test]
async fn test_reset_against_missing_database_is_ready() {
    let manager = SessionManager::new();
    let backend = Arc::new(MemoryBackend::new());

    assert!(manager.connect_with(backend.clone(), "indigo", true).await);

    let statements = backend.statements();
    assert_eq!(statements[0], "DROP DATABASE indigo");
    assert_eq!(statements[1], "CREATE DATABASE indigo");
}

#[tokio::test]
async fn test_reset_clears_existing_data() {
    let backend = Arc::new(MemoryBackend::new().with_database("indigo"));
    backend
        .write_points(
            "indigo",
            &[Point::new("device_changes").field("temp", FieldValue::Integer(1))],
        )
        .await
        .unwrap();

    let manager = SessionManager::new();
    assert!(manager.connect_with(backend.clone(), "indigo", true).await);

    // Column is gone, so a float now goes through
    let result = backend
        .write_points(
            "indigo",
            &[Point::new("device_changes").field("temp", FieldValue::Float(1.5))],
        )
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_unreachable_backend_not_ready() {
    let backend = Arc::new(MemoryBackend::new());
    backend.set_unreachable(true);

    let manager = SessionManager::new();
    assert!(!manager.connect_with(backend, "indigo", false).await);
    assert!(!manager.is_ready().await);
    assert!(manager.ready_session().await.is_none());
    // The failed session is still installed, just not ready
    assert!(manager.current().await.is_some());
}

#[tokio::test]
async fn test_reconnect_retires_old_session() {
    let manager = SessionManager::new();
    manager
        .connect_with(Arc::new(MemoryBackend::new()), "first", false)
        .await;
    let old = manager.current().await.unwrap();
    assert!(old.is_ready());

    manager
        .connect_with(Arc::new(MemoryBackend::new()), "second", false)
        .await;

    assert!(!old.is_ready());
    assert_eq!(manager.database().await.as_deref(), Some("second"));
    assert!(manager.is_ready().await);
}

#[tokio::test]
async fn test_connect_to_closed_port_not_ready() {
    let manager = SessionManager::new();
    let config = InfluxConfig {
        host: "127.0.0.1".to_string(),
        port: 9,
        ..InfluxConfig::default()
    };
    assert!(!manager.connect(&config).await);
}
