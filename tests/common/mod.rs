//! Shared fixtures for integration tests.

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use hookwise::adapters::sqlite::{
    initialize_database, PoolConfig, SqliteHookSessionRepository, SqliteTaskQueue, SqliteTriggerRepository,
    SqliteWorkspaceRepository,
};
use hookwise::services::{IngressCoordinator, IngressSettings, TempWorkspaceManager};
use sqlx::SqlitePool;

/// A file-backed database with a multi-connection pool and the services built on it.
#[allow(dead_code)]
pub struct TestEnv {
    pub pool: SqlitePool,
    pub tasks: Arc<SqliteTaskQueue>,
    pub triggers: Arc<SqliteTriggerRepository>,
    pub ingress: Arc<IngressCoordinator>,
    pub dir: TempDir,
}

pub async fn test_env() -> TestEnv {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite:{}", dir.path().join("hookwise.db").display());
    let pool = initialize_database(&url, PoolConfig::default())
        .await
        .expect("Failed to initialize database");

    let tasks = Arc::new(SqliteTaskQueue::new(pool.clone()));
    let settings = IngressSettings {
        lock_ttl: Duration::from_secs(30),
        wait_poll_interval: Duration::from_millis(20),
        wait_timeout: Duration::from_secs(10),
    };
    let ingress = Arc::new(IngressCoordinator::new(
        Arc::new(SqliteHookSessionRepository::new(pool.clone())),
        tasks.clone(),
        Arc::new(TempWorkspaceManager::new(
            Arc::new(SqliteWorkspaceRepository::new(pool.clone())),
            dir.path().join("workspaces"),
            Duration::from_secs(3600),
        )),
        settings,
    ));

    TestEnv {
        triggers: Arc::new(SqliteTriggerRepository::new(pool.clone())),
        pool,
        tasks,
        ingress,
        dir,
    }
}

/// Setup test logging
#[allow(dead_code)]
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
