/// Common test utilities and fixtures
use async_trait::async_trait;
use eve_ts3_core::ValidationVerdict;
use eve_ts3_query::{Connector, QueryError, ServerQuery};
use eve_ts3_storage::SqliteUserStore;
use eve_ts3_server::{create_router, AppState};
use eve_ts3_sync::{SyncConfig, SyncEngine, SyncError, ValidationAuthority};
use axum::Router;
use std::sync::Arc;
use tempfile::TempDir;

/// Connector for tests that never reach a TS3 server
pub struct OfflineConnector;

#[async_trait]
impl Connector for OfflineConnector {
    async fn connect(&self, address: &str) -> Result<Arc<dyn ServerQuery>, QueryError> {
        Err(QueryError::Connect {
            address: address.to_string(),
            message: "offline".to_string(),
        })
    }
}

/// Authority with no opinion on anyone
pub struct SilentAuthority;

#[async_trait]
impl ValidationAuthority for SilentAuthority {
    async fn validate(&self, _char_ids: &[i32]) -> Result<Vec<ValidationVerdict>, SyncError> {
        Ok(Vec::new())
    }
}

/// Router over an engine with a real store and no TS3 connection
pub struct TestApp {
    pub router: Router,
    pub engine: Arc<SyncEngine>,
    _temp_dir: TempDir,
}

pub async fn create_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_url = format!("sqlite://{}", temp_dir.path().join("test.db").display());
    let pool = eve_ts3_storage::create_pool(&db_url).await.unwrap();
    eve_ts3_storage::run_migrations(&pool).await.unwrap();

    let engine = Arc::new(SyncEngine::new(
        SyncConfig::default(),
        Arc::new(OfflineConnector),
        Arc::new(SqliteUserStore::new(pool)),
        Arc::new(SilentAuthority),
    ));

    TestApp {
        router: create_router(AppState::new(Arc::clone(&engine))),
        engine,
        _temp_dir: temp_dir,
    }
}
