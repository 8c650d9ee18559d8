use std::time::Duration;

use codegraph_core::{CodegraphError, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Connection-pooled handle to the Postgres-backed model. Cheap to clone
/// (the pool is reference-counted internally); one instance is created at
/// process start and shared by every worker and request task.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| CodegraphError::infra(format!("failed to connect to postgres: {e}")))?;

        Ok(Self { pool })
    }

    /// Wraps an already-open pool; used by tests that share one pool across
    /// several stores/services.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the embedded migration set. A no-op if already applied.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CodegraphError::infra(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
