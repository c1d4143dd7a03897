//! Connection pool wrapper.

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::DbError;

/// A Postgres connection pool with sane defaults for the delivery workers.
#[derive(Debug, Clone)]
pub struct DbPool {
    inner: PgPool,
}

impl DbPool {
    /// Connect with the default pool size.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        Self::connect_with_size(database_url, 10).await
    }

    pub async fn connect_with_size(database_url: &str, max_connections: u32) -> Result<Self, DbError> {
        let inner = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(DbError::ConnectionFailed)?;
        Ok(Self { inner })
    }

    pub fn from_pool(inner: PgPool) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &PgPool {
        &self.inner
    }
}
