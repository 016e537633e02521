use sqlx::{postgres::PgPoolOptions, PgPool};

/// Connection pool for the leads database (full CRUD).
pub struct LeadsDb {
    pub pool: PgPool,
}

impl LeadsDb {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }
}

/// Connection pool for the external guiaseller database.
///
/// Every pooled connection has `default_transaction_read_only` forced on, so
/// the SELECT-only boundary holds even if the configured credential is not a
/// read-only role. The pool itself is private; readers go through
/// [`read_pool`](Self::read_pool).
pub struct SourceDb {
    pool: PgPool,
}

impl SourceDb {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("SET default_transaction_read_only = on")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    pub fn read_pool(&self) -> &PgPool {
        &self.pool
    }
}
