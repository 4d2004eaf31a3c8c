//! User directory - LumaDB lookups

use async_trait::async_trait;
use tokio_postgres::Row;
use tracing::{debug, instrument};

use super::{Contact, UserDirectory};
use crate::error::{ChatError, Result};
use crate::lumadb::LumaDbPool;

const CREATE_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id          TEXT PRIMARY KEY,
        full_name   TEXT NOT NULL,
        email       TEXT NOT NULL UNIQUE,
        profile_pic TEXT
    )
"#;

/// Read-only view over the shared `users` table. Accounts are created by
/// the account service; password columns are never selected.
#[derive(Clone)]
pub struct LumaDbUserDirectory {
    pool: LumaDbPool,
}

impl LumaDbUserDirectory {
    pub fn new(pool: LumaDbPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        let client = self.client().await?;
        client.batch_execute(CREATE_SCHEMA).await.map_err(unavailable)?;
        debug!("users table ready");
        Ok(())
    }

    async fn client(&self) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| ChatError::DurableStoreUnavailable(e.to_string()))
    }
}

fn unavailable(err: tokio_postgres::Error) -> ChatError {
    ChatError::DurableStoreUnavailable(err.to_string())
}

fn contact_from_row(row: &Row) -> Contact {
    Contact {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        profile_pic: row.get("profile_pic"),
    }
}

#[async_trait]
impl UserDirectory for LumaDbUserDirectory {
    #[instrument(skip(self))]
    async fn list_except(&self, user_id: &str) -> Result<Vec<Contact>> {
        let client = self.client().await?;
        let rows = client
            .query(
                r#"
                SELECT id, full_name, email, profile_pic
                FROM users
                WHERE id <> $1
                ORDER BY full_name ASC, id ASC
                "#,
                &[&user_id],
            )
            .await
            .map_err(unavailable)?;

        Ok(rows.iter().map(contact_from_row).collect())
    }

    async fn is_healthy(&self) -> bool {
        self.pool.is_healthy().await
    }
}
