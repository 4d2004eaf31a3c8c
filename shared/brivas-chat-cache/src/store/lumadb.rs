//! Message store - LumaDB persistence

use async_trait::async_trait;
use tokio_postgres::Row;
use tracing::{debug, instrument};

use super::MessageStore;
use crate::error::{ChatError, Result};
use crate::lumadb::LumaDbPool;
use crate::message::{Message, NewMessage};

const CREATE_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS messages (
        id          UUID PRIMARY KEY,
        sender_id   TEXT NOT NULL,
        receiver_id TEXT NOT NULL,
        text        TEXT,
        attachment  TEXT,
        created_at  TIMESTAMPTZ NOT NULL
    );
    CREATE INDEX IF NOT EXISTS messages_pair_created_idx
        ON messages (sender_id, receiver_id, created_at);
"#;

/// LumaDB-backed message store
#[derive(Clone)]
pub struct LumaDbMessageStore {
    pool: LumaDbPool,
}

impl LumaDbMessageStore {
    pub fn new(pool: LumaDbPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        let client = self.client().await?;
        client.batch_execute(CREATE_SCHEMA).await.map_err(unavailable)?;
        debug!("messages table ready");
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

fn message_from_row(row: &Row) -> Message {
    Message {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        text: row.get("text"),
        attachment: row.get("attachment"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl MessageStore for LumaDbMessageStore {
    #[instrument(skip(self))]
    async fn find_between(&self, participant_a: &str, participant_b: &str) -> Result<Vec<Message>> {
        let client = self.client().await?;
        let rows = client
            .query(
                r#"
                SELECT id, sender_id, receiver_id, text, attachment, created_at
                FROM messages
                WHERE (sender_id = $1 AND receiver_id = $2)
                   OR (sender_id = $2 AND receiver_id = $1)
                ORDER BY created_at ASC
                "#,
                &[&participant_a, &participant_b],
            )
            .await
            .map_err(unavailable)?;

        Ok(rows.iter().map(message_from_row).collect())
    }

    #[instrument(skip(self, new_message), fields(sender = %new_message.sender_id, receiver = %new_message.receiver_id))]
    async fn create(&self, new_message: NewMessage) -> Result<Message> {
        let message = new_message.into_message();
        let client = self.client().await?;

        client
            .execute(
                r#"
                INSERT INTO messages (id, sender_id, receiver_id, text, attachment, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
                &[
                    &message.id,
                    &message.sender_id,
                    &message.receiver_id,
                    &message.text,
                    &message.attachment,
                    &message.created_at,
                ],
            )
            .await
            .map_err(unavailable)?;

        Ok(message)
    }

    async fn is_healthy(&self) -> bool {
        self.pool.is_healthy().await
    }
}
