use async_trait::async_trait;
use bunkride_core::{WorkflowError, WorkflowResult};
use bunkride_trips::models::ChatMessage;
use bunkride_trips::repository::ChatRepository;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    trip_id: Uuid,
    sender_id: Uuid,
    sender_name: String,
    body: String,
    sent_at: DateTime<Utc>,
}

impl From<MessageRow> for ChatMessage {
    fn from(row: MessageRow) -> Self {
        ChatMessage {
            id: row.id,
            trip_id: row.trip_id,
            sender_id: row.sender_id,
            sender_name: row.sender_name,
            body: row.body,
            sent_at: row.sent_at,
        }
    }
}

fn store_err(e: sqlx::Error) -> WorkflowError {
    WorkflowError::StoreUnavailable(e.to_string())
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn list_messages(&self, trip_id: Uuid, limit: i64) -> WorkflowResult<Vec<ChatMessage>> {
        // Newest window, returned oldest first.
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, trip_id, sender_id, sender_name, body, sent_at FROM ( \
                 SELECT id, trip_id, sender_id, sender_name, body, sent_at \
                 FROM trip_messages WHERE trip_id = $1 \
                 ORDER BY sent_at DESC LIMIT $2 \
             ) recent ORDER BY sent_at ASC",
        )
        .bind(trip_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn append_message(
        &self,
        trip_id: Uuid,
        sender_id: Uuid,
        sender_name: &str,
        body: &str,
    ) -> WorkflowResult<ChatMessage> {
        let row: MessageRow = sqlx::query_as(
            "INSERT INTO trip_messages (id, trip_id, sender_id, sender_name, body) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, trip_id, sender_id, sender_name, body, sent_at",
        )
        .bind(Uuid::new_v4())
        .bind(trip_id)
        .bind(sender_id)
        .bind(sender_name)
        .bind(body)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.into())
    }

    async fn delete_message(
        &self,
        trip_id: Uuid,
        message_id: Uuid,
        caller_id: Uuid,
    ) -> WorkflowResult<()> {
        let result = sqlx::query(
            "DELETE FROM trip_messages WHERE id = $1 AND trip_id = $2 AND sender_id = $3",
        )
        .bind(message_id)
        .bind(trip_id)
        .bind(caller_id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            // Either the message is gone or it belongs to someone else;
            // don't reveal which.
            return Err(WorkflowError::NotFound(format!("message {message_id}")));
        }
        Ok(())
    }
}
