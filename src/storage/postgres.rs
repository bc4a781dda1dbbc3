use crate::domain::conversation::{Conversation, PairKey};
use crate::domain::message::{Message, MessageKind};
use crate::error::Result;
use crate::storage::ConversationStore;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

/// Postgres-backed conversation store. The unique index on the sorted pair
/// plus the transactional find-or-create/append in `upsert_message` makes the
/// first-message path atomic per pair.
#[derive(Debug, Clone)]
pub struct PgConversationStore {
    pool: PgPool,
}

impl PgConversationStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn messages_for(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r"
            SELECT id, sender, body, kind, attachment_location, original_name, read, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY seq ASC
            ",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }
}

#[async_trait::async_trait]
impl ConversationStore for PgConversationStore {
    async fn find_by_participant(&self, user: &str) -> Result<Vec<Conversation>> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            r"
            SELECT id, user_lo, user_hi
            FROM conversations
            WHERE user_lo = $1 OR user_hi = $1
            ",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in rows {
            let messages = self.messages_for(row.id).await?;
            conversations
                .push(Conversation { participants: [row.user_lo, row.user_hi], messages });
        }
        Ok(conversations)
    }

    async fn find_by_pair(&self, a: &str, b: &str) -> Result<Option<Conversation>> {
        let key = PairKey::new(a, b);
        let row = sqlx::query_as::<_, ConversationRow>(
            "SELECT id, user_lo, user_hi FROM conversations WHERE user_lo = $1 AND user_hi = $2",
        )
        .bind(key.lo())
        .bind(key.hi())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let messages = self.messages_for(row.id).await?;
                Ok(Some(Conversation { participants: [row.user_lo, row.user_hi], messages }))
            }
            None => Ok(None),
        }
    }

    async fn upsert_message(&self, a: &str, b: &str, message: Message) -> Result<()> {
        let key = PairKey::new(a, b);
        let mut tx = self.pool.begin().await?;

        // The no-op DO UPDATE makes RETURNING yield the id on both paths.
        let conversation_id: Uuid = sqlx::query_scalar(
            r"
            INSERT INTO conversations (user_lo, user_hi)
            VALUES ($1, $2)
            ON CONFLICT (user_lo, user_hi) DO UPDATE SET user_lo = EXCLUDED.user_lo
            RETURNING id
            ",
        )
        .bind(key.lo())
        .bind(key.hi())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO messages
                (id, conversation_id, sender, body, kind, attachment_location, original_name, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(message.id)
        .bind(conversation_id)
        .bind(&message.from)
        .bind(&message.text)
        .bind(kind_to_str(message.kind))
        .bind(&message.attachment_location)
        .bind(&message.original_name)
        .bind(message.read)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn mark_read(&self, reader: &str, other: &str) -> Result<bool> {
        let key = PairKey::new(reader, other);
        let result = sqlx::query(
            r"
            UPDATE messages SET read = TRUE
            WHERE conversation_id =
                (SELECT id FROM conversations WHERE user_lo = $1 AND user_hi = $2)
              AND sender = $3
              AND NOT read
            ",
        )
        .bind(key.lo())
        .bind(key.hi())
        .bind(other)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_pair(&self, a: &str, b: &str) -> Result<()> {
        let key = PairKey::new(a, b);
        // Messages go with the conversation via ON DELETE CASCADE.
        sqlx::query("DELETE FROM conversations WHERE user_lo = $1 AND user_hi = $2")
            .bind(key.lo())
            .bind(key.hi())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: Uuid,
    user_lo: String,
    user_hi: String,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    sender: String,
    body: Option<String>,
    kind: String,
    attachment_location: Option<String>,
    original_name: Option<String>,
    read: bool,
    created_at: OffsetDateTime,
}

impl MessageRow {
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            from: self.sender,
            text: self.body,
            kind: kind_from_str(&self.kind),
            attachment_location: self.attachment_location,
            original_name: self.original_name,
            read: self.read,
            created_at: self.created_at,
        }
    }
}

const fn kind_to_str(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Text => "text",
        MessageKind::Image => "image",
        MessageKind::File => "file",
    }
}

fn kind_from_str(kind: &str) -> MessageKind {
    match kind {
        "image" => MessageKind::Image,
        "file" => MessageKind::File,
        _ => MessageKind::Text,
    }
}
