use crate::domain::conversation::Conversation;
use crate::domain::message::Message;
use crate::error::Result;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub mod memory;
pub mod postgres;

/// Durable keyed storage for conversations, queryable by a single participant
/// or by an exact pair. Pair arguments are order-independent everywhere.
#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync + std::fmt::Debug {
    /// All conversations in which `user` participates. No ordering guarantee.
    async fn find_by_participant(&self, user: &str) -> Result<Vec<Conversation>>;

    /// The conversation between the two identifiers, if one exists.
    async fn find_by_pair(&self, a: &str, b: &str) -> Result<Option<Conversation>>;

    /// Creates the conversation for the pair if absent, then appends
    /// `message`. Atomic per pair under concurrent sends.
    async fn upsert_message(&self, a: &str, b: &str, message: Message) -> Result<()>;

    /// Flags every unread message sent by `other` as read. Returns whether
    /// anything changed so callers can skip redundant notifications.
    async fn mark_read(&self, reader: &str, other: &str) -> Result<bool>;

    /// Removes the conversation and all its messages. Idempotent.
    async fn delete_by_pair(&self, a: &str, b: &str) -> Result<()>;

    /// Readiness check.
    async fn ping(&self) -> Result<()>;
}

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;
    Ok(pool)
}

/// Applies pending migrations from the bundled `migrations/` directory.
///
/// # Errors
/// Returns an error if a migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!().run(pool).await?;
    Ok(())
}
