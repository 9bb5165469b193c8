use super::*;
use agora_auth::Member;
use agora_core::ID;
use agora_pg::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_postgres::Client;

/// One persisted chat message, as replayed to newly joined sockets.
#[derive(Debug, Clone)]
pub struct ChatRecord {
    user: ID<Member>,
    content: String,
}

impl ChatRecord {
    pub fn new(user: ID<Member>, content: String) -> Self {
        Self { user, content }
    }
    pub fn user(&self) -> ID<Member> {
        self.user
    }
    pub fn content(&self) -> &str {
        &self.content
    }
}

impl Schema for ChatRecord {
    fn name() -> &'static str {
        MESSAGES
    }
    fn creates() -> &'static str {
        const_format::concatcp!(
            "CREATE TABLE IF NOT EXISTS ",
            MESSAGES,
            " (
                id         BIGSERIAL PRIMARY KEY,
                room_id    BIGINT NOT NULL,
                user_id    BIGINT NOT NULL REFERENCES ",
            USERS,
            "(id),
                content    VARCHAR(256) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );"
        )
    }
    fn indices() -> &'static str {
        const_format::concatcp!(
            "CREATE INDEX IF NOT EXISTS idx_messages_room ON ",
            MESSAGES,
            " (room_id, id);"
        )
    }
}

/// Message persistence collaborator. The gateway writes each accepted
/// frame through this and replays the backlog to joining sockets;
/// everything else about rooms lives outside this subsystem.
#[allow(async_fn_in_trait)]
pub trait ChatStorage {
    async fn append(&self, room: ID<Room>, user: ID<Member>, content: &str) -> anyhow::Result<()>;
    /// Full message history for a room, oldest first.
    async fn backlog(&self, room: ID<Room>) -> anyhow::Result<Vec<ChatRecord>>;
}

impl ChatStorage for Arc<Client> {
    async fn append(&self, room: ID<Room>, user: ID<Member>, content: &str) -> anyhow::Result<()> {
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                MESSAGES,
                " (room_id, user_id, content) VALUES ($1, $2, $3)"
            ),
            &[&room.inner(), &user.inner(), &content],
        )
        .await?;
        Ok(())
    }

    async fn backlog(&self, room: ID<Room>) -> anyhow::Result<Vec<ChatRecord>> {
        let rows = self
            .query(
                const_format::concatcp!(
                    "SELECT user_id, content FROM ",
                    MESSAGES,
                    " WHERE room_id = $1 ORDER BY id ASC"
                ),
                &[&room.inner()],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| ChatRecord::new(ID::from(row.get::<_, i64>(0)), row.get::<_, String>(1)))
            .collect())
    }
}

/// In-process message log for tests.
#[derive(Default)]
pub struct MemoryLog {
    messages: std::sync::Mutex<HashMap<ID<Room>, Vec<ChatRecord>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatStorage for MemoryLog {
    async fn append(&self, room: ID<Room>, user: ID<Member>, content: &str) -> anyhow::Result<()> {
        self.messages
            .lock()
            .expect("messages lock")
            .entry(room)
            .or_default()
            .push(ChatRecord::new(user, content.to_string()));
        Ok(())
    }

    async fn backlog(&self, room: ID<Room>) -> anyhow::Result<Vec<ChatRecord>> {
        Ok(self
            .messages
            .lock()
            .expect("messages lock")
            .get(&room)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn backlog_preserves_insertion_order() {
        let log = MemoryLog::new();
        let room = ID::from(1);
        log.append(room, ID::from(7), "first").await.unwrap();
        log.append(room, ID::from(8), "second").await.unwrap();
        log.append(room, ID::from(7), "third").await.unwrap();
        let backlog = log.backlog(room).await.unwrap();
        let contents: Vec<&str> = backlog.iter().map(ChatRecord::content).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }
    #[tokio::test]
    async fn rooms_are_isolated() {
        let log = MemoryLog::new();
        log.append(ID::from(1), ID::from(7), "here").await.unwrap();
        assert!(log.backlog(ID::from(2)).await.unwrap().is_empty());
    }
}
