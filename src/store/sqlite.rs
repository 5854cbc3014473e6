use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{db::{Participant, Room, RoomId, RoomPatch, RoomSettings, Vote, VoteId}, include_res};

use super::{ParticipantStore, RoomSettingsLookup, RoomStore, Store, StoreTx, VoteStore};

/// SQLite-backed store.
///
/// Transactions open with `BEGIN IMMEDIATE`, taking the database write lock
/// before their first read, so writers on other connections make them wait
/// (up to the busy timeout) instead of invalidating their snapshot. This
/// store's own transactions queue on an in-process gate first, so waiting
/// does not pin a pool connection.
#[derive(Clone)]
pub struct SqliteStore {
    db_pool: SqlitePool,
    writer: Arc<Mutex<()>>,
}

impl SqliteStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self {
            db_pool,
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Creates missing tables and indexes. Safe to run on every start.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::raw_sql(include_res!(str, "/schema.sql"))
            .execute(&self.db_pool)
            .await
            .context("applying schema")?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db_pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn begin(&self) -> anyhow::Result<Box<dyn StoreTx>> {
        let writer = self.writer.clone().lock_owned().await;
        let tx = self.db_pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .context("starting transaction")?;
        Ok(Box::new(SqliteTx { tx, _writer: writer }))
    }
}

struct SqliteTx {
    // declared first so the transaction is released before the gate
    tx: Transaction<'static, Sqlite>,
    _writer: OwnedMutexGuard<()>,
}

#[async_trait]
impl RoomStore for SqliteTx {
    async fn get_room(&mut self, room_id: RoomId) -> anyhow::Result<Option<Room>> {
        let row: Option<(String, bool)> =
            sqlx::query_as("SELECT owner_id,votes_revealed FROM rooms WHERE id=?")
                .bind(room_id.to_string())
                .fetch_optional(&mut *self.tx)
                .await?;

        Ok(row.map(|(owner_id, votes_revealed)| Room {
            id: room_id,
            owner_id,
            votes_revealed,
        }))
    }

    async fn patch_room(&mut self, room_id: RoomId, patch: RoomPatch) -> anyhow::Result<()> {
        if let Some(votes_revealed) = patch.votes_revealed {
            sqlx::query("UPDATE rooms SET votes_revealed=? WHERE id=?")
                .bind(votes_revealed)
                .bind(room_id.to_string())
                .execute(&mut *self.tx)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ParticipantStore for SqliteTx {
    async fn find_participant(&mut self, room_id: RoomId, user_id: &str) -> anyhow::Result<Option<Participant>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM participants WHERE room_id=? AND user_id=?")
                .bind(room_id.to_string())
                .bind(user_id)
                .fetch_optional(&mut *self.tx)
                .await?;

        Ok(row.map(|_| Participant {
            room_id,
            user_id: user_id.to_owned(),
        }))
    }
}

#[async_trait]
impl VoteStore for SqliteTx {
    async fn find_vote(&mut self, room_id: RoomId, user_id: &str) -> anyhow::Result<Option<Vote>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id,value FROM votes WHERE room_id=? AND user_id=?")
                .bind(room_id.to_string())
                .bind(user_id)
                .fetch_optional(&mut *self.tx)
                .await?;

        let Some((id, value)) = row else {
            return Ok(None);
        };
        Ok(Some(Vote {
            id: Uuid::parse_str(&id)?,
            room_id,
            user_id: user_id.to_owned(),
            value,
        }))
    }

    async fn list_votes(&mut self, room_id: RoomId) -> anyhow::Result<Vec<Vote>> {
        let rows: Vec<(String, String, String)> =
            sqlx::query_as("SELECT id,user_id,value FROM votes WHERE room_id=? ORDER BY id")
                .bind(room_id.to_string())
                .fetch_all(&mut *self.tx)
                .await?;

        rows.into_iter()
            .map(|(id, user_id, value)| {
                Ok(Vote {
                    id: Uuid::parse_str(&id)?,
                    room_id,
                    user_id,
                    value,
                })
            })
            .collect()
    }

    async fn insert_vote(&mut self, vote: &Vote) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO votes (id,room_id,user_id,value) VALUES (?,?,?,?) \
             ON CONFLICT(room_id,user_id) DO UPDATE SET value=excluded.value",
        )
            .bind(vote.id.to_string())
            .bind(vote.room_id.to_string())
            .bind(&vote.user_id)
            .bind(&vote.value)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_vote(&mut self, vote_id: VoteId, value: &str) -> anyhow::Result<()> {
        let result = sqlx::query("UPDATE votes SET value=? WHERE id=?")
            .bind(value)
            .bind(vote_id.to_string())
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(anyhow!("vote {vote_id} not found"));
        }
        Ok(())
    }

    async fn delete_all_in_room(&mut self, room_id: RoomId) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM votes WHERE room_id=?")
            .bind(room_id.to_string())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl StoreTx for SqliteTx {
    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        let SqliteTx { tx, _writer } = *self;
        tx.commit().await.context("committing transaction")?;
        Ok(())
    }
}

/// Reads room settings straight from the pool, outside any coordinator
/// transaction.
#[derive(Clone)]
pub struct SqliteRoomSettings {
    db_pool: SqlitePool,
}

impl SqliteRoomSettings {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl RoomSettingsLookup for SqliteRoomSettings {
    async fn settings_for_room(&self, room_id: RoomId) -> anyhow::Result<RoomSettings> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT allow_others_to_delete_votes FROM room_settings WHERE room_id=?")
                .bind(room_id.to_string())
                .fetch_optional(&self.db_pool)
                .await?;

        let (allow_others_to_delete_votes,) = row.ok_or_else(|| anyhow!("no settings for room {room_id}"))?;
        Ok(RoomSettings {
            room_id,
            allow_others_to_delete_votes,
        })
    }
}
