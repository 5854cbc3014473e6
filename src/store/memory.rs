use std::{collections::{HashMap, HashSet}, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::db::{Participant, Room, RoomId, RoomPatch, RoomSettings, UserId, Vote, VoteId};

use super::{ParticipantStore, RoomSettingsLookup, RoomStore, Store, StoreTx, VoteStore};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    rooms: HashMap<RoomId, Room>,
    participants: HashSet<(RoomId, UserId)>,
    votes: HashMap<(RoomId, UserId), Vote>,
}

/// In-process store. Transactions are serialized and work on a staged copy
/// that replaces the shared state on commit.
///
/// Settings live behind their own lock, like the separate service they
/// stand in for.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    settings: Arc<RwLock<HashMap<RoomId, RoomSettings>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_room(&self, room: Room) {
        self.state.lock().await.rooms.insert(room.id, room);
    }

    pub async fn add_participant(&self, room_id: RoomId, user_id: impl Into<UserId>) {
        self.state.lock().await.participants.insert((room_id, user_id.into()));
    }

    pub async fn set_votes_revealed(&self, room_id: RoomId, votes_revealed: bool) {
        if let Some(room) = self.state.lock().await.rooms.get_mut(&room_id) {
            room.votes_revealed = votes_revealed;
        }
    }

    pub async fn put_settings(&self, settings: RoomSettings) {
        self.settings.write().await.insert(settings.room_id, settings);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> anyhow::Result<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx { guard, staged }))
    }
}

#[async_trait]
impl RoomSettingsLookup for MemoryStore {
    async fn settings_for_room(&self, room_id: RoomId) -> anyhow::Result<RoomSettings> {
        self.settings
            .read()
            .await
            .get(&room_id)
            .copied()
            .ok_or_else(|| anyhow!("no settings for room {room_id}"))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl RoomStore for MemoryTx {
    async fn get_room(&mut self, room_id: RoomId) -> anyhow::Result<Option<Room>> {
        Ok(self.staged.rooms.get(&room_id).cloned())
    }

    async fn patch_room(&mut self, room_id: RoomId, patch: RoomPatch) -> anyhow::Result<()> {
        let room = self.staged.rooms
            .get_mut(&room_id)
            .ok_or_else(|| anyhow!("room {room_id} not found"))?;
        if let Some(votes_revealed) = patch.votes_revealed {
            room.votes_revealed = votes_revealed;
        }
        Ok(())
    }
}

#[async_trait]
impl ParticipantStore for MemoryTx {
    async fn find_participant(&mut self, room_id: RoomId, user_id: &str) -> anyhow::Result<Option<Participant>> {
        let key = (room_id, user_id.to_owned());
        Ok(self.staged.participants.contains(&key).then(|| Participant {
            room_id,
            user_id: key.1,
        }))
    }
}

#[async_trait]
impl VoteStore for MemoryTx {
    async fn find_vote(&mut self, room_id: RoomId, user_id: &str) -> anyhow::Result<Option<Vote>> {
        Ok(self.staged.votes.get(&(room_id, user_id.to_owned())).cloned())
    }

    async fn list_votes(&mut self, room_id: RoomId) -> anyhow::Result<Vec<Vote>> {
        let mut votes: Vec<Vote> = self.staged.votes
            .values()
            .filter(|vote| vote.room_id == room_id)
            .cloned()
            .collect();
        votes.sort_by_key(|vote| vote.id);
        Ok(votes)
    }

    async fn insert_vote(&mut self, vote: &Vote) -> anyhow::Result<()> {
        self.staged.votes
            .entry((vote.room_id, vote.user_id.clone()))
            .and_modify(|existing| existing.value = vote.value.clone())
            .or_insert_with(|| vote.clone());
        Ok(())
    }

    async fn update_vote(&mut self, vote_id: VoteId, value: &str) -> anyhow::Result<()> {
        let vote = self.staged.votes
            .values_mut()
            .find(|vote| vote.id == vote_id)
            .ok_or_else(|| anyhow!("vote {vote_id} not found"))?;
        vote.value = value.to_owned();
        Ok(())
    }

    async fn delete_all_in_room(&mut self, room_id: RoomId) -> anyhow::Result<u64> {
        let before = self.staged.votes.len();
        self.staged.votes.retain(|(vote_room, _), _| *vote_room != room_id);
        Ok((before - self.staged.votes.len()) as u64)
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        let MemoryTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
