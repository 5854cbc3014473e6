//! Storage seams consumed by the vote coordinator.
//!
//! Room, participant and vote access happens inside a [`StoreTx`] so that a
//! coordinator operation either commits all of its writes or none of them.
//! Room settings come from a separate [`RoomSettingsLookup`] because they are
//! owned by another service.

mod memory;
mod sqlite;

use async_trait::async_trait;

use crate::db::{Participant, Room, RoomId, RoomPatch, RoomSettings, Vote, VoteId};

pub use memory::MemoryStore;
pub use sqlite::{SqliteRoomSettings, SqliteStore};

#[async_trait]
pub trait RoomStore: Send {
    async fn get_room(&mut self, room_id: RoomId) -> anyhow::Result<Option<Room>>;
    async fn patch_room(&mut self, room_id: RoomId, patch: RoomPatch) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ParticipantStore: Send {
    async fn find_participant(&mut self, room_id: RoomId, user_id: &str) -> anyhow::Result<Option<Participant>>;
}

#[async_trait]
pub trait VoteStore: Send {
    async fn find_vote(&mut self, room_id: RoomId, user_id: &str) -> anyhow::Result<Option<Vote>>;
    async fn list_votes(&mut self, room_id: RoomId) -> anyhow::Result<Vec<Vote>>;
    /// Must keep `(room_id, user_id)` unique. If a racing writer inserted
    /// first, the existing record takes the new value.
    async fn insert_vote(&mut self, vote: &Vote) -> anyhow::Result<()>;
    async fn update_vote(&mut self, vote_id: VoteId, value: &str) -> anyhow::Result<()>;
    /// Returns how many votes were removed.
    async fn delete_all_in_room(&mut self, room_id: RoomId) -> anyhow::Result<u64>;
}

/// One unit of work. Dropping it without [`StoreTx::commit`] discards every write.
#[async_trait]
pub trait StoreTx: RoomStore + ParticipantStore + VoteStore {
    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> anyhow::Result<Box<dyn StoreTx>>;
}

#[async_trait]
pub trait RoomSettingsLookup: Send + Sync {
    /// Every existing room has settings; a missing record is an error.
    async fn settings_for_room(&self, room_id: RoomId) -> anyhow::Result<RoomSettings>;
}
