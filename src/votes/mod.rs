//! Vote coordination: the only place vote and reveal state is mutated.
//!
//! Each operation runs every check inside one store transaction before its
//! first write, commits, and only then announces the change on the event
//! channel. A failed check drops the transaction, so nothing is written and
//! nothing is announced.

mod error;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::{
    auth::guard,
    db::{Identity, RoomId, RoomPatch, UserId, Vote},
    store::{RoomSettingsLookup, Store},
};

pub use error::VoteError;

/// Announced after a mutation commits. Never carries vote values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    VoteCast { room_id: RoomId, user_id: UserId },
    VotesCleared { room_id: RoomId, removed: u64 },
}

impl RoomEvent {
    pub fn room_id(&self) -> RoomId {
        match self {
            RoomEvent::VoteCast { room_id, .. } | RoomEvent::VotesCleared { room_id, .. } => *room_id,
        }
    }
}

/// One entry of [`RoomVotes`]. `value` is hidden until votes are revealed,
/// except on the caller's own vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteView {
    pub user_id: UserId,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomVotes {
    pub room_id: RoomId,
    pub votes_revealed: bool,
    pub votes: Vec<VoteView>,
}

#[derive(Clone)]
pub struct VoteCoordinator {
    store: Arc<dyn Store>,
    settings: Arc<dyn RoomSettingsLookup>,
    events: broadcast::Sender<RoomEvent>,
}

impl VoteCoordinator {
    pub fn new(
        store: Arc<dyn Store>,
        settings: Arc<dyn RoomSettingsLookup>,
        events: broadcast::Sender<RoomEvent>,
    ) -> Self {
        Self { store, settings, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    /// Records `value` as the caller's vote in the room, replacing any
    /// earlier vote of theirs in place.
    pub async fn cast_vote(
        &self,
        room_id: RoomId,
        value: String,
        identity: Option<&Identity>,
    ) -> Result<(), VoteError> {
        let identity = guard::require_identity(identity)?;

        let mut tx = self.store.begin().await?;
        let room = tx.get_room(room_id).await?.ok_or(VoteError::RoomNotFound)?;
        let participant = tx.find_participant(room.id, &identity.user_id).await?;
        if let Err(err) = guard::require_participant(participant) {
            tracing::debug!(%room_id, user_id = %identity.user_id, "vote from non-participant rejected");
            return Err(err);
        }

        match tx.find_vote(room.id, &identity.user_id).await? {
            Some(existing) => tx.update_vote(existing.id, &value).await?,
            None => tx.insert_vote(&Vote::new(room.id, identity.user_id.clone(), value)).await?,
        }
        tx.commit().await?;

        tracing::info!(%room_id, user_id = %identity.user_id, "vote cast");
        self.publish(RoomEvent::VoteCast {
            room_id,
            user_id: identity.user_id.clone(),
        });
        Ok(())
    }

    /// Removes every vote in the room and hides votes again, as one commit.
    ///
    /// Settings are read once and not re-checked before the write.
    pub async fn clear_votes(
        &self,
        room_id: RoomId,
        identity: Option<&Identity>,
    ) -> Result<(), VoteError> {
        let identity = guard::require_identity(identity)?;

        let mut tx = self.store.begin().await?;
        let room = tx.get_room(room_id).await?.ok_or(VoteError::RoomNotFound)?;
        let settings = self.settings.settings_for_room(room.id).await?;
        if let Err(err) = guard::require_clear_permission(&room, &settings, identity) {
            tracing::debug!(%room_id, user_id = %identity.user_id, "clear without permission rejected");
            return Err(err);
        }

        tx.patch_room(room.id, RoomPatch { votes_revealed: Some(false) }).await?;
        let removed = tx.delete_all_in_room(room.id).await?;
        tx.commit().await?;

        tracing::info!(%room_id, user_id = %identity.user_id, removed, "votes cleared");
        self.publish(RoomEvent::VotesCleared { room_id, removed });
        Ok(())
    }

    /// Reveal flag and votes of a room, read from one transaction.
    pub async fn room_votes(
        &self,
        room_id: RoomId,
        identity: Option<&Identity>,
    ) -> Result<RoomVotes, VoteError> {
        let identity = guard::require_identity(identity)?;

        let mut tx = self.store.begin().await?;
        let room = tx.get_room(room_id).await?.ok_or(VoteError::RoomNotFound)?;
        guard::require_participant(tx.find_participant(room.id, &identity.user_id).await?)?;
        let votes = tx.list_votes(room.id).await?;
        drop(tx);

        let votes = votes
            .into_iter()
            .map(|vote| {
                let visible = room.votes_revealed || vote.user_id == identity.user_id;
                VoteView {
                    value: visible.then_some(vote.value),
                    user_id: vote.user_id,
                }
            })
            .collect();

        Ok(RoomVotes {
            room_id,
            votes_revealed: room.votes_revealed,
            votes,
        })
    }

    fn publish(&self, event: RoomEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}
