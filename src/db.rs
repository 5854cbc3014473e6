use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RoomId = Uuid;
pub type VoteId = Uuid;
pub type UserId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
}

impl Identity {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self { user_id: user_id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Room {
    pub id: RoomId,
    pub owner_id: UserId,
    pub votes_revealed: bool,

    // unique: id
}

/// Partial update of a room. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomPatch {
    pub votes_revealed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub room_id: RoomId,
    pub user_id: UserId,

    // unique: room_id, user_id
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vote {
    pub id: VoteId,
    pub room_id: RoomId,
    pub user_id: UserId,

    pub value: String,

    // unique: id
    // unique: room_id, user_id
}

impl Vote {
    pub fn new(room_id: RoomId, user_id: UserId, value: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            room_id,
            user_id,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomSettings {
    pub room_id: RoomId,
    pub allow_others_to_delete_votes: bool,
}
