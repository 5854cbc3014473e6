use crate::{db::{Identity, Participant, Room, RoomSettings}, votes::VoteError};

pub fn require_identity(identity: Option<&Identity>) -> Result<&Identity, VoteError> {
    identity.ok_or(VoteError::AuthenticationRequired)
}

/// `participant` is the membership record looked up for the caller, if any.
pub fn require_participant(participant: Option<Participant>) -> Result<Participant, VoteError> {
    participant.ok_or(VoteError::NotAParticipant)
}

/// Owners may always clear; everyone else only when the room allows it.
pub fn require_clear_permission(
    room: &Room,
    settings: &RoomSettings,
    identity: &Identity,
) -> Result<(), VoteError> {
    if identity.user_id == room.owner_id || settings.allow_others_to_delete_votes {
        Ok(())
    } else {
        Err(VoteError::InsufficientPermission)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn room(owner: &str) -> Room {
        Room {
            id: Uuid::now_v7(),
            owner_id: owner.to_owned(),
            votes_revealed: true,
        }
    }

    fn settings(room: &Room, allow_others: bool) -> RoomSettings {
        RoomSettings {
            room_id: room.id,
            allow_others_to_delete_votes: allow_others,
        }
    }

    #[test]
    fn missing_identity_is_rejected() {
        assert!(matches!(require_identity(None), Err(VoteError::AuthenticationRequired)));

        let alice = Identity::new("alice");
        assert_eq!(require_identity(Some(&alice)).unwrap(), &alice);
    }

    #[test]
    fn missing_membership_is_rejected() {
        assert!(matches!(require_participant(None), Err(VoteError::NotAParticipant)));

        let participant = Participant {
            room_id: Uuid::now_v7(),
            user_id: "bob".to_owned(),
        };
        assert_eq!(require_participant(Some(participant.clone())).unwrap(), participant);
    }

    #[test]
    fn owner_can_always_clear() {
        let room = room("alice");
        let alice = Identity::new("alice");
        assert!(require_clear_permission(&room, &settings(&room, false), &alice).is_ok());
        assert!(require_clear_permission(&room, &settings(&room, true), &alice).is_ok());
    }

    #[test]
    fn others_need_the_room_setting() {
        let room = room("alice");
        let bob = Identity::new("bob");
        assert!(matches!(
            require_clear_permission(&room, &settings(&room, false), &bob),
            Err(VoteError::InsufficientPermission)
        ));
        assert!(require_clear_permission(&room, &settings(&room, true), &bob).is_ok());
    }
}
