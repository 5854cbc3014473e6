/// Session key holding the authenticated caller, written by the identity service.
pub const USER_ID: &str = "user_id";
