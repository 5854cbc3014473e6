pub mod guard;
mod identity;

pub use identity::CurrentIdentity;
