//! Domain types for the EVE TS3 service

mod ids;
mod user;
mod verdict;

pub use ids::{ClientDbId, ServerGroupId};
pub use user::{group_name, Character, NewUser, User};
pub use verdict::ValidationVerdict;
