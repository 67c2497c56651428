//! EVE TS3 Core
//!
//! Shared domain types, the user store contract and error handling for the
//! EVE TS3 service.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Character`, `User`, `NewUser`, `ValidationVerdict`
//! - **Identifiers**: `ServerGroupId`, `ClientDbId`
//! - **Store Trait**: `UserStore`, implemented by `eve-ts3-storage`
//! - **Error Handling**: unified `CoreError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use eve_ts3_core::types::Character;
//!
//! let character = Character::new(1, "Pilot1", "ABC", "XYZ");
//! assert_eq!(character.group_name(), "XYZ ABC");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod storage;
pub mod types;

pub use error::{CoreError, Result};
pub use storage::UserStore;
pub use types::{
    group_name, Character, ClientDbId, NewUser, ServerGroupId, User, ValidationVerdict,
};
