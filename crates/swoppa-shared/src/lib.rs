//! # swoppa-shared
//!
//! Domain vocabulary shared by the Swoppa store and server: typed
//! identifiers, validation limits, the error taxonomy, the listing status
//! state machine, signed session tokens and realtime event payloads.
//!
//! Nothing in this crate performs I/O.

pub mod constants;
pub mod draft;
pub mod error;
pub mod events;
pub mod listing;
pub mod moderation;
pub mod rating;
pub mod session;
pub mod types;

pub use error::{DomainError, DomainResult};
pub use types::*;
