//! # swoppa-store
//!
//! SQLite persistence for the Swoppa marketplace core.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed operations for listings,
//! moderation, conversations, messages, favorites, the transaction and rating
//! ledger, profiles and draft sessions. Every mutating operation runs inside a
//! single SQLite transaction, so partial application is never observable.

pub mod conversations;
pub mod database;
pub mod drafts;
pub mod favorites;
pub mod listings;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod moderation;
pub mod profiles;
pub mod ratings;

mod convert;
mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
