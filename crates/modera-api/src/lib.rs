//! Modera API Library
//!
//! HTTP boundary of the moderation service: upload-URL issuance, ingestion
//! trigger, synchronous moderation and verdict lookup.

pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;

pub use error::HttpAppError;
pub use state::AppState;
