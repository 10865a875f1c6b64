//! Modera DB Library
//!
//! PostgreSQL persistence for moderation verdicts.

pub mod db;

pub use db::{StoredVerdict, VerdictRepository};
