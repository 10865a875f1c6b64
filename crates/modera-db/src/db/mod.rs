//! Database repositories for data access layer
//
// Verdict records (one row per content id)
pub mod verdict;

pub use verdict::{StoredVerdict, VerdictRepository};
