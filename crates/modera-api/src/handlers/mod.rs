pub mod health;
pub mod ingest;
pub mod moderate;
pub mod uploads;
pub mod verdicts;
