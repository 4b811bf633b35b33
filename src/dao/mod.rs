/// Persistence entry points for parties, participants, songs and votes.
pub mod party_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
/// External music catalog lookups.
pub mod catalog;
