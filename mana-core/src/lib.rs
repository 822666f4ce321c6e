//! MANA Core - Domain model for source resolution
//!
//! This crate provides the foundational primitives:
//! - Entities and their lifecycle states
//! - Origins (Twitter, Web, RSS evidence channels)
//! - Provenance edges between origins and reporting groups
//! - Similarity scoring and URL normalization
//! - Resolution thresholds and their loading

pub mod config;
pub mod entity;
pub mod origin;
pub mod provenance;
pub mod similarity;

pub use config::*;
pub use entity::*;
pub use origin::*;
pub use provenance::*;
pub use similarity::*;

/// Entity identifier
pub type EntityId = i64;

/// Origin identifier
pub type OriginId = i64;

/// Group identifier
pub type GroupId = i64;

/// Content identifier
pub type ContentId = i64;

/// Default similarity score (0-100) a fuzzy comparison must reach
pub const DEFAULT_FUZZY_MATCH_THRESHOLD: u8 = 82;

/// Default occurrences needed to become a source candidate
pub const DEFAULT_SOURCE_CANDIDATE_THRESHOLD: u32 = 3;

/// Default occurrences needed before distinct groups are counted
pub const DEFAULT_TRUSTED_SOURCE_OCCURRENCES_THRESHOLD: u32 = 10;

/// Default distinct reporting groups needed to become trusted
pub const DEFAULT_TRUSTED_SOURCE_GROUPS_THRESHOLD: u32 = 2;

/// Maximum similarity score
pub const MAX_SIMILARITY: u8 = 100;
