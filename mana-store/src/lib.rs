//! MANA Storage Layer
//!
//! Provides the transactional repository the engines run against:
//! - `Repository` port (entities, origins, groups, provenance edges)
//! - In-memory adapter with snapshot transactions
//! - SQLite adapter with one transaction per unit of work

pub mod error;
pub mod memory;
pub mod repository;
pub mod sqlite;

pub use error::*;
pub use memory::*;
pub use repository::*;
pub use sqlite::*;
