//! MANA Runtime
//!
//! Batch passes over a repository:
//! - **Resolution**: classify unmatched entities, merge and suggest
//! - **Trust promotion**: re-apply lifecycle rules to the whole store
//! - **Resolver**: facade owning the repository and configuration

pub mod driver;
pub mod error;
pub mod promotion;
pub mod resolver;

pub use driver::*;
pub use error::*;
pub use promotion::*;
pub use resolver::*;
