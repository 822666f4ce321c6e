//! MANA Engine
//!
//! Resolution rules over the domain model:
//! - **Comparator**: exact and fuzzy comparison of origin pairs
//! - **Classifier**: auto / suggested / no match for entity pairs
//! - **Merge**: validated, reconciling entity merges
//! - **Trust**: source candidate and trusted promotion, enrichment
//!
//! Every operation takes the repository as an argument and keeps no
//! handle to it afterwards.

pub mod classifier;
pub mod comparator;
pub mod error;
pub mod merge;
pub mod trust;

pub use classifier::*;
pub use comparator::*;
pub use error::*;
pub use merge::*;
pub use trust::*;
