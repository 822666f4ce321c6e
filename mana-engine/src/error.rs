//! Merge failures

use thiserror::Error;

use mana_core::{EntityId, GroupId};
use mana_store::StoreError;

/// Why a merge was refused or could not complete
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Cannot merge entities {id1} and {id2} as entity {missing} does not exist")]
    NotFound {
        id1: EntityId,
        id2: EntityId,
        missing: EntityId,
    },

    #[error("Cannot merge identical entities")]
    Identical { id: EntityId },

    #[error("Cannot merge entities {id1} and {id2} as they are both references")]
    BothReference { id1: EntityId, id2: EntityId },

    #[error("Cannot merge entities {id1} and {id2} as they belong to different groups ({group1} != {group2})")]
    GroupConflict {
        id1: EntityId,
        id2: EntityId,
        group1: GroupId,
        group2: GroupId,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl MergeError {
    /// Refused by a precondition; nothing was written
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}
