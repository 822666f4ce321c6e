//! Pass-level errors

use thiserror::Error;

use mana_core::ConfigError;
use mana_engine::MergeError;
use mana_store::StoreError;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl ResolveError {
    /// Errors that must stop a pass rather than skip one entity
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Store(e) | Self::Merge(MergeError::Store(e)) => e.is_fatal(),
            Self::Merge(_) => false,
            Self::Config(_) => true,
        }
    }
}
