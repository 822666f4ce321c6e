//! Match classification
//!
//! Decides what should happen to a pair of entities:
//! - **Auto**: same Twitter account, merge without review
//! - **Suggested**: any other exact match, or any fuzzy match
//! - **None**: references on both sides, already consumed, or no match
//!
//! A classifier lives for one resolution pass and remembers which entities
//! were consumed by an auto-merge, so each entity takes part in at most one.

use std::collections::HashSet;

use tracing::debug;

use mana_core::{Entity, EntityId};

use crate::{first_exact_match, first_fuzzy_match, MatchKind};

/// Outcome of classifying a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationKind {
    None,
    Auto,
    Suggested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: ClassificationKind,
    pub reason: Option<String>,
}

impl Classification {
    pub fn none() -> Self {
        Self {
            kind: ClassificationKind::None,
            reason: None,
        }
    }

    fn with_reason(kind: ClassificationKind, reason: String) -> Self {
        Self {
            kind,
            reason: Some(reason),
        }
    }

    pub fn is_auto(&self) -> bool {
        self.kind == ClassificationKind::Auto
    }

    pub fn is_suggested(&self) -> bool {
        self.kind == ClassificationKind::Suggested
    }
}

/// Per-pass classification session
///
/// Only the first exact match over the origin pairs decides between `Auto`
/// and `Suggested`, walking `e1`'s origins in order against `e2`'s. Two
/// entities sharing both a site and a Twitter account are therefore
/// `Suggested` when the Web origins come first, and `Auto` otherwise.
#[derive(Debug)]
pub struct MatchClassifier {
    fuzzy_threshold: u8,
    auto_matched: HashSet<EntityId>,
}

impl MatchClassifier {
    pub fn new(fuzzy_threshold: u8) -> Self {
        Self {
            fuzzy_threshold,
            auto_matched: HashSet::new(),
        }
    }

    /// Whether an entity was already consumed by an auto-match this pass
    pub fn is_auto_matched(&self, id: EntityId) -> bool {
        self.auto_matched.contains(&id)
    }

    /// Classify a pair, recording both ids when the result is `Auto`
    pub fn classify(&mut self, e1: &Entity, e2: &Entity) -> Classification {
        if e1.is_reference && e2.is_reference {
            return Classification::none();
        }
        if self.is_auto_matched(e1.id) || self.is_auto_matched(e2.id) {
            return Classification::none();
        }

        if let Some(exact) = first_exact_match(&e1.origins, &e2.origins) {
            if exact.kind == MatchKind::Twitter {
                debug!("Auto match found: {} = {} [reason = {}]", e1.id, e2.id, exact.reason);
                self.auto_matched.insert(e1.id);
                self.auto_matched.insert(e2.id);
                return Classification::with_reason(ClassificationKind::Auto, exact.reason);
            }
            debug!("Suggested match found: {} = {} [reason = {}]", e1.id, e2.id, exact.reason);
            return Classification::with_reason(ClassificationKind::Suggested, exact.reason);
        }

        match first_fuzzy_match(&e1.origins, &e2.origins, self.fuzzy_threshold) {
            Some(fuzzy) => {
                debug!("Suggested match found: {} = {} [reason = {}]", e1.id, e2.id, fuzzy.reason);
                Classification::with_reason(ClassificationKind::Suggested, fuzzy.reason)
            }
            None => Classification::none(),
        }
    }
}
