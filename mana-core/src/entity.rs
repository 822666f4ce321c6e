//! Entities tracked across social and web content
//!
//! An entity is one real-world source (organization, account, site). It
//! owns its origins and moves forward through a lifecycle:
//! - `ENTITY` -> `SOURCE_CANDIDATE` -> `SOURCE` (never backwards)
//! - `trusted` flips from false to true once, and stays there

use serde::{Deserialize, Serialize};

use crate::{EntityId, GroupId, Origin, SourceReferences};

/// Lifecycle status of an entity, ordered by corroboration strength
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    #[default]
    Entity,
    SourceCandidate,
    Source,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Entity => "ENTITY",
            EntityStatus::SourceCandidate => "SOURCE_CANDIDATE",
            EntityStatus::Source => "SOURCE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ENTITY" => Some(EntityStatus::Entity),
            "SOURCE_CANDIDATE" => Some(EntityStatus::SourceCandidate),
            "SOURCE" => Some(EntityStatus::Source),
            _ => None,
        }
    }
}

/// Manual verification state, ordered from least to most verified
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationState {
    #[default]
    NotVerified,
    PartiallyVerified,
    Verified,
}

impl VerificationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationState::NotVerified => "NOT_VERIFIED",
            VerificationState::PartiallyVerified => "PARTIALLY_VERIFIED",
            VerificationState::Verified => "VERIFIED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NOT_VERIFIED" => Some(VerificationState::NotVerified),
            "PARTIALLY_VERIFIED" => Some(VerificationState::PartiallyVerified),
            "VERIFIED" => Some(VerificationState::Verified),
            _ => None,
        }
    }
}

/// A pending merge proposal waiting for human review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedMerge {
    /// Entity this one may be the same as
    pub id: EntityId,
    /// Why the pair was flagged
    pub reason: String,
}

/// A tracked real-world source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    /// Curated seed entity, never absorbed by a merge
    #[serde(default)]
    pub is_reference: bool,
    #[serde(default)]
    pub verification_state: VerificationState,
    #[serde(default)]
    pub status: EntityStatus,
    #[serde(default)]
    pub trusted: bool,
    /// Number of entities absorbed into this one
    #[serde(default)]
    pub merges: u32,
    /// Review queue; `None` when empty
    #[serde(default)]
    pub suggested_merges: Option<Vec<SuggestedMerge>>,
    /// Audit log of absorbed entities
    #[serde(default)]
    pub merges_details: Vec<String>,
    #[serde(default)]
    pub comments: Vec<String>,
    /// Cached occurrence sum over distinct origins
    #[serde(default)]
    pub t_occurrences: Option<u64>,
    /// Cached contributor summary keyed by contributing entity name
    #[serde(default)]
    pub t_source_references: Option<SourceReferences>,
    /// Whether this entity completed one resolution cycle
    #[serde(default)]
    pub match_done: bool,
    /// Reporting organization this entity belongs to
    #[serde(default)]
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub ecoregion: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub origins: Vec<Origin>,
}

impl Entity {
    pub fn new(id: EntityId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            is_reference: false,
            verification_state: VerificationState::default(),
            status: EntityStatus::default(),
            trusted: false,
            merges: 0,
            suggested_merges: None,
            merges_details: Vec::new(),
            comments: Vec::new(),
            t_occurrences: None,
            t_source_references: None,
            match_done: false,
            group_id: None,
            location: None,
            ecoregion: None,
            tags: Vec::new(),
            origins: Vec::new(),
        }
    }

    pub fn reference(mut self) -> Self {
        self.is_reference = true;
        self
    }

    pub fn with_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn with_status(mut self, status: EntityStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_verification(mut self, state: VerificationState) -> Self {
        self.verification_state = state;
        self
    }

    pub fn with_match_done(mut self, match_done: bool) -> Self {
        self.match_done = match_done;
        self
    }

    /// Attach an origin, taking ownership of it
    pub fn with_origin(mut self, mut origin: Origin) -> Self {
        origin.base.entity_id = self.id;
        self.origins.push(origin);
        self
    }

    /// Whether a suggestion towards `target` is already queued
    pub fn has_suggestion_for(&self, target: EntityId) -> bool {
        self.suggested_merges
            .as_ref()
            .is_some_and(|s| s.iter().any(|m| m.id == target))
    }

    /// Queue a suggestion unless one already targets the same entity.
    /// Returns true if the queue changed.
    pub fn add_suggested_merge(&mut self, target: EntityId, reason: &str) -> bool {
        if self.has_suggestion_for(target) {
            return false;
        }
        self.suggested_merges
            .get_or_insert_with(Vec::new)
            .push(SuggestedMerge {
                id: target,
                reason: reason.to_string(),
            });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ordering() {
        assert!(EntityStatus::Entity < EntityStatus::SourceCandidate);
        assert!(EntityStatus::SourceCandidate < EntityStatus::Source);
        assert!(VerificationState::NotVerified < VerificationState::PartiallyVerified);
        assert!(VerificationState::PartiallyVerified < VerificationState::Verified);
    }

    #[test]
    fn test_status_string_round() {
        for status in [
            EntityStatus::Entity,
            EntityStatus::SourceCandidate,
            EntityStatus::Source,
        ] {
            assert_eq!(EntityStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EntityStatus::parse("TRUSTED_SOURCE"), None);
        assert_eq!(
            VerificationState::parse("PARTIALLY_VERIFIED"),
            Some(VerificationState::PartiallyVerified)
        );
    }

    #[test]
    fn test_suggested_merges_dedup_by_target() {
        let mut entity = Entity::new(1, "Acme");
        assert!(entity.suggested_merges.is_none());

        assert!(entity.add_suggested_merge(2, "Similar Twitter screen names: acme ~ acme_org"));
        assert!(!entity.add_suggested_merge(2, "Similar Web origins: acme.org ~ acme.org"));
        assert!(entity.add_suggested_merge(3, "Same Web origin: http://acme.org"));

        let merges = entity.suggested_merges.unwrap();
        assert_eq!(merges.len(), 2);
        assert!(merges[0].reason.starts_with("Similar Twitter"));
    }

    #[test]
    fn test_with_origin_takes_ownership() {
        let entity = Entity::new(7, "Acme").with_origin(Origin::twitter(1, 99, "acme"));
        assert_eq!(entity.origins[0].base.entity_id, 7);
    }

    #[test]
    fn test_deserialize_minimal_entity() {
        let entity: Entity = serde_json::from_str(r#"{"id": 4, "name": "Friends of Earth"}"#).unwrap();
        assert_eq!(entity.status, EntityStatus::Entity);
        assert!(!entity.trusted);
        assert!(entity.origins.is_empty());
    }
}
