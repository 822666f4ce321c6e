//! Reporting groups and provenance edges
//!
//! An `OriginGroup` edge records that a content item published by a
//! reporting group referenced an origin. Counting distinct groups over these
//! edges measures independent corroboration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ContentId, EntityId, GroupId, OriginId};

/// A reporting organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
}

impl Group {
    pub fn new(id: GroupId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }
}

/// Provenance edge: `content_id`, published by `entity_id` on behalf of
/// `group_id`, referenced `origin_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginGroup {
    pub id: i64,
    pub origin_id: OriginId,
    pub group_id: GroupId,
    /// Contributing entity (the account that published the content)
    pub entity_id: EntityId,
    pub content_id: ContentId,
}

/// Corroboration contributed by one entity, as cached on the referenced entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReference {
    /// Number of corroborating content items
    pub number: u32,
    /// Corroborating content ids
    pub content: Vec<ContentId>,
    /// Name of the contributor's reporting group
    pub group: String,
}

/// Contributor summary keyed by contributing entity name
pub type SourceReferences = BTreeMap<String, SourceReference>;
