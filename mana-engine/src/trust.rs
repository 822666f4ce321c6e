//! Trust promotion
//!
//! Lifecycle rules driven by how often an entity's origins were cited:
//! - ENTITY becomes SOURCE_CANDIDATE once its occurrences reach a threshold
//! - An entity becomes trusted once enough distinct groups corroborate it
//! - Source candidates carry denormalized occurrence and reference summaries
//!
//! Status and trust only move forward here.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use mana_core::{
    Entity, EntityStatus, GroupId, Origin, OriginKind, SourceReference, SourceReferences,
};
use mana_store::{Repository, StoreResult};

/// Origins counted once: every Twitter and Web origin, and RSS feeds that
/// were not discovered from a tracked Web origin.
pub fn distinct_origins(entity: &Entity) -> Vec<&Origin> {
    entity
        .origins
        .iter()
        .filter(|origin| match &origin.kind {
            OriginKind::Twitter(_) | OriginKind::Web(_) => true,
            OriginKind::Rss(rss) => rss.origin_web.is_none(),
        })
        .collect()
}

/// Total occurrences over the distinct origins
pub fn sum_occurrences(entity: &Entity) -> u64 {
    let origins = distinct_origins(entity);
    let total = origins.iter().map(|o| u64::from(o.base.occurrences)).sum();

    let refs: Vec<String> = origins
        .iter()
        .map(|o| format!("id={}, occ={}", o.id(), o.base.occurrences))
        .collect();
    debug!("Sum occurrences for {}: {}, refs: {:?}", entity.name, total, refs);

    total
}

/// Promote an ENTITY to SOURCE_CANDIDATE once `sum_occurrences` reaches
/// `threshold`. Returns true if the status changed.
pub fn flag_source_candidate(entity: &mut Entity, threshold: u32) -> bool {
    if entity.status != EntityStatus::Entity {
        return false;
    }
    let occurrences = sum_occurrences(entity);
    if occurrences < u64::from(threshold) {
        return false;
    }

    info!(
        "{} has enough occurrences {} to be flagged as source candidate",
        entity.name, occurrences
    );
    entity.status = EntityStatus::SourceCandidate;
    true
}

fn distinct_groups<R: Repository + ?Sized>(repo: &R, entity: &Entity) -> StoreResult<BTreeSet<GroupId>> {
    let mut groups = BTreeSet::new();
    for origin in distinct_origins(entity) {
        for edge in repo.list_origin_groups(origin.id())? {
            groups.insert(edge.group_id);
        }
    }
    Ok(groups)
}

/// Mark an entity trusted when its occurrences reach
/// `occurrences_threshold` and at least `groups_threshold` distinct groups
/// cited its distinct origins. Never clears the flag. Returns true if the
/// flag changed.
pub fn flag_trusted_candidate<R: Repository + ?Sized>(
    repo: &R,
    entity: &mut Entity,
    groups_threshold: u32,
    occurrences_threshold: u32,
) -> StoreResult<bool> {
    if entity.trusted {
        return Ok(false);
    }
    let occurrences = sum_occurrences(entity);
    if occurrences < u64::from(occurrences_threshold) {
        return Ok(false);
    }

    debug!(
        "{} has enough occurrences for checking distinct groups {}",
        entity.name, occurrences
    );
    let groups = distinct_groups(repo, entity)?;
    debug!("Distinct groups for {}: {:?}", entity.name, groups);

    if groups.len() < groups_threshold as usize {
        return Ok(false);
    }

    info!("{} was referenced by enough groups {}", entity.name, groups.len());
    entity.trusted = true;
    Ok(true)
}

/// Recompute `t_occurrences` and `t_source_references` from scratch.
///
/// References are keyed by the name of the contributing entity and list
/// every content item in which it cited one of our distinct origins.
pub fn enrich<R: Repository + ?Sized>(repo: &R, entity: &mut Entity) -> StoreResult<()> {
    let origins = distinct_origins(entity);
    debug!(
        "There are {} distinct origins for entity '{}' (id={})",
        origins.len(),
        entity.name,
        entity.id
    );

    let mut references = SourceReferences::new();
    for origin in &origins {
        for edge in repo.list_origin_groups(origin.id())? {
            let Some(contributor) = repo.get_entity(edge.entity_id)? else {
                warn!(
                    "Skipping reference {} on origin {}: contributing entity {} is gone",
                    edge.id, edge.origin_id, edge.entity_id
                );
                continue;
            };
            let group = repo
                .get_group(edge.group_id)?
                .map(|g| g.name)
                .unwrap_or_default();

            references
                .entry(contributor.name)
                .and_modify(|r| {
                    r.number += 1;
                    r.content.push(edge.content_id);
                })
                .or_insert_with(|| SourceReference {
                    number: 1,
                    content: vec![edge.content_id],
                    group,
                });
        }
    }

    entity.t_occurrences = Some(sum_occurrences(entity));
    entity.t_source_references = Some(references);
    Ok(())
}
