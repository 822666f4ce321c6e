//! Entity merging
//!
//! Folds one entity into another:
//! - Validates the pair before anything is written
//! - Keeps the reference entity when there is exactly one
//! - Reconciles lifecycle fields, moves origins and provenance
//! - Re-runs trust promotion on the survivor, then deletes the other side
//!
//! Callers own the unit of work; nothing here begins or commits.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, info};

use mana_core::{Entity, EntityId, EntityStatus, ResolutionConfig, SuggestedMerge};
use mana_store::{Repository, StoreResult};

use crate::{enrich, flag_source_candidate, flag_trusted_candidate, MergeError};

/// Result of a completed merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub kept: EntityId,
    pub absorbed: EntityId,
}

impl fmt::Display for MergeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entity id={} was merged into entity id={}",
            self.absorbed, self.kept
        )
    }
}

/// Check the merge preconditions, returning both entities in argument order
fn load_pair<R: Repository + ?Sized>(
    repo: &R,
    id1: EntityId,
    id2: EntityId,
) -> Result<(Entity, Entity), MergeError> {
    let e1 = repo.get_entity(id1)?.ok_or(MergeError::NotFound {
        id1,
        id2,
        missing: id1,
    })?;
    let e2 = repo.get_entity(id2)?.ok_or(MergeError::NotFound {
        id1,
        id2,
        missing: id2,
    })?;

    if id1 == id2 {
        return Err(MergeError::Identical { id: id1 });
    }
    if e1.is_reference && e2.is_reference {
        return Err(MergeError::BothReference { id1, id2 });
    }
    if let (Some(group1), Some(group2)) = (e1.group_id, e2.group_id) {
        if group1 != group2 {
            return Err(MergeError::GroupConflict {
                id1,
                id2,
                group1,
                group2,
            });
        }
    }

    Ok((e1, e2))
}

/// Combine the absorbed entity's own fields into the kept one.
/// Origins are not touched.
pub fn reconcile(kept: &mut Entity, absorbed: &Entity, reason: &str) {
    kept.verification_state = kept.verification_state.min(absorbed.verification_state);
    kept.status = kept.status.max(absorbed.status);
    kept.trusted = kept.trusted && absorbed.trusted;
    kept.merges += absorbed.merges + 1;
    kept.match_done = kept.match_done && absorbed.match_done;

    let merged_ids = [kept.id, absorbed.id];
    let mut seen = HashSet::new();
    let suggestions: Vec<SuggestedMerge> = kept
        .suggested_merges
        .iter()
        .chain(absorbed.suggested_merges.iter())
        .flatten()
        .filter(|s| !merged_ids.contains(&s.id))
        .filter(|s| seen.insert(s.id))
        .cloned()
        .collect();
    kept.suggested_merges = (!suggestions.is_empty()).then_some(suggestions);

    kept.comments.extend(absorbed.comments.iter().cloned());

    kept.merges_details
        .extend(absorbed.merges_details.iter().cloned());
    kept.merges_details.push(format!(
        "Merged with (removed) entity {} ({})",
        absorbed.id, reason
    ));

    if kept.group_id.is_none() {
        kept.group_id = absorbed.group_id;
    }

    // ANDed above, ORed here; together the survivor ends up with the
    // absorbed side's flag. Whether the AND was meant to stand is an open
    // question, so both steps are applied as recorded.
    kept.match_done = kept.match_done || absorbed.match_done;

    debug!(
        "Reconciled {}: status={:?}, verification={:?}, trusted={}, merges={}, match_done={}",
        kept.id, kept.status, kept.verification_state, kept.trusted, kept.merges, kept.match_done
    );
}

/// Merge `id2` into `id1` (or `id1` into `id2` when only `id2` is a
/// reference). Not symmetric: with no reference involved, `id1` survives.
pub fn merge<R: Repository + ?Sized>(
    repo: &mut R,
    id1: EntityId,
    id2: EntityId,
    reason: &str,
    config: &ResolutionConfig,
) -> Result<MergeSummary, MergeError> {
    info!("Request to merge entities {} and {}", id1, id2);

    let (e1, e2) = load_pair(repo, id1, id2)?;
    let (mut kept, mut absorbed) = if e2.is_reference { (e2, e1) } else { (e1, e2) };
    info!("Will merge {} into {}", absorbed.id, kept.id);

    reconcile(&mut kept, &absorbed, reason);

    for mut origin in std::mem::take(&mut absorbed.origins) {
        repo.reassign_origin(origin.id(), kept.id)?;
        origin.base.entity_id = kept.id;
        kept.origins.push(origin);
    }
    let edges = repo.reassign_contributor(absorbed.id, kept.id)?;
    debug!("Re-pointed {} provenance edges at {}", edges, kept.id);

    if kept.match_done {
        flag_source_candidate(&mut kept, config.source_candidate_threshold);
        flag_trusted_candidate(
            &*repo,
            &mut kept,
            config.trusted_source_groups_threshold,
            config.trusted_source_occurrences_threshold,
        )?;
        if kept.status == EntityStatus::SourceCandidate {
            enrich(&*repo, &mut kept)?;
        }
    }

    repo.update_entity(&kept)?;
    debug!("Deleting entity {}", absorbed.id);
    repo.delete_entity(absorbed.id)?;

    let summary = MergeSummary {
        kept: kept.id,
        absorbed: absorbed.id,
    };
    info!("{}", summary);
    Ok(summary)
}

/// Record a suggested merge on both entities, deduplicated by target.
///
/// Skipped when either entity is gone or both are references. Returns true
/// if either side's queue changed.
pub fn suggest_merge<R: Repository + ?Sized>(
    repo: &mut R,
    id1: EntityId,
    id2: EntityId,
    reason: &str,
) -> StoreResult<bool> {
    if id1 == id2 {
        return Ok(false);
    }
    let (Some(mut e1), Some(mut e2)) = (repo.get_entity(id1)?, repo.get_entity(id2)?) else {
        info!(
            "Cannot suggest merging {} and {} as one of them does not exist anymore",
            id1, id2
        );
        return Ok(false);
    };
    if e1.is_reference && e2.is_reference {
        info!(
            "Cannot suggest merging {} and {} as they are both references",
            id1, id2
        );
        return Ok(false);
    }

    let mut changed = false;
    if e1.add_suggested_merge(id2, reason) {
        repo.update_entity(&e1)?;
        changed = true;
    }
    if e2.add_suggested_merge(id1, reason) {
        repo.update_entity(&e2)?;
        changed = true;
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mana_core::{Group, Origin, OriginGroup, VerificationState};
    use mana_store::MemoryRepository;

    fn config() -> ResolutionConfig {
        ResolutionConfig::default()
    }

    fn seeded() -> MemoryRepository {
        let mut repo = MemoryRepository::new();
        repo.insert_entity(
            &Entity::new(1, "Acme")
                .with_origin(Origin::twitter(10, 1, "acme").with_occurrences(2)),
        )
        .unwrap();
        repo.insert_entity(
            &Entity::new(2, "Acme Org")
                .with_origin(Origin::web(20, 2, "http://acme.org").with_occurrences(1)),
        )
        .unwrap();
        repo
    }

    #[test]
    fn test_merge_keeps_first_without_reference() {
        let mut repo = seeded();
        let summary = merge(&mut repo, 1, 2, "Same Twitter screen name: acme", &config()).unwrap();

        assert_eq!(summary, MergeSummary { kept: 1, absorbed: 2 });
        assert_eq!(summary.to_string(), "Entity id=2 was merged into entity id=1");
        assert!(repo.get_entity(2).unwrap().is_none());

        let kept = repo.get_entity(1).unwrap().unwrap();
        assert_eq!(kept.merges, 1);
        assert_eq!(kept.origins.len(), 2);
        assert_eq!(
            kept.merges_details,
            vec!["Merged with (removed) entity 2 (Same Twitter screen name: acme)".to_string()]
        );
    }

    #[test]
    fn test_merge_keeps_reference_regardless_of_order() {
        for (id1, id2) in [(1, 2), (2, 1)] {
            let mut repo = MemoryRepository::new();
            repo.insert_entity(&Entity::new(1, "Acme")).unwrap();
            repo.insert_entity(&Entity::new(2, "Acme Ref").reference()).unwrap();

            let summary = merge(&mut repo, id1, id2, "manual", &config()).unwrap();
            assert_eq!(summary.kept, 2);
            assert!(repo.get_entity(1).unwrap().is_none());
        }
    }

    #[test]
    fn test_merge_preconditions() {
        let mut repo = seeded();
        repo.insert_entity(&Entity::new(3, "Ref A").reference().with_group(1)).unwrap();
        repo.insert_entity(&Entity::new(4, "Ref B").reference()).unwrap();
        repo.insert_entity(&Entity::new(5, "Other").with_group(2)).unwrap();

        assert!(matches!(
            merge(&mut repo, 1, 99, "r", &config()),
            Err(MergeError::NotFound { missing: 99, .. })
        ));
        assert!(matches!(
            merge(&mut repo, 1, 1, "r", &config()),
            Err(MergeError::Identical { id: 1 })
        ));
        assert!(matches!(
            merge(&mut repo, 3, 4, "r", &config()),
            Err(MergeError::BothReference { .. })
        ));
        let err = merge(&mut repo, 3, 5, "r", &config()).unwrap_err();
        assert!(matches!(err, MergeError::GroupConflict { group1: 1, group2: 2, .. }));
        assert!(err.is_validation());

        assert_eq!(repo.entity_count(), 5);
        assert_eq!(repo.get_entity(1).unwrap().unwrap().merges, 0);
    }

    #[test]
    fn test_reconcile_fields() {
        let mut kept = Entity::new(1, "Acme")
            .with_status(EntityStatus::SourceCandidate)
            .with_verification(VerificationState::Verified);
        kept.trusted = true;
        kept.merges = 2;
        kept.comments.push("kept note".to_string());
        kept.add_suggested_merge(7, "a");
        kept.add_suggested_merge(2, "self");

        let mut absorbed = Entity::new(2, "Acme 2")
            .with_status(EntityStatus::Source)
            .with_verification(VerificationState::PartiallyVerified)
            .with_group(4)
            .with_match_done(true);
        absorbed.merges = 1;
        absorbed.merges_details.push("older merge".to_string());
        absorbed.comments.push("absorbed note".to_string());
        absorbed.add_suggested_merge(7, "b");
        absorbed.add_suggested_merge(8, "c");
        absorbed.add_suggested_merge(1, "kept");

        reconcile(&mut kept, &absorbed, "why");

        assert_eq!(kept.status, EntityStatus::Source);
        assert_eq!(kept.verification_state, VerificationState::PartiallyVerified);
        assert!(!kept.trusted);
        assert_eq!(kept.merges, 4);
        assert!(kept.match_done);
        assert_eq!(kept.group_id, Some(4));
        assert_eq!(kept.comments, vec!["kept note", "absorbed note"]);
        assert_eq!(
            kept.merges_details,
            vec!["older merge", "Merged with (removed) entity 2 (why)"]
        );

        let suggestions = kept.suggested_merges.unwrap();
        let ids: Vec<EntityId> = suggestions.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![7, 8]);
        assert_eq!(suggestions[0].reason, "a");
    }

    #[test]
    fn test_reconcile_empty_suggestions_become_none() {
        let mut kept = Entity::new(1, "Acme");
        let mut absorbed = Entity::new(2, "Acme 2");
        absorbed.add_suggested_merge(1, "each other");
        kept.add_suggested_merge(2, "each other");

        reconcile(&mut kept, &absorbed, "why");
        assert!(kept.suggested_merges.is_none());
        assert!(!kept.match_done);
    }

    fn corroborated_pair(kept_done: bool, absorbed_done: bool) -> MemoryRepository {
        let mut repo = MemoryRepository::new();
        repo.insert_group(&Group::new(1, "Amazon Watch")).unwrap();
        repo.insert_entity(&Entity::new(50, "Amazon Watch")).unwrap();
        repo.insert_entity(
            &Entity::new(1, "Acme")
                .with_match_done(kept_done)
                .with_origin(Origin::twitter(10, 1, "acme").with_occurrences(2)),
        )
        .unwrap();
        repo.insert_entity(
            &Entity::new(2, "Acme 2")
                .with_match_done(absorbed_done)
                .with_origin(Origin::twitter(20, 2, "acme").with_occurrences(2)),
        )
        .unwrap();
        repo.insert_origin_group(&OriginGroup {
            id: 1,
            origin_id: 20,
            group_id: 1,
            entity_id: 50,
            content_id: 900,
        })
        .unwrap();
        repo
    }

    #[test]
    fn test_merge_survivor_takes_absorbed_match_flag() {
        let mut repo = corroborated_pair(true, false);

        merge(&mut repo, 1, 2, "Same Twitter screen name: acme", &config()).unwrap();

        let kept = repo.get_entity(1).unwrap().unwrap();
        assert!(!kept.match_done);
        assert_eq!(kept.status, EntityStatus::Entity);
        assert!(kept.t_occurrences.is_none());
        assert!(kept.t_source_references.is_none());
        assert_eq!(kept.origins.len(), 2);
    }

    #[test]
    fn test_merge_promotes_when_absorbed_was_matched() {
        let mut repo = corroborated_pair(false, true);

        merge(&mut repo, 1, 2, "Same Twitter screen name: acme", &config()).unwrap();

        let kept = repo.get_entity(1).unwrap().unwrap();
        assert!(kept.match_done);
        assert_eq!(kept.status, EntityStatus::SourceCandidate);
        assert_eq!(kept.t_occurrences, Some(4));
        let refs = kept.t_source_references.unwrap();
        assert_eq!(refs["Amazon Watch"].content, vec![900]);
        assert_eq!(repo.list_origin_groups(20).unwrap().len(), 1);
    }

    #[test]
    fn test_merge_repoints_contributor_edges() {
        let mut repo = seeded();
        repo.insert_entity(&Entity::new(3, "Cited")).unwrap();
        repo.insert_origin(&Origin::web(30, 3, "http://cited.org")).unwrap();
        repo.insert_origin_group(&OriginGroup {
            id: 1,
            origin_id: 30,
            group_id: 1,
            entity_id: 2,
            content_id: 900,
        })
        .unwrap();

        merge(&mut repo, 1, 2, "r", &config()).unwrap();
        assert_eq!(repo.list_origin_groups(30).unwrap()[0].entity_id, 1);
    }

    #[test]
    fn test_suggest_merge_is_symmetric_and_deduplicated() {
        let mut repo = seeded();
        assert!(suggest_merge(&mut repo, 1, 2, "Similar Web origins").unwrap());
        assert!(!suggest_merge(&mut repo, 2, 1, "again").unwrap());

        let e1 = repo.get_entity(1).unwrap().unwrap();
        let e2 = repo.get_entity(2).unwrap().unwrap();
        assert_eq!(e1.suggested_merges.as_ref().unwrap().len(), 1);
        assert!(e1.has_suggestion_for(2));
        assert!(e2.has_suggestion_for(1));
        assert_eq!(e2.suggested_merges.unwrap()[0].reason, "Similar Web origins");
    }

    #[test]
    fn test_suggest_merge_skips_missing_and_references() {
        let mut repo = seeded();
        assert!(!suggest_merge(&mut repo, 1, 99, "r").unwrap());

        repo.insert_entity(&Entity::new(3, "Ref A").reference()).unwrap();
        repo.insert_entity(&Entity::new(4, "Ref B").reference()).unwrap();
        assert!(!suggest_merge(&mut repo, 3, 4, "r").unwrap());
        assert!(repo.get_entity(3).unwrap().unwrap().suggested_merges.is_none());
    }
}
