//! Resolution Driver
//!
//! One batch pass over every entity not yet matched:
//! - Snapshot the store and split entities into matched / unmatched
//! - Pop unmatched entities (last first) and classify each against every
//!   matched entity, then every remaining unmatched one
//! - Apply auto merges, record suggestions, mark the entity matched
//!
//! Each popped entity is its own unit of work. A failure rolls that entity
//! back and the pass moves on, unless the store itself is gone.
//!
//! Classification is O(n²) in the number of entities; large stores need a
//! blocking key before this scales.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use mana_core::{Entity, EntityId, ResolutionConfig};
use mana_engine::{merge, suggest_merge, ClassificationKind, MatchClassifier};
use mana_store::{in_transaction, Repository};

use crate::ResolveError;

/// Counters for one resolution pass
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Entities whose unit of work committed
    pub processed: usize,
    /// Entities absorbed earlier in the pass
    pub skipped: usize,
    /// Entities rolled back after an error
    pub failed: usize,
    pub auto_merges_applied: usize,
    pub auto_merges_rejected: usize,
    pub suggestions_recorded: usize,
}

impl ResolutionReport {
    fn start() -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            processed: 0,
            skipped: 0,
            failed: 0,
            auto_merges_applied: 0,
            auto_merges_rejected: 0,
            suggestions_recorded: 0,
        }
    }
}

/// What one entity's unit of work did
#[derive(Debug, Default)]
struct EntityOutcome {
    merges_applied: usize,
    merges_rejected: usize,
    suggestions: usize,
}

struct Candidate {
    other: EntityId,
    reason: String,
}

/// Runs resolution passes with a fixed configuration snapshot
pub struct ResolutionDriver<'a> {
    config: &'a ResolutionConfig,
}

impl<'a> ResolutionDriver<'a> {
    pub fn new(config: &'a ResolutionConfig) -> Self {
        Self { config }
    }

    /// Run one pass over the store
    pub fn run<R: Repository + ?Sized>(&self, repo: &mut R) -> Result<ResolutionReport, ResolveError> {
        let mut report = ResolutionReport::start();
        info!("Starting resolution pass {}", report.run_id);

        let (matched, mut unmatched): (Vec<Entity>, Vec<Entity>) =
            repo.list_entities()?.into_iter().partition(|e| e.match_done);
        info!(
            "Entities already matched: {}; entities to match: {}",
            matched.len(),
            unmatched.len()
        );

        let mut classifier = MatchClassifier::new(self.config.fuzzy_match_threshold);

        while let Some(entity) = unmatched.pop() {
            match repo.get_entity(entity.id) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    debug!("Entity {} was absorbed earlier in this pass", entity.id);
                    report.skipped += 1;
                    continue;
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    error!("Failed to load entity {}: {}", entity.id, e);
                    report.failed += 1;
                    continue;
                }
            }

            let result = in_transaction(repo, |repo| {
                self.match_entity(repo, &mut classifier, &entity, &matched, &unmatched)
            });

            match result {
                Ok(outcome) => {
                    report.processed += 1;
                    report.auto_merges_applied += outcome.merges_applied;
                    report.auto_merges_rejected += outcome.merges_rejected;
                    report.suggestions_recorded += outcome.suggestions;
                }
                Err(e) if e.is_fatal() => {
                    error!("Aborting resolution pass {}: {}", report.run_id, e);
                    return Err(e);
                }
                Err(e) => {
                    error!("Rolled back entity {}: {}", entity.id, e);
                    report.failed += 1;
                }
            }
        }

        report.finished_at = Utc::now();
        info!(
            "Resolution pass {} complete: {} processed, {} skipped, {} failed, {} merged, {} suggested",
            report.run_id,
            report.processed,
            report.skipped,
            report.failed,
            report.auto_merges_applied,
            report.suggestions_recorded
        );
        Ok(report)
    }

    fn match_entity<R: Repository + ?Sized>(
        &self,
        repo: &mut R,
        classifier: &mut MatchClassifier,
        entity: &Entity,
        matched: &[Entity],
        unmatched: &[Entity],
    ) -> Result<EntityOutcome, ResolveError> {
        info!("Match entity id {}", entity.id);

        let mut autos = Vec::new();
        let mut suggestions = Vec::new();
        for other in matched.iter().chain(unmatched) {
            let classification = classifier.classify(entity, other);
            let Some(reason) = classification.reason else {
                continue;
            };
            let candidate = Candidate {
                other: other.id,
                reason,
            };
            match classification.kind {
                ClassificationKind::Auto => autos.push(candidate),
                ClassificationKind::Suggested => suggestions.push(candidate),
                ClassificationKind::None => {}
            }
        }
        debug!(
            "Entity {}: {} auto, {} suggested",
            entity.id,
            autos.len(),
            suggestions.len()
        );

        let mut outcome = EntityOutcome::default();

        for candidate in autos {
            match merge(repo, entity.id, candidate.other, &candidate.reason, self.config) {
                Ok(_) => outcome.merges_applied += 1,
                Err(e) if e.is_validation() => {
                    warn!("Skipping auto merge of {} and {}: {}", entity.id, candidate.other, e);
                    outcome.merges_rejected += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        for candidate in suggestions {
            if suggest_merge(repo, entity.id, candidate.other, &candidate.reason)? {
                outcome.suggestions += 1;
            }
        }

        if let Some(mut current) = repo.get_entity(entity.id)? {
            current.match_done = true;
            repo.update_entity(&current)?;
            debug!("Set match_done for entity id {}", entity.id);
        }

        Ok(outcome)
    }
}
