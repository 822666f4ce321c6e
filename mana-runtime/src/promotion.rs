//! Trust Promotion Pass
//!
//! Periodic sweep that re-applies the promotion rules to the whole store:
//! 1. ENTITY → SOURCE_CANDIDATE
//! 2. not trusted → trusted
//! 3. enrich every SOURCE_CANDIDATE
//!
//! Each step commits on its own.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use mana_core::{EntityStatus, ResolutionConfig};
use mana_engine::{enrich, flag_source_candidate, flag_trusted_candidate};
use mana_store::{in_transaction, Repository, StoreError};

use crate::ResolveError;

/// Counters for one promotion pass
#[derive(Debug, Clone, Serialize)]
pub struct PromotionReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub candidates_flagged: usize,
    pub trusted_flagged: usize,
    pub enriched: usize,
}

pub struct TrustPromotionPass<'a> {
    config: &'a ResolutionConfig,
}

impl<'a> TrustPromotionPass<'a> {
    pub fn new(config: &'a ResolutionConfig) -> Self {
        Self { config }
    }

    pub fn run<R: Repository + ?Sized>(&self, repo: &mut R) -> Result<PromotionReport, ResolveError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("Starting trust promotion pass {}", run_id);

        let candidates_flagged = in_transaction(repo, |repo| self.flag_candidates(repo))?;
        info!("Step 1 of 3: {} source candidates flagged", candidates_flagged);

        let trusted_flagged = in_transaction(repo, |repo| self.flag_trusted(repo))?;
        info!("Step 2 of 3: {} entities flagged trusted", trusted_flagged);

        let enriched = in_transaction(repo, |repo| self.enrich_candidates(repo))?;
        info!("Step 3 of 3: {} source candidates enriched", enriched);

        Ok(PromotionReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            candidates_flagged,
            trusted_flagged,
            enriched,
        })
    }

    fn flag_candidates<R: Repository + ?Sized>(&self, repo: &mut R) -> Result<usize, StoreError> {
        let mut flagged = 0;
        for mut entity in repo.list_entities()? {
            if entity.status != EntityStatus::Entity {
                continue;
            }
            if flag_source_candidate(&mut entity, self.config.source_candidate_threshold) {
                repo.update_entity(&entity)?;
                flagged += 1;
            }
        }
        Ok(flagged)
    }

    fn flag_trusted<R: Repository + ?Sized>(&self, repo: &mut R) -> Result<usize, StoreError> {
        let mut flagged = 0;
        for mut entity in repo.list_entities()? {
            if entity.trusted {
                continue;
            }
            let changed = flag_trusted_candidate(
                &*repo,
                &mut entity,
                self.config.trusted_source_groups_threshold,
                self.config.trusted_source_occurrences_threshold,
            )?;
            if changed {
                repo.update_entity(&entity)?;
                flagged += 1;
            }
        }
        Ok(flagged)
    }

    fn enrich_candidates<R: Repository + ?Sized>(&self, repo: &mut R) -> Result<usize, StoreError> {
        let mut enriched = 0;
        for mut entity in repo.list_entities()? {
            if entity.status != EntityStatus::SourceCandidate {
                continue;
            }
            enrich(&*repo, &mut entity)?;
            repo.update_entity(&entity)?;
            debug!("Enriched {} (id={})", entity.name, entity.id);
            enriched += 1;
        }
        Ok(enriched)
    }
}
