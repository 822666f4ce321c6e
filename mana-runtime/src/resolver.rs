//! Resolver facade
//!
//! Owns a repository and the configuration snapshot passes run with.
//! Every operation is one unit of work except the passes, which manage
//! their own.

use tracing::info;

use mana_core::{ConfigSource, Entity, EntityId, ResolutionConfig};
use mana_engine::{enrich, merge, suggest_merge, MergeError, MergeSummary};
use mana_store::{in_transaction, Repository, StoreError};

use crate::{PromotionReport, ResolutionDriver, ResolutionReport, ResolveError, TrustPromotionPass};

pub struct Resolver<R: Repository> {
    repo: R,
    source: ConfigSource,
    config: ResolutionConfig,
}

impl<R: Repository> Resolver<R> {
    /// Load configuration from `source` and wrap `repo`
    pub fn new(repo: R, source: ConfigSource) -> Result<Self, ResolveError> {
        let config = source.load()?;
        Ok(Self {
            repo,
            source,
            config,
        })
    }

    /// Use a fixed configuration; `refresh_config` reloads from defaults
    /// and the environment
    pub fn with_config(repo: R, config: ResolutionConfig) -> Self {
        Self {
            repo,
            source: ConfigSource::default(),
            config,
        }
    }

    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn repo_mut(&mut self) -> &mut R {
        &mut self.repo
    }

    pub fn into_inner(self) -> R {
        self.repo
    }

    /// Re-read configuration between passes
    pub fn refresh_config(&mut self) -> Result<&ResolutionConfig, ResolveError> {
        let config = self.source.load()?;
        if config != self.config {
            info!("Configuration changed: {:?}", config);
        }
        self.config = config;
        Ok(&self.config)
    }

    /// Merge two entities in one unit of work
    pub fn merge_entities(
        &mut self,
        id1: EntityId,
        id2: EntityId,
        reason: &str,
    ) -> Result<MergeSummary, ResolveError> {
        let config = &self.config;
        let summary = in_transaction(&mut self.repo, |repo| -> Result<_, MergeError> {
            merge(repo, id1, id2, reason, config)
        })?;
        Ok(summary)
    }

    /// Record a suggestion on both entities. Returns true if either changed.
    pub fn suggest_merge(
        &mut self,
        id1: EntityId,
        id2: EntityId,
        reason: &str,
    ) -> Result<bool, ResolveError> {
        let changed = in_transaction(&mut self.repo, |repo| suggest_merge(repo, id1, id2, reason))?;
        Ok(changed)
    }

    /// Recompute one entity's occurrence and reference summaries
    pub fn enrich(&mut self, entity_id: EntityId) -> Result<Entity, ResolveError> {
        let entity = in_transaction(&mut self.repo, |repo| {
            let mut entity = repo.get_entity(entity_id)?.ok_or(StoreError::NotFound {
                kind: "entity",
                id: entity_id,
            })?;
            enrich(&*repo, &mut entity)?;
            repo.update_entity(&entity)?;
            Ok::<_, StoreError>(entity)
        })?;
        Ok(entity)
    }

    pub fn run_resolution_pass(&mut self) -> Result<ResolutionReport, ResolveError> {
        ResolutionDriver::new(&self.config).run(&mut self.repo)
    }

    pub fn run_trust_promotion_pass(&mut self) -> Result<PromotionReport, ResolveError> {
        TrustPromotionPass::new(&self.config).run(&mut self.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mana_core::{EntityStatus, Group, Origin, OriginGroup};
    use mana_store::{MemoryRepository, SqliteRepository};
    use std::path::PathBuf;

    fn twitter_entity(id: EntityId, screen_name: &str, occurrences: u32) -> Entity {
        Entity::new(id, screen_name)
            .with_origin(Origin::twitter(id * 10, id, screen_name).with_occurrences(occurrences))
    }

    #[test]
    fn test_merge_entities_commits() {
        let mut repo = SqliteRepository::open_in_memory().unwrap();
        repo.insert_entity(&twitter_entity(1, "acme", 1)).unwrap();
        repo.insert_entity(&twitter_entity(2, "acme_org", 1).reference()).unwrap();

        let mut resolver = Resolver::with_config(repo, ResolutionConfig::default());
        let summary = resolver.merge_entities(1, 2, "checked by hand").unwrap();

        assert_eq!(summary.kept, 2);
        assert!(resolver.repo().get_entity(1).unwrap().is_none());
        let kept = resolver.repo().get_entity(2).unwrap().unwrap();
        assert_eq!(kept.origins.len(), 2);
        assert_eq!(kept.merges, 1);
    }

    #[test]
    fn test_rejected_merge_changes_nothing() {
        let mut repo = MemoryRepository::new();
        repo.insert_entity(&twitter_entity(1, "acme", 1).reference()).unwrap();
        repo.insert_entity(&twitter_entity(2, "acme", 1).reference()).unwrap();
        let mut resolver = Resolver::with_config(repo, ResolutionConfig::default());

        let err = resolver.merge_entities(1, 2, "r").unwrap_err();
        assert!(matches!(err, ResolveError::Merge(MergeError::BothReference { .. })));
        assert!(!err.is_fatal());

        let err = resolver.merge_entities(1, 1, "r").unwrap_err();
        assert!(matches!(err, ResolveError::Merge(MergeError::Identical { .. })));

        assert_eq!(resolver.repo().entity_count(), 2);
        assert!(!resolver.repo().in_transaction());
    }

    #[test]
    fn test_enrich_single_entity() {
        let mut repo = MemoryRepository::new();
        repo.insert_group(&Group::new(1, "Amazon Watch")).unwrap();
        repo.insert_entity(&Entity::new(100, "Reporter")).unwrap();
        repo.insert_entity(&twitter_entity(1, "acme", 5)).unwrap();
        repo.insert_origin_group(&OriginGroup {
            id: 1,
            origin_id: 10,
            group_id: 1,
            entity_id: 100,
            content_id: 77,
        })
        .unwrap();
        let mut resolver = Resolver::with_config(repo, ResolutionConfig::default());

        let entity = resolver.enrich(1).unwrap();
        assert_eq!(entity.t_occurrences, Some(5));
        let stored = resolver.repo().get_entity(1).unwrap().unwrap();
        assert_eq!(stored.t_source_references.unwrap()["Reporter"].group, "Amazon Watch");

        let err = resolver.enrich(99).unwrap_err();
        assert!(matches!(err, ResolveError::Store(StoreError::NotFound { id: 99, .. })));
    }

    #[test]
    fn test_suggest_merge_via_facade() {
        let mut repo = MemoryRepository::new();
        repo.insert_entity(&twitter_entity(1, "acme", 1)).unwrap();
        repo.insert_entity(&twitter_entity(2, "wwf", 1)).unwrap();
        let mut resolver = Resolver::with_config(repo, ResolutionConfig::default());

        assert!(resolver.suggest_merge(1, 2, "same logo").unwrap());
        assert!(!resolver.suggest_merge(1, 2, "same logo").unwrap());
        assert!(resolver.repo().get_entity(2).unwrap().unwrap().has_suggestion_for(1));
    }

    #[test]
    fn test_passes_end_to_end() {
        let mut repo = MemoryRepository::new();
        repo.insert_entity(&twitter_entity(1, "acme", 2)).unwrap();
        repo.insert_entity(&twitter_entity(2, "acme", 2)).unwrap();
        repo.insert_entity(&twitter_entity(3, "wwf", 1)).unwrap();
        let mut resolver = Resolver::with_config(repo, ResolutionConfig::default());

        let resolution = resolver.run_resolution_pass().unwrap();
        assert_eq!(resolution.auto_merges_applied, 1);
        assert!(resolution.finished_at >= resolution.started_at);

        let promotion = resolver.run_trust_promotion_pass().unwrap();
        assert_eq!(promotion.candidates_flagged, 1);

        let repo = resolver.into_inner();
        let survivor = repo.get_entity(2).unwrap().unwrap();
        assert_eq!(survivor.status, EntityStatus::SourceCandidate);
        assert_eq!(survivor.t_occurrences, Some(4));
    }

    #[test]
    fn test_refresh_config_rereads_file() {
        let path: PathBuf = std::env::temp_dir().join(format!("mana-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "source_candidate_threshold = 5\n").unwrap();

        let mut resolver =
            Resolver::new(MemoryRepository::new(), ConfigSource::new(Some(path.clone()))).unwrap();
        assert_eq!(resolver.config().source_candidate_threshold, 5);

        std::fs::write(&path, "source_candidate_threshold = 7\n").unwrap();
        assert_eq!(resolver.config().source_candidate_threshold, 5);
        assert_eq!(resolver.refresh_config().unwrap().source_candidate_threshold, 7);

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(resolver.refresh_config(), Err(ResolveError::Config(_))));
        assert_eq!(resolver.config().source_candidate_threshold, 7);
    }
}
