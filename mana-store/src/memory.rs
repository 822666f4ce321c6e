//! In-memory repository
//!
//! Keeps the whole store in ordered maps. `begin` snapshots the state and
//! `rollback` restores it, so units of work behave like the SQLite adapter.

use std::collections::BTreeMap;

use mana_core::{Entity, EntityId, Group, GroupId, Origin, OriginGroup, OriginId};

use crate::{Repository, StoreError, StoreResult};

#[derive(Debug, Clone, Default)]
struct State {
    /// Entities stored without their origins
    entities: BTreeMap<EntityId, Entity>,
    origins: BTreeMap<OriginId, Origin>,
    groups: BTreeMap<GroupId, Group>,
    origin_groups: BTreeMap<i64, OriginGroup>,
}

/// Repository backed by process memory
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: State,
    snapshot: Option<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a unit of work is open
    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn entity_count(&self) -> usize {
        self.state.entities.len()
    }

    fn assemble(&self, stored: &Entity) -> Entity {
        let mut entity = stored.clone();
        entity.origins = self
            .state
            .origins
            .values()
            .filter(|o| o.base.entity_id == stored.id)
            .cloned()
            .collect();
        entity
    }
}

impl Repository for MemoryRepository {
    fn get_entity(&self, id: EntityId) -> StoreResult<Option<Entity>> {
        Ok(self.state.entities.get(&id).map(|e| self.assemble(e)))
    }

    fn list_entities(&self) -> StoreResult<Vec<Entity>> {
        Ok(self
            .state
            .entities
            .values()
            .map(|e| self.assemble(e))
            .collect())
    }

    fn list_origin_groups(&self, origin_id: OriginId) -> StoreResult<Vec<OriginGroup>> {
        Ok(self
            .state
            .origin_groups
            .values()
            .filter(|edge| edge.origin_id == origin_id)
            .cloned()
            .collect())
    }

    fn get_group(&self, id: GroupId) -> StoreResult<Option<Group>> {
        Ok(self.state.groups.get(&id).cloned())
    }

    fn insert_entity(&mut self, entity: &Entity) -> StoreResult<()> {
        if self.state.entities.contains_key(&entity.id) {
            return Err(StoreError::Constraint {
                message: format!("entity {} already exists", entity.id),
            });
        }
        for origin in &entity.origins {
            if self.state.origins.contains_key(&origin.id()) {
                return Err(StoreError::Constraint {
                    message: format!("origin {} already exists", origin.id()),
                });
            }
        }

        let mut stored = entity.clone();
        for mut origin in std::mem::take(&mut stored.origins) {
            origin.base.entity_id = entity.id;
            self.state.origins.insert(origin.id(), origin);
        }
        self.state.entities.insert(entity.id, stored);
        Ok(())
    }

    fn update_entity(&mut self, entity: &Entity) -> StoreResult<()> {
        let stored = self
            .state
            .entities
            .get_mut(&entity.id)
            .ok_or(StoreError::NotFound {
                kind: "entity",
                id: entity.id,
            })?;
        *stored = Entity {
            origins: Vec::new(),
            ..entity.clone()
        };
        Ok(())
    }

    fn delete_entity(&mut self, id: EntityId) -> StoreResult<()> {
        if self.state.entities.remove(&id).is_none() {
            return Err(StoreError::NotFound { kind: "entity", id });
        }

        let owned: Vec<OriginId> = self
            .state
            .origins
            .values()
            .filter(|o| o.base.entity_id == id)
            .map(|o| o.id())
            .collect();
        for origin_id in owned {
            self.state.origins.remove(&origin_id);
            self.state
                .origin_groups
                .retain(|_, edge| edge.origin_id != origin_id);
        }
        Ok(())
    }

    fn insert_origin(&mut self, origin: &Origin) -> StoreResult<()> {
        if !self.state.entities.contains_key(&origin.base.entity_id) {
            return Err(StoreError::NotFound {
                kind: "entity",
                id: origin.base.entity_id,
            });
        }
        if self.state.origins.contains_key(&origin.id()) {
            return Err(StoreError::Constraint {
                message: format!("origin {} already exists", origin.id()),
            });
        }
        self.state.origins.insert(origin.id(), origin.clone());
        Ok(())
    }

    fn reassign_origin(&mut self, origin_id: OriginId, entity_id: EntityId) -> StoreResult<()> {
        if !self.state.entities.contains_key(&entity_id) {
            return Err(StoreError::NotFound {
                kind: "entity",
                id: entity_id,
            });
        }
        let origin = self
            .state
            .origins
            .get_mut(&origin_id)
            .ok_or(StoreError::NotFound {
                kind: "origin",
                id: origin_id,
            })?;
        origin.base.entity_id = entity_id;
        Ok(())
    }

    fn reassign_contributor(&mut self, from: EntityId, to: EntityId) -> StoreResult<usize> {
        let mut changed = 0;
        for edge in self.state.origin_groups.values_mut() {
            if edge.entity_id == from {
                edge.entity_id = to;
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn insert_group(&mut self, group: &Group) -> StoreResult<()> {
        if self.state.groups.contains_key(&group.id) {
            return Err(StoreError::Constraint {
                message: format!("group {} already exists", group.id),
            });
        }
        self.state.groups.insert(group.id, group.clone());
        Ok(())
    }

    fn insert_origin_group(&mut self, edge: &OriginGroup) -> StoreResult<()> {
        if self.state.origin_groups.contains_key(&edge.id) {
            return Err(StoreError::Constraint {
                message: format!("origin group {} already exists", edge.id),
            });
        }
        self.state.origin_groups.insert(edge.id, edge.clone());
        Ok(())
    }

    fn begin(&mut self) -> StoreResult<()> {
        if self.snapshot.is_some() {
            return Err(StoreError::Transaction {
                message: "transaction already in progress".to_string(),
            });
        }
        self.snapshot = Some(self.state.clone());
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        match self.snapshot.take() {
            Some(_) => Ok(()),
            None => Err(StoreError::Transaction {
                message: "no transaction to commit".to_string(),
            }),
        }
    }

    fn rollback(&mut self) -> StoreResult<()> {
        match self.snapshot.take() {
            Some(snapshot) => {
                self.state = snapshot;
                Ok(())
            }
            None => Err(StoreError::Transaction {
                message: "no transaction to roll back".to_string(),
            }),
        }
    }
}
