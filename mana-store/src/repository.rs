//! The repository port
//!
//! Engines receive a `&mut R where R: Repository` for the duration of one
//! call and keep no handle afterwards. Entities are always returned with the
//! origins they own.

use mana_core::{Entity, EntityId, Group, GroupId, Origin, OriginGroup, OriginId};

use crate::StoreResult;

/// Transactional access to entities, origins and provenance
pub trait Repository {
    /// Fetch one entity with its origins
    fn get_entity(&self, id: EntityId) -> StoreResult<Option<Entity>>;

    /// Fetch every entity with its origins, ordered by id
    fn list_entities(&self) -> StoreResult<Vec<Entity>>;

    /// Provenance edges that reference an origin
    fn list_origin_groups(&self, origin_id: OriginId) -> StoreResult<Vec<OriginGroup>>;

    fn get_group(&self, id: GroupId) -> StoreResult<Option<Group>>;

    /// Insert an entity together with the origins it carries
    fn insert_entity(&mut self, entity: &Entity) -> StoreResult<()>;

    /// Persist an entity's own fields; its origins are left untouched
    fn update_entity(&mut self, entity: &Entity) -> StoreResult<()>;

    /// Delete an entity and any origins it still owns
    fn delete_entity(&mut self, id: EntityId) -> StoreResult<()>;

    fn insert_origin(&mut self, origin: &Origin) -> StoreResult<()>;

    /// Move an origin to another owner
    fn reassign_origin(&mut self, origin_id: OriginId, entity_id: EntityId) -> StoreResult<()>;

    /// Re-point provenance edges contributed by `from` at `to`.
    /// Returns the number of edges changed.
    fn reassign_contributor(&mut self, from: EntityId, to: EntityId) -> StoreResult<usize>;

    fn insert_group(&mut self, group: &Group) -> StoreResult<()>;

    fn insert_origin_group(&mut self, edge: &OriginGroup) -> StoreResult<()>;

    /// Start a unit of work
    fn begin(&mut self) -> StoreResult<()>;

    /// Make the current unit of work durable
    fn commit(&mut self) -> StoreResult<()>;

    /// Discard the current unit of work
    fn rollback(&mut self) -> StoreResult<()>;
}

/// Run `work` inside one unit of work, committing on success and rolling
/// back on any error. A failed commit is rolled back too, so the repository
/// never stays inside a unit of work after this returns.
pub fn in_transaction<R, T, E, F>(repo: &mut R, work: F) -> Result<T, E>
where
    R: Repository + ?Sized,
    E: From<crate::StoreError>,
    F: FnOnce(&mut R) -> Result<T, E>,
{
    repo.begin()?;
    match work(repo) {
        Ok(value) => match repo.commit() {
            Ok(()) => Ok(value),
            Err(commit_err) => {
                rollback_quietly(repo);
                Err(commit_err.into())
            }
        },
        Err(err) => {
            rollback_quietly(repo);
            Err(err)
        }
    }
}

fn rollback_quietly<R: Repository + ?Sized>(repo: &mut R) {
    if let Err(rollback_err) = repo.rollback() {
        tracing::error!("Rollback failed: {}", rollback_err);
    }
}
