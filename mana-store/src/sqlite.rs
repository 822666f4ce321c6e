//! SQLite repository
//!
//! Entities keep their list-shaped fields as JSON text columns. Origins
//! store their type-specific payload as tagged JSON next to the shared base
//! columns. Units of work map onto `BEGIN IMMEDIATE` / `COMMIT`.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use mana_core::{
    Entity, EntityId, EntityStatus, Group, GroupId, Origin, OriginBase, OriginGroup, OriginId,
    OriginKind, VerificationState,
};

use crate::{Repository, StoreError, StoreResult};

const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS groups (
        id    INTEGER PRIMARY KEY,
        name  TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS entities (
        id                   INTEGER PRIMARY KEY,
        name                 TEXT NOT NULL,
        is_reference         INTEGER NOT NULL DEFAULT 0,
        verification_state   TEXT NOT NULL DEFAULT 'NOT_VERIFIED',
        status               TEXT NOT NULL DEFAULT 'ENTITY',
        trusted              INTEGER NOT NULL DEFAULT 0,
        merges               INTEGER NOT NULL DEFAULT 0,
        suggested_merges     TEXT,
        merges_details       TEXT NOT NULL DEFAULT '[]',
        comments             TEXT NOT NULL DEFAULT '[]',
        t_occurrences        INTEGER,
        t_source_references  TEXT,
        match_done           INTEGER NOT NULL DEFAULT 0,
        group_id             INTEGER,
        location             TEXT,
        ecoregion            TEXT,
        tags                 TEXT NOT NULL DEFAULT '[]',
        time_created         TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        time_updated         TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_entities_status ON entities(status);
    CREATE INDEX IF NOT EXISTS idx_entities_match_done ON entities(match_done);

    CREATE TABLE IF NOT EXISTS origins (
        id              INTEGER PRIMARY KEY,
        entity_id       INTEGER NOT NULL,
        type            TEXT NOT NULL,
        occurrences     INTEGER NOT NULL DEFAULT 0,
        last_synced_id  INTEGER,
        payload         TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_origins_entity ON origins(entity_id);

    CREATE TABLE IF NOT EXISTS origin_groups (
        id          INTEGER PRIMARY KEY,
        origin_id   INTEGER NOT NULL,
        group_id    INTEGER NOT NULL,
        entity_id   INTEGER NOT NULL,
        content_id  INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_origin_groups_origin ON origin_groups(origin_id);
    CREATE INDEX IF NOT EXISTS idx_origin_groups_entity ON origin_groups(entity_id);
";

const ENTITY_COLUMNS: &str = "id, name, is_reference, verification_state, status, trusted, merges,
     suggested_merges, merges_details, comments, t_occurrences, t_source_references,
     match_done, group_id, location, ecoregion, tags";

/// Raw entity columns, decoded outside the row closure so JSON failures
/// surface as `StoreError::Corrupt`
struct EntityRow {
    id: i64,
    name: String,
    is_reference: bool,
    verification_state: String,
    status: String,
    trusted: bool,
    merges: u32,
    suggested_merges: Option<String>,
    merges_details: String,
    comments: String,
    t_occurrences: Option<i64>,
    t_source_references: Option<String>,
    match_done: bool,
    group_id: Option<i64>,
    location: Option<String>,
    ecoregion: Option<String>,
    tags: String,
}

impl EntityRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            is_reference: row.get(2)?,
            verification_state: row.get(3)?,
            status: row.get(4)?,
            trusted: row.get(5)?,
            merges: row.get(6)?,
            suggested_merges: row.get(7)?,
            merges_details: row.get(8)?,
            comments: row.get(9)?,
            t_occurrences: row.get(10)?,
            t_source_references: row.get(11)?,
            match_done: row.get(12)?,
            group_id: row.get(13)?,
            location: row.get(14)?,
            ecoregion: row.get(15)?,
            tags: row.get(16)?,
        })
    }

    fn decode(self, origins: Vec<Origin>) -> StoreResult<Entity> {
        let status = EntityStatus::parse(&self.status).ok_or_else(|| {
            StoreError::corrupt(format!("entity {}: unknown status {}", self.id, self.status))
        })?;
        let verification_state =
            VerificationState::parse(&self.verification_state).ok_or_else(|| {
                StoreError::corrupt(format!(
                    "entity {}: unknown verification state {}",
                    self.id, self.verification_state
                ))
            })?;

        Ok(Entity {
            id: self.id,
            name: self.name,
            is_reference: self.is_reference,
            verification_state,
            status,
            trusted: self.trusted,
            merges: self.merges,
            suggested_merges: self
                .suggested_merges
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            merges_details: serde_json::from_str(&self.merges_details)?,
            comments: serde_json::from_str(&self.comments)?,
            t_occurrences: self.t_occurrences.map(|v| v.max(0) as u64),
            t_source_references: self
                .t_source_references
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            match_done: self.match_done,
            group_id: self.group_id,
            location: self.location,
            ecoregion: self.ecoregion,
            tags: serde_json::from_str(&self.tags)?,
            origins,
        })
    }
}

struct OriginRow {
    id: i64,
    entity_id: i64,
    occurrences: u32,
    last_synced_id: Option<i64>,
    payload: String,
}

impl OriginRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            entity_id: row.get(1)?,
            occurrences: row.get(2)?,
            last_synced_id: row.get(3)?,
            payload: row.get(4)?,
        })
    }

    fn decode(self) -> StoreResult<Origin> {
        let kind: OriginKind = serde_json::from_str(&self.payload).map_err(|e| {
            StoreError::corrupt(format!("origin {}: {}", self.id, e))
        })?;
        Ok(Origin {
            base: OriginBase {
                id: self.id,
                entity_id: self.entity_id,
                occurrences: self.occurrences,
                last_synced_id: self.last_synced_id,
            },
            kind,
        })
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> StoreResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Repository backed by a SQLite database
pub struct SqliteRepository {
    conn: Connection,
    in_transaction: bool,
}

impl SqliteRepository {
    /// Open (or create) a database file
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        info!("Opened SQLite store at {}", path.display());
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        let repo = Self {
            conn,
            in_transaction: false,
        };
        repo.migrate()?;
        Ok(repo)
    }

    fn migrate(&self) -> StoreResult<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version >= SCHEMA_VERSION {
            return Ok(());
        }
        self.conn.execute_batch(SCHEMA)?;
        self.conn
            .pragma_update(None, "user_version", SCHEMA_VERSION)?;
        debug!("Migrated schema from v{} to v{}", version, SCHEMA_VERSION);
        Ok(())
    }

    fn origins_of(&self, entity_id: EntityId) -> StoreResult<Vec<Origin>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, entity_id, occurrences, last_synced_id, payload
             FROM origins WHERE entity_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![entity_id], OriginRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(OriginRow::decode).collect()
    }

    fn write_origin(&self, origin: &Origin) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO origins (id, entity_id, type, occurrences, last_synced_id, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                origin.base.id,
                origin.base.entity_id,
                origin.origin_type().as_str(),
                origin.base.occurrences,
                origin.base.last_synced_id,
                to_json(&origin.kind)?,
            ],
        )?;
        Ok(())
    }

    fn entity_exists(&self, id: EntityId) -> StoreResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT id FROM entities WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }
}

impl Repository for SqliteRepository {
    fn get_entity(&self, id: EntityId) -> StoreResult<Option<Entity>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM entities WHERE id = ?1", ENTITY_COLUMNS),
                params![id],
                EntityRow::from_row,
            )
            .optional()?;

        match row {
            Some(row) => {
                let origins = self.origins_of(row.id)?;
                Ok(Some(row.decode(origins)?))
            }
            None => Ok(None),
        }
    }

    fn list_entities(&self) -> StoreResult<Vec<Entity>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM entities ORDER BY id", ENTITY_COLUMNS))?;
        let rows = stmt
            .query_map([], EntityRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|row| {
                let origins = self.origins_of(row.id)?;
                row.decode(origins)
            })
            .collect()
    }

    fn list_origin_groups(&self, origin_id: OriginId) -> StoreResult<Vec<OriginGroup>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, origin_id, group_id, entity_id, content_id
             FROM origin_groups WHERE origin_id = ?1 ORDER BY id",
        )?;
        let edges = stmt
            .query_map(params![origin_id], |row| {
                Ok(OriginGroup {
                    id: row.get(0)?,
                    origin_id: row.get(1)?,
                    group_id: row.get(2)?,
                    entity_id: row.get(3)?,
                    content_id: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    fn get_group(&self, id: GroupId) -> StoreResult<Option<Group>> {
        let group = self
            .conn
            .query_row(
                "SELECT id, name FROM groups WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Group {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(group)
    }

    fn insert_entity(&mut self, entity: &Entity) -> StoreResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO entities ({}) VALUES
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                ENTITY_COLUMNS
            ),
            params![
                entity.id,
                entity.name,
                entity.is_reference,
                entity.verification_state.as_str(),
                entity.status.as_str(),
                entity.trusted,
                entity.merges,
                entity.suggested_merges.as_ref().map(to_json).transpose()?,
                to_json(&entity.merges_details)?,
                to_json(&entity.comments)?,
                entity.t_occurrences.map(|v| i64::try_from(v).unwrap_or(i64::MAX)),
                entity.t_source_references.as_ref().map(to_json).transpose()?,
                entity.match_done,
                entity.group_id,
                entity.location,
                entity.ecoregion,
                to_json(&entity.tags)?,
            ],
        )?;

        for origin in &entity.origins {
            let mut owned = origin.clone();
            owned.base.entity_id = entity.id;
            self.write_origin(&owned)?;
        }
        Ok(())
    }

    fn update_entity(&mut self, entity: &Entity) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE entities SET
                name = ?2, is_reference = ?3, verification_state = ?4, status = ?5,
                trusted = ?6, merges = ?7, suggested_merges = ?8, merges_details = ?9,
                comments = ?10, t_occurrences = ?11, t_source_references = ?12,
                match_done = ?13, group_id = ?14, location = ?15, ecoregion = ?16,
                tags = ?17, time_updated = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE id = ?1",
            params![
                entity.id,
                entity.name,
                entity.is_reference,
                entity.verification_state.as_str(),
                entity.status.as_str(),
                entity.trusted,
                entity.merges,
                entity.suggested_merges.as_ref().map(to_json).transpose()?,
                to_json(&entity.merges_details)?,
                to_json(&entity.comments)?,
                entity.t_occurrences.map(|v| i64::try_from(v).unwrap_or(i64::MAX)),
                entity.t_source_references.as_ref().map(to_json).transpose()?,
                entity.match_done,
                entity.group_id,
                entity.location,
                entity.ecoregion,
                to_json(&entity.tags)?,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: "entity",
                id: entity.id,
            });
        }
        Ok(())
    }

    fn delete_entity(&mut self, id: EntityId) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM origin_groups
             WHERE origin_id IN (SELECT id FROM origins WHERE entity_id = ?1)",
            params![id],
        )?;
        self.conn
            .execute("DELETE FROM origins WHERE entity_id = ?1", params![id])?;
        let changed = self
            .conn
            .execute("DELETE FROM entities WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound { kind: "entity", id });
        }
        Ok(())
    }

    fn insert_origin(&mut self, origin: &Origin) -> StoreResult<()> {
        if !self.entity_exists(origin.base.entity_id)? {
            return Err(StoreError::NotFound {
                kind: "entity",
                id: origin.base.entity_id,
            });
        }
        self.write_origin(origin)
    }

    fn reassign_origin(&mut self, origin_id: OriginId, entity_id: EntityId) -> StoreResult<()> {
        if !self.entity_exists(entity_id)? {
            return Err(StoreError::NotFound {
                kind: "entity",
                id: entity_id,
            });
        }
        let changed = self.conn.execute(
            "UPDATE origins SET entity_id = ?2 WHERE id = ?1",
            params![origin_id, entity_id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: "origin",
                id: origin_id,
            });
        }
        Ok(())
    }

    fn reassign_contributor(&mut self, from: EntityId, to: EntityId) -> StoreResult<usize> {
        Ok(self.conn.execute(
            "UPDATE origin_groups SET entity_id = ?2 WHERE entity_id = ?1",
            params![from, to],
        )?)
    }

    fn insert_group(&mut self, group: &Group) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO groups (id, name) VALUES (?1, ?2)",
            params![group.id, group.name],
        )?;
        Ok(())
    }

    fn insert_origin_group(&mut self, edge: &OriginGroup) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO origin_groups (id, origin_id, group_id, entity_id, content_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                edge.id,
                edge.origin_id,
                edge.group_id,
                edge.entity_id,
                edge.content_id
            ],
        )?;
        Ok(())
    }

    fn begin(&mut self) -> StoreResult<()> {
        if self.in_transaction {
            return Err(StoreError::Transaction {
                message: "transaction already in progress".to_string(),
            });
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        if !self.in_transaction {
            return Err(StoreError::Transaction {
                message: "no transaction to commit".to_string(),
            });
        }
        self.conn.execute_batch("COMMIT")?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        if !self.in_transaction {
            return Err(StoreError::Transaction {
                message: "no transaction to roll back".to_string(),
            });
        }
        self.in_transaction = false;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}
