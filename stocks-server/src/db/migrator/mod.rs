//! Schema migration engine
//!
//! Applied units are recorded in `stock_migrations` together with the id of
//! the group that applied them. One `migrate` call applies every pending unit
//! as a new group inside a single transaction; `rollback` reverts the newest
//! group the same way. Both take an advisory lock for the duration of the
//! transaction.

pub mod unit;

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use crate::error::{Error, Result};
pub use unit::{GeneratedUnit, MigrationUnit};

/// Bookkeeping table for applied units
pub const MIGRATIONS_TABLE: &str = "stock_migrations";

/// Advisory lock key held while a group is applied or reverted ("STOCKS")
const MIGRATION_LOCK_KEY: i64 = 0x5354_4f43_4b53;

/// Where the schema currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// No bookkeeping table
    Uninitialized,
    /// Bookkeeping table present, nothing applied
    Initialized,
    /// Last applied group id
    AtGroup(i64),
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initialized => write!(f, "initialized (no migrations applied)"),
            Self::AtGroup(id) => write!(f, "at group {}", id),
        }
    }
}

/// Units applied or reverted by one `migrate` / `rollback` call.
///
/// A zero id with no units is the reported no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationGroup {
    pub id: i64,
    pub units: Vec<String>,
}

impl MigrationGroup {
    fn empty() -> Self {
        Self {
            id: 0,
            units: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// A row of the bookkeeping table
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AppliedUnit {
    pub name: String,
    pub group_id: i64,
    pub migrated_at: DateTime<Utc>,
}

/// Report produced by `status`
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub state: MigrationState,
    pub applied: Vec<AppliedUnit>,
    pub pending: Vec<String>,
}

/// Create a new up/down pair in `dir` stamped with the current time.
pub async fn generate(dir: &Path, name: &str) -> Result<GeneratedUnit> {
    unit::generate(dir, name, Utc::now()).await
}

/// Migration engine bound to a pool and a units directory
pub struct Migrator {
    pool: PgPool,
    dir: PathBuf,
}

impl Migrator {
    pub fn new(pool: PgPool, dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            dir: dir.into(),
        }
    }

    /// Create the bookkeeping table. Safe to call repeatedly.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                group_id BIGINT NOT NULL,
                migrated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            MIGRATIONS_TABLE
        ))
        .execute(&self.pool)
        .await?;

        tracing::info!(table = MIGRATIONS_TABLE, "migration bookkeeping initialised");
        Ok(())
    }

    /// Write a new unit to the units directory; never touches the database.
    pub async fn generate(&self, name: &str) -> Result<GeneratedUnit> {
        generate(&self.dir, name).await
    }

    pub async fn state(&self) -> Result<MigrationState> {
        if !self.is_initialized().await? {
            return Ok(MigrationState::Uninitialized);
        }

        let (last,): (Option<i64>,) =
            sqlx::query_as(&format!("SELECT MAX(group_id) FROM {}", MIGRATIONS_TABLE))
                .fetch_one(&self.pool)
                .await?;

        Ok(match last {
            Some(id) => MigrationState::AtGroup(id),
            None => MigrationState::Initialized,
        })
    }

    /// Apply every pending unit, ascending, as one new group.
    pub async fn migrate(&self) -> Result<MigrationGroup> {
        self.require_initialized().await?;

        let units = unit::discover(&self.dir).await?;

        let mut tx = self.locked_transaction().await?;
        let applied = applied_names(&mut tx).await?;

        let pending: Vec<&MigrationUnit> = units
            .iter()
            .filter(|u| !applied.contains(&u.name))
            .collect();

        if pending.is_empty() {
            tx.commit().await?;
            tracing::info!("No new migrations to run");
            return Ok(MigrationGroup::empty());
        }

        let scripts: Vec<(String, &str)> = pending
            .iter()
            .map(|u| (u.name.clone(), u.up_sql()))
            .collect();

        let (last,): (Option<i64>,) =
            sqlx::query_as(&format!("SELECT MAX(group_id) FROM {}", MIGRATIONS_TABLE))
                .fetch_one(&mut *tx)
                .await?;
        let group_id = last.unwrap_or(0) + 1;

        for (name, sql) in &scripts {
            tracing::info!(unit = %name, group = group_id, "applying migration");
            if let Err(e) = sqlx::raw_sql(sql).execute(&mut *tx).await {
                tracing::error!(unit = %name, error = %e, "migration failed, rolling back group");
                return Err(e.into());
            }

            sqlx::query(&format!(
                "INSERT INTO {} (name, group_id) VALUES ($1, $2)",
                MIGRATIONS_TABLE
            ))
            .bind(name)
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let group = MigrationGroup {
            id: group_id,
            units: scripts.into_iter().map(|(name, _)| name).collect(),
        };
        tracing::info!(group = group.id, units = group.units.len(), "migrated");
        Ok(group)
    }

    /// Revert every unit of the newest group, descending.
    pub async fn rollback(&self) -> Result<MigrationGroup> {
        self.require_initialized().await?;

        let units = unit::discover(&self.dir).await?;

        let mut tx = self.locked_transaction().await?;

        let (last,): (Option<i64>,) =
            sqlx::query_as(&format!("SELECT MAX(group_id) FROM {}", MIGRATIONS_TABLE))
                .fetch_one(&mut *tx)
                .await?;

        let Some(group_id) = last else {
            tx.commit().await?;
            tracing::info!("Nothing to rollback");
            return Ok(MigrationGroup::empty());
        };

        let names: Vec<(String,)> = sqlx::query_as(&format!(
            "SELECT name FROM {} WHERE group_id = $1 ORDER BY name DESC",
            MIGRATIONS_TABLE
        ))
        .bind(group_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut scripts = Vec::with_capacity(names.len());
        for (name,) in names {
            let unit = units.iter().find(|u| u.name == name).ok_or_else(|| {
                Error::migration(format!(
                    "unit '{}' is recorded as applied but missing from {}",
                    name,
                    self.dir.display()
                ))
            })?;
            scripts.push((name, unit.down_sql()?.to_owned()));
        }

        for (name, sql) in &scripts {
            tracing::info!(unit = %name, group = group_id, "reverting migration");
            if let Err(e) = sqlx::raw_sql(sql).execute(&mut *tx).await {
                tracing::error!(unit = %name, error = %e, "rollback failed, group left applied");
                return Err(e.into());
            }
        }

        sqlx::query(&format!("DELETE FROM {} WHERE group_id = $1", MIGRATIONS_TABLE))
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let group = MigrationGroup {
            id: group_id,
            units: scripts.into_iter().map(|(name, _)| name).collect(),
        };
        tracing::info!(group = group.id, units = group.units.len(), "rolled back");
        Ok(group)
    }

    /// Current state plus applied and pending units.
    pub async fn status(&self) -> Result<MigrationStatus> {
        let units = unit::discover(&self.dir).await?;
        let state = self.state().await?;

        let applied: Vec<AppliedUnit> = if state == MigrationState::Uninitialized {
            Vec::new()
        } else {
            sqlx::query_as(&format!(
                "SELECT name, group_id, migrated_at FROM {} ORDER BY group_id, name",
                MIGRATIONS_TABLE
            ))
            .fetch_all(&self.pool)
            .await?
        };

        let applied_set: HashSet<&str> = applied.iter().map(|a| a.name.as_str()).collect();
        let pending = units
            .into_iter()
            .filter(|u| !applied_set.contains(u.name.as_str()))
            .map(|u| u.name)
            .collect();

        Ok(MigrationStatus {
            state,
            applied,
            pending,
        })
    }

    async fn is_initialized(&self) -> Result<bool> {
        let (present,): (bool,) = sqlx::query_as("SELECT to_regclass($1) IS NOT NULL")
            .bind(MIGRATIONS_TABLE)
            .fetch_one(&self.pool)
            .await?;
        Ok(present)
    }

    async fn require_initialized(&self) -> Result<()> {
        if self.is_initialized().await? {
            Ok(())
        } else {
            Err(Error::migration(format!(
                "table '{}' does not exist, run `init` first",
                MIGRATIONS_TABLE
            )))
        }
    }

    async fn locked_transaction(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

async fn applied_names(tx: &mut Transaction<'static, Postgres>) -> Result<HashSet<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(&format!("SELECT name FROM {}", MIGRATIONS_TABLE))
        .fetch_all(&mut **tx)
        .await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::isolated_schema_pool;

    // Integration tests - run with DATABASE_URL set
    // cargo test -p stocks-server -- --ignored

    fn write_unit(dir: &Path, name: &str, up: &str, down: &str) {
        std::fs::write(dir.join(format!("{}.up.sql", name)), up).unwrap();
        std::fs::write(dir.join(format!("{}.down.sql", name)), down).unwrap();
    }

    async fn table_exists(pool: &PgPool, table: &str) -> bool {
        let (present,): (bool,) = sqlx::query_as("SELECT to_regclass($1) IS NOT NULL")
            .bind(table)
            .fetch_one(pool)
            .await
            .unwrap();
        present
    }

    #[test]
    fn state_display() {
        assert_eq!(MigrationState::AtGroup(3).to_string(), "at group 3");
        assert_eq!(MigrationState::Uninitialized.to_string(), "uninitialized");
    }

    #[test]
    fn empty_group_is_no_op() {
        let group = MigrationGroup::empty();
        assert_eq!(group.id, 0);
        assert!(group.is_empty());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let migrator = Migrator::new(isolated_schema_pool().await, dir.path());

        assert_eq!(migrator.state().await.unwrap(), MigrationState::Uninitialized);
        migrator.init().await.unwrap();
        migrator.init().await.unwrap();
        assert_eq!(migrator.state().await.unwrap(), MigrationState::Initialized);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn migrate_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let migrator = Migrator::new(isolated_schema_pool().await, dir.path());

        let err = migrator.migrate().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreFault);
        assert!(err.to_string().contains("init"));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn migrate_twice_then_rollback() {
        let dir = tempfile::tempdir().unwrap();
        write_unit(
            dir.path(),
            "20240101000000_create_a",
            "CREATE TABLE mig_a (id INT PRIMARY KEY);",
            "DROP TABLE mig_a;",
        );
        write_unit(
            dir.path(),
            "20240102000000_create_b",
            "CREATE TABLE mig_b (id INT REFERENCES mig_a(id) ON DELETE CASCADE, x INT); CREATE INDEX mig_b_x ON mig_b(x);",
            "DROP TABLE mig_b;",
        );
        let pool = isolated_schema_pool().await;
        let migrator = Migrator::new(pool.clone(), dir.path());
        migrator.init().await.unwrap();

        let first = migrator.migrate().await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(
            first.units,
            vec!["20240101000000_create_a", "20240102000000_create_b"]
        );
        assert!(table_exists(&pool, "mig_b").await);

        let second = migrator.migrate().await.unwrap();
        assert!(second.is_empty());
        assert_eq!(second.id, 0);
        assert_eq!(migrator.state().await.unwrap(), MigrationState::AtGroup(1));

        let reverted = migrator.rollback().await.unwrap();
        assert_eq!(reverted.id, 1);
        // b depends on a, so descending order is the only order that works
        assert_eq!(
            reverted.units,
            vec!["20240102000000_create_b", "20240101000000_create_a"]
        );
        assert!(!table_exists(&pool, "mig_a").await);
        assert_eq!(migrator.state().await.unwrap(), MigrationState::Initialized);

        let nothing = migrator.rollback().await.unwrap();
        assert!(nothing.is_empty());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn rollback_only_reverts_newest_group() {
        let dir = tempfile::tempdir().unwrap();
        write_unit(dir.path(), "20240101000000_a", "CREATE TABLE g_a (id INT);", "DROP TABLE g_a;");
        let pool = isolated_schema_pool().await;
        let migrator = Migrator::new(pool.clone(), dir.path());
        migrator.init().await.unwrap();
        migrator.migrate().await.unwrap();

        write_unit(dir.path(), "20240201000000_b", "CREATE TABLE g_b (id INT);", "DROP TABLE g_b;");
        let second = migrator.migrate().await.unwrap();
        assert_eq!(second.id, 2);
        assert_eq!(second.units, vec!["20240201000000_b"]);

        migrator.rollback().await.unwrap();
        assert!(table_exists(&pool, "g_a").await);
        assert!(!table_exists(&pool, "g_b").await);
        assert_eq!(migrator.state().await.unwrap(), MigrationState::AtGroup(1));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn failing_unit_aborts_whole_group() {
        let dir = tempfile::tempdir().unwrap();
        write_unit(dir.path(), "20240101000000_ok", "CREATE TABLE f_ok (id INT);", "DROP TABLE f_ok;");
        write_unit(dir.path(), "20240102000000_broken", "CREATE TABLE f_ok (id INT);", "");
        let pool = isolated_schema_pool().await;
        let migrator = Migrator::new(pool.clone(), dir.path());
        migrator.init().await.unwrap();

        let err = migrator.migrate().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreFault);
        assert!(!table_exists(&pool, "f_ok").await);
        assert_eq!(migrator.state().await.unwrap(), MigrationState::Initialized);

        let status = migrator.status().await.unwrap();
        assert!(status.applied.is_empty());
        assert_eq!(status.pending.len(), 2);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn generated_units_apply_as_one_group() {
        let dir = tempfile::tempdir().unwrap();
        let migrator = Migrator::new(isolated_schema_pool().await, dir.path());
        migrator.init().await.unwrap();

        let first = migrator.generate("add_index").await.unwrap();
        let second = migrator.generate("add_index").await.unwrap();
        assert_ne!(first.name, second.name);
        assert!(first.name < second.name);

        let group = migrator.migrate().await.unwrap();
        assert_eq!(group.units, vec![first.name.clone(), second.name.clone()]);

        let status = migrator.status().await.unwrap();
        assert_eq!(status.state, MigrationState::AtGroup(group.id));
        assert!(status.pending.is_empty());
        assert!(status.applied.iter().all(|a| a.group_id == group.id));
        assert_eq!(status.applied.len(), 2);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn rollback_without_down_file_fails_and_keeps_group() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("20240101000000_one_way.up.sql"),
            "CREATE TABLE one_way (id INT);",
        )
        .unwrap();
        let pool = isolated_schema_pool().await;
        let migrator = Migrator::new(pool.clone(), dir.path());
        migrator.init().await.unwrap();
        migrator.migrate().await.unwrap();

        assert!(migrator.rollback().await.is_err());
        assert!(table_exists(&pool, "one_way").await);
        assert_eq!(migrator.state().await.unwrap(), MigrationState::AtGroup(1));
    }
}
