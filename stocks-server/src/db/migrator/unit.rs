//! Migration units on disk
//!
//! A unit is a pair of SQL files sharing a `<YYYYMMDDHHMMSS>_<name>` stem:
//!
//! ```text
//! 20240105093000_create_stock.up.sql
//! 20240105093000_create_stock.down.sql
//! ```
//!
//! Files are read with sqlx's migration resolver; the stem is the unit's
//! identity and its version order is the apply order.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use sqlx::migrate::{Migration, MigrationType, Migrator as SqlFiles};

use crate::error::{Error, Result};
use crate::models::ValidationError;

const VERSION_FORMAT: &str = "%Y%m%d%H%M%S";
const MAX_NAME_LEN: usize = 100;

/// One ordered schema change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationUnit {
    pub version: i64,
    /// Full stem, e.g. `20240105093000_create_stock`
    pub name: String,
    up_sql: String,
    down_sql: Option<String>,
}

impl MigrationUnit {
    pub fn up_sql(&self) -> &str {
        &self.up_sql
    }

    pub fn down_sql(&self) -> Result<&str> {
        self.down_sql
            .as_deref()
            .ok_or_else(|| Error::migration(format!("unit '{}' has no down file", self.name)))
    }
}

/// Files written by [`generate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUnit {
    pub name: String,
    pub up_path: PathBuf,
    pub down_path: PathBuf,
}

/// The resolver turns `create_stock` into the description `create stock`.
fn stem(migration: &Migration) -> String {
    format!("{}_{}", migration.version, migration.description.replace(' ', "_"))
}

/// List every unit in `dir`, ascending by version.
///
/// A missing directory has no units. A down file without its up file is an
/// error; a plain `<version>_<name>.sql` file is a unit without a down file.
pub async fn discover(dir: &Path) -> Result<Vec<MigrationUnit>> {
    if !tokio::fs::try_exists(dir)
        .await
        .map_err(|e| Error::io(dir, e))?
    {
        tracing::debug!(dir = %dir.display(), "migrations directory does not exist");
        return Ok(Vec::new());
    }

    let files = SqlFiles::new(dir)
        .await
        .map_err(|e| Error::migration(format!("cannot read {}: {}", dir.display(), e)))?;

    let mut units: BTreeMap<i64, MigrationUnit> = BTreeMap::new();
    let mut downs: Vec<&Migration> = Vec::new();

    for migration in files.iter() {
        match migration.migration_type {
            MigrationType::ReversibleDown => downs.push(migration),
            _ => {
                let name = stem(migration);
                if let Some(existing) = units.get(&migration.version) {
                    return Err(Error::migration(format!(
                        "units '{}' and '{}' share version {}",
                        existing.name, name, migration.version
                    )));
                }
                units.insert(
                    migration.version,
                    MigrationUnit {
                        version: migration.version,
                        name,
                        up_sql: migration.sql.to_string(),
                        down_sql: None,
                    },
                );
            }
        }
    }

    for down in downs {
        let unit = units.get_mut(&down.version).ok_or_else(|| {
            Error::migration(format!(
                "down file for '{}' has no matching up file",
                stem(down)
            ))
        })?;
        unit.down_sql = Some(down.sql.to_string());
    }

    Ok(units.into_values().collect())
}

/// Normalise a logical migration name to lowercase snake case.
pub fn normalize_name(raw: &str) -> std::result::Result<String, ValidationError> {
    let mut name = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_lowercase());
        } else if (c == '_' || c == '-' || c.is_whitespace()) && !name.ends_with('_') {
            name.push('_');
        } else if !(c == '_' || c == '-' || c.is_whitespace()) {
            return Err(ValidationError::InvalidFormat {
                field: "migration name",
                reason: "must contain only ASCII letters, digits, spaces, hyphens or underscores",
            });
        }
    }

    let name = name.trim_matches('_').to_owned();
    if name.is_empty() {
        return Err(ValidationError::Empty {
            field: "migration name",
        });
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "migration name",
            max: MAX_NAME_LEN,
        });
    }
    Ok(name)
}

/// Create the up/down file pair for a new unit stamped `at`.
///
/// A new unit always sorts after every existing one: if `at` is not newer
/// than the newest unit on disk, the version becomes that unit's version plus
/// one second.
pub async fn generate(dir: &Path, raw_name: &str, at: DateTime<Utc>) -> Result<GeneratedUnit> {
    let label = normalize_name(raw_name)?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::io(dir, e))?;

    let newest = discover(dir).await?.iter().map(|u| u.version).max();

    let mut version = at.format(VERSION_FORMAT).to_string();
    if let Some(newest) = newest.map(|v| v.to_string()).filter(|newest| version <= *newest) {
        let parsed = NaiveDateTime::parse_from_str(&newest, VERSION_FORMAT)
            .map_err(|e| Error::migration(format!("bad unit version '{}': {}", newest, e)))?;
        version = (parsed + Duration::seconds(1)).format(VERSION_FORMAT).to_string();
    }

    let name = format!("{}_{}", version, label);
    let up_path = dir.join(format!("{}.up.sql", name));
    let down_path = dir.join(format!("{}.down.sql", name));

    write_new(
        &up_path,
        &format!("-- {}: apply\n-- Statements run inside the group's transaction.\n", name),
    )?;
    write_new(&down_path, &format!("-- {}: revert\n", name))?;

    tracing::info!(unit = %name, up = %up_path.display(), down = %down_path.display(), "generated migration");

    Ok(GeneratedUnit {
        name,
        up_path,
        down_path,
    })
}

fn write_new(path: &Path, contents: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| Error::io(path, e))?;
    file.write_all(contents.as_bytes())
        .map_err(|e| Error::io(path, e))
}
