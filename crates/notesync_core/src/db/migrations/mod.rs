//! Ordered schema steps for the key-value database.
//!
//! # Invariants
//! - Step versions start at 1 and increase by one.
//! - Pending steps run inside a single transaction together with the
//!   `user_version` bump, so a crash leaves the previous version intact.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[Step] = &[Step {
    version: 1,
    name: "kv_store",
    sql: include_str!("0001_kv_store.sql"),
}];

/// Highest schema version this build can write.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Version recorded in the database header.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}

/// Runs every step newer than the stored version.
///
/// Returns the version the database ended up at.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<u32> {
    let found = schema_version(conn)?;
    let supported = latest_version();
    if found > supported {
        return Err(DbError::SchemaTooNew { found, supported });
    }

    let pending: Vec<&Step> = STEPS.iter().filter(|step| step.version > found).collect();
    let Some(last) = pending.last().map(|step| step.version) else {
        debug!("event=db_migrate module=db status=skip version={found}");
        return Ok(found);
    };

    let tx = conn.transaction()?;
    for step in &pending {
        tx.execute_batch(step.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", step.version))
            .map_err(|source| DbError::Migration {
                version: step.version,
                source,
            })?;
        debug!(
            "event=db_migrate_step module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={found} to_version={last}");
    Ok(last)
}
