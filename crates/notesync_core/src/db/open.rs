//! Connection setup for the key-value database.
//!
//! # Invariants
//! - Returned connections are migrated to `latest_version()`.
//! - Lock contention with another handle waits up to `BUSY_TIMEOUT`.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (creating if needed) the database file at `path`.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    open_logged("file", || Connection::open(path))
}

/// Opens a private in-memory database, mainly for tests.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_logged("memory", Connection::open_in_memory)
}

fn open_logged(
    mode: &'static str,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let result = connect()
        .map_err(Into::into)
        .and_then(|mut conn| prepare(&mut conn).map(|version| (conn, version)));
    let duration_ms = started_at.elapsed().as_millis();

    match result {
        Ok((conn, version)) => {
            info!("event=db_open module=db status=ok mode={mode} version={version} duration_ms={duration_ms}");
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} class={:?} duration_ms={duration_ms} error={err}",
                err.class()
            );
            Err(err)
        }
    }
}

fn prepare(conn: &mut Connection) -> DbResult<u32> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    apply_migrations(conn)
}
