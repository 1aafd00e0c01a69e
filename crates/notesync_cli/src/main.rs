//! CLI smoke entry point.
//!
//! # Responsibility
//! - Refuse to run when the remote store configuration is incomplete.
//! - Report queued mutations persisted in a local store, per identity.
//!
//! Usage: `notesync_cli [--config FILE] [--db FILE] [UID ...]`. Without
//! UIDs, every identity with a persisted queue is reported.

use clap::Parser;
use log::{info, warn};
use notesync_core::config::{RemoteStoreConfig, SyncSettings, CONFIG_MISSING_MESSAGE};
use notesync_core::session::{Identity, SessionContext};
use notesync_core::storage::{KvStore, SqliteKvStore};
use notesync_core::sync::queue::{MutationQueue, QUEUE_KEY_PREFIX};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

const DB_PATH_ENV: &str = "NOTESYNC_DB_PATH";
const DEFAULT_DB_PATH: &str = "notesync.sqlite3";
const STORE_NAMESPACE: &str = "notesync";

/// Reports the pending sync queue stored in a local notesync database.
#[derive(Debug, Parser)]
#[command(name = "notesync_cli", version)]
struct Args {
    /// Remote store config as camelCase JSON; defaults to NOTESYNC_* variables
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database holding the persisted queues
    #[arg(long, value_name = "FILE", env = DB_PATH_ENV, default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Identities to report; every identity with a queue when omitted
    uids: Vec<String>,
}

fn load_config(path: Option<&Path>) -> Result<RemoteStoreConfig, String> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|err| format!("failed to read config `{}`: {err}", path.display()))?;
            RemoteStoreConfig::from_json_str(&raw).map_err(|err| err.to_string())
        }
        None => Ok(RemoteStoreConfig::from_env()),
    }
}

fn report_queue(store: &Rc<SqliteKvStore>, uid: &str, max_len: usize) {
    let ctx = SessionContext::new(Identity::new(uid), 0);
    let shared: Rc<dyn KvStore> = store.clone();
    let queue = MutationQueue::load(&ctx, shared, max_len);
    let mut kinds: BTreeMap<&'static str, usize> = BTreeMap::new();
    for mutation in queue.entries() {
        *kinds.entry(mutation.kind()).or_insert(0) += 1;
    }
    let breakdown = kinds
        .iter()
        .map(|(kind, count)| format!("{kind}={count}"))
        .collect::<Vec<_>>()
        .join(" ");
    println!("uid={uid} pending={} {breakdown}", queue.len());
    info!(
        "event=queue_report module=cli status=ok pending={}",
        queue.len()
    );
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(78);
        }
    };
    if let Err(err) = config.validate() {
        println!("{CONFIG_MISSING_MESSAGE}");
        eprintln!("{err}");
        return ExitCode::from(78);
    }

    if let Err(message) = notesync_core::init_logging_from_env() {
        eprintln!("logging disabled: {message}");
    }

    let store = match SqliteKvStore::open(&args.db, STORE_NAMESPACE) {
        Ok(store) => Rc::new(store),
        Err(err) => {
            eprintln!("failed to open `{}`: {err}", args.db.display());
            return ExitCode::FAILURE;
        }
    };

    let uids = if args.uids.is_empty() {
        match store.keys_with_prefix(QUEUE_KEY_PREFIX) {
            Ok(keys) => keys
                .iter()
                .filter_map(|key| key.strip_prefix(QUEUE_KEY_PREFIX))
                .map(str::to_string)
                .collect(),
            Err(err) => {
                warn!("event=queue_scan module=cli status=error error={err}");
                eprintln!("failed to list queues: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        args.uids
    };

    println!("notesync_core version={}", notesync_core::core_version());
    let max_len = SyncSettings::default().max_queue_len;
    for uid in &uids {
        report_queue(&store, uid, max_len);
    }
    if uids.is_empty() {
        println!("no pending queues");
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::{Args, DEFAULT_DB_PATH};
    use clap::Parser;
    use std::path::Path;

    #[test]
    fn parses_flags_and_uids() {
        let args = Args::try_parse_from(["notesync_cli", "--db", "/tmp/x.db", "u1", "u2"])
            .expect("valid args");
        assert_eq!(args.db, Path::new("/tmp/x.db"));
        assert_eq!(args.uids, vec!["u1", "u2"]);
        assert!(args.config.is_none());
    }

    #[test]
    fn db_path_defaults_when_flag_and_env_are_absent() {
        if std::env::var_os(super::DB_PATH_ENV).is_some() {
            return;
        }
        let args = Args::try_parse_from(["notesync_cli"]).expect("no args");
        assert_eq!(args.db, Path::new(DEFAULT_DB_PATH));
        assert!(args.uids.is_empty());
    }

    #[test]
    fn rejects_unknown_flags_and_missing_values() {
        assert!(Args::try_parse_from(["notesync_cli", "--verbose"]).is_err());
        assert!(Args::try_parse_from(["notesync_cli", "--config"]).is_err());
    }
}
