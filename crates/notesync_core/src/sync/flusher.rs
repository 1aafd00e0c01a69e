//! Sequential delivery of queued mutations to the remote store.
//!
//! # Responsibility
//! - Drain the queue head-first, one remote write at a time.
//! - Gate attempts on reachability, session, single-flight and backoff.
//! - Report failures as a quiet warning; queued data stays intact.
//!
//! # Invariants
//! - At most one drain runs at a time; overlapping triggers are no-ops.
//! - A mutation leaves the queue only after its write succeeded, matched by
//!   mutation id.
//! - The first failed write stops the drain; later entries keep their order.

use crate::clock::Clock;
use crate::model::mutation::{Mutation, MutationOp};
use crate::session::SessionContext;
use crate::sync::backoff::Backoff;
use crate::sync::queue::MutationQueue;
use crate::sync::remote::{LabelDocument, NoteDocument, RemoteResult, RemoteStore};
use log::{info, warn};
use std::cell::{Cell, RefCell};
use std::time::Instant;

/// Warning shown while local changes wait for a retry.
pub const SYNC_WARNING: &str = "Saved locally. Cloud sync will retry automatically.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushSkip {
    NoIdentity,
    Unreachable,
    InFlight,
    Empty,
    BackingOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Skipped(FlushSkip),
    /// Queue fully drained.
    Drained { written: usize },
    /// A write failed; the next attempt is allowed after `retry_in_ms`.
    Failed { written: usize, retry_in_ms: u64 },
    /// The session ended while a write was in flight.
    Interrupted { written: usize },
}

/// Pending work the flusher drains.
pub trait FlushTarget {
    /// Whether `ctx` is still the active session.
    fn is_active(&self, ctx: &SessionContext) -> bool;
    /// Oldest pending mutation.
    fn head(&self) -> Option<Mutation>;
    /// Called after the remote write for `mutation` succeeded.
    fn acknowledge(&self, mutation: &Mutation);
}

impl FlushTarget for RefCell<MutationQueue> {
    fn is_active(&self, _ctx: &SessionContext) -> bool {
        true
    }

    fn head(&self) -> Option<Mutation> {
        self.borrow().head().cloned()
    }

    fn acknowledge(&self, mutation: &Mutation) {
        self.borrow_mut().remove(&mutation.id);
    }
}

pub struct Flusher {
    ctx: SessionContext,
    in_flight: Cell<bool>,
    backoff: RefCell<Backoff>,
    warning: Cell<Option<&'static str>>,
}

struct InFlightGuard<'a>(&'a Cell<bool>);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Flusher {
    pub fn new(ctx: SessionContext, base_interval_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            ctx,
            in_flight: Cell::new(false),
            backoff: RefCell::new(Backoff::new(base_interval_ms, max_backoff_ms)),
            warning: Cell::new(None),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn is_flushing(&self) -> bool {
        self.in_flight.get()
    }

    /// Current quiet warning, if the last attempt failed.
    pub fn warning(&self) -> Option<&'static str> {
        self.warning.get()
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff.borrow().clone()
    }

    /// Drains `target` into `remote`.
    pub async fn flush(
        &self,
        remote: &dyn RemoteStore,
        target: &dyn FlushTarget,
        clock: &dyn Clock,
    ) -> FlushOutcome {
        if !target.is_active(&self.ctx) {
            return FlushOutcome::Skipped(FlushSkip::NoIdentity);
        }
        if !remote.is_reachable() {
            return FlushOutcome::Skipped(FlushSkip::Unreachable);
        }
        if self.in_flight.get() {
            return FlushOutcome::Skipped(FlushSkip::InFlight);
        }
        if target.head().is_none() {
            return FlushOutcome::Skipped(FlushSkip::Empty);
        }
        if !self.backoff.borrow().ready(clock.now_ms()) {
            return FlushOutcome::Skipped(FlushSkip::BackingOff);
        }

        self.in_flight.set(true);
        let _guard = InFlightGuard(&self.in_flight);
        let started_at = Instant::now();
        let mut written = 0usize;

        while let Some(next) = target.head() {
            let result = deliver(remote, self.ctx.uid(), &next).await;
            if !target.is_active(&self.ctx) {
                info!("event=sync_flush module=sync status=interrupted written={written}");
                return FlushOutcome::Interrupted { written };
            }
            match result {
                Ok(()) => {
                    target.acknowledge(&next);
                    written += 1;
                }
                Err(err) => {
                    let retry_in_ms = self.backoff.borrow_mut().record_failure(clock.now_ms());
                    self.warning.set(Some(SYNC_WARNING));
                    warn!(
                        "event=sync_flush module=sync status=error kind={} written={written} retry_in_ms={retry_in_ms} error={err}",
                        next.kind()
                    );
                    return FlushOutcome::Failed {
                        written,
                        retry_in_ms,
                    };
                }
            }
        }

        self.backoff.borrow_mut().record_success();
        self.warning.set(None);
        info!(
            "event=sync_flush module=sync status=ok written={written} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        FlushOutcome::Drained { written }
    }
}

/// Issues the one remote write that corresponds to `mutation`.
async fn deliver(remote: &dyn RemoteStore, uid: &str, mutation: &Mutation) -> RemoteResult<()> {
    match &mutation.op {
        MutationOp::LabelUpsert { label } => {
            remote
                .upsert_label(uid, &label.id, LabelDocument::from_label(label))
                .await
        }
        MutationOp::LabelDelete { label_id } => remote.delete_label(uid, label_id).await,
        MutationOp::NoteUpsert { note } => {
            remote
                .upsert_note(uid, &note.id, NoteDocument::from_note(note))
                .await
        }
        MutationOp::NoteDelete { note_id } => remote.delete_note(uid, note_id).await,
    }
}
