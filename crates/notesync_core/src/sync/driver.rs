//! Cooperative event loop that keeps a `NotesClient` in sync.
//!
//! # Responsibility
//! - Start and end sessions as the current identity changes.
//! - Hold the live label and first-page note subscriptions of the session.
//! - Trigger flushes on queue changes, on a periodic tick while work is
//!   pending and when connectivity comes back.
//!
//! # Invariants
//! - Runs on one thread (current-thread runtime or `LocalSet`).
//! - Snapshots are applied with the context they were subscribed under.

use crate::service::NotesClient;
use crate::session::{Identity, SessionContext};
use crate::sync::remote::{NotesPage, RemoteLabel, Subscription};
use log::{debug, info};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

/// Live subscriptions of the active session.
#[derive(Default)]
struct LiveStreams {
    ctx: Option<SessionContext>,
    labels: Option<Subscription<Vec<RemoteLabel>>>,
    notes: Option<Subscription<NotesPage>>,
}

impl LiveStreams {
    /// Reconciles the client session with `identity`.
    fn switch(&mut self, client: &NotesClient, identity: Option<Identity>) {
        match identity {
            Some(identity) => {
                let current = self.ctx.as_ref().filter(|ctx| ctx.uid() == identity.uid);
                if current.is_some() && client.session().as_ref() == current {
                    return;
                }
                let ctx = client.start_session(identity);
                let remote = client.remote();
                self.labels = Some(remote.watch_labels(ctx.uid()));
                self.notes = Some(remote.watch_notes(ctx.uid(), client.settings().notes_page_size));
                self.ctx = Some(ctx);
            }
            None => {
                *self = Self::default();
                if client.is_signed_in() {
                    client.end_session();
                }
            }
        }
    }
}

/// Drives `client` until the identity channel closes.
pub async fn run_sync(
    client: &NotesClient,
    mut identity_rx: watch::Receiver<Option<Identity>>,
    mut connectivity_rx: watch::Receiver<bool>,
) {
    let queue_changed = client.queue_changed();
    let mut ticker = interval(Duration::from_millis(client.settings().base_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut connectivity_open = true;

    let mut live = LiveStreams::default();
    let initial = identity_rx.borrow_and_update().clone();
    live.switch(client, initial);
    info!("event=sync_driver module=sync status=start");

    loop {
        tokio::select! {
            changed = identity_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let identity = identity_rx.borrow_and_update().clone();
                live.switch(client, identity);
            }
            snapshot = next_item(live.labels.as_mut()) => match (snapshot, live.ctx.as_ref()) {
                (Some(labels), Some(ctx)) => {
                    client.apply_labels_snapshot(ctx, &labels);
                }
                (Some(_), None) => {}
                (None, _) => {
                    debug!("event=labels_watch module=sync status=closed");
                    live.labels = None;
                }
            },
            snapshot = next_item(live.notes.as_mut()) => match (snapshot, live.ctx.as_ref()) {
                (Some(page), Some(ctx)) => {
                    client.apply_notes_snapshot(ctx, &page);
                }
                (Some(_), None) => {}
                (None, _) => {
                    debug!("event=notes_watch module=sync status=closed");
                    live.notes = None;
                }
            },
            changed = connectivity_rx.changed(), if connectivity_open => {
                if changed.is_err() {
                    connectivity_open = false;
                    continue;
                }
                let online = *connectivity_rx.borrow_and_update();
                info!("event=connectivity module=sync status=changed online={online}");
                if online {
                    client.flush().await;
                }
            }
            _ = queue_changed.notified() => {
                client.flush().await;
            }
            _ = ticker.tick() => {
                if client.pending_len() > 0 {
                    client.flush().await;
                }
            }
        }
    }

    info!("event=sync_driver module=sync status=stop");
}

/// Next item of `subscription`, or never when there is none.
async fn next_item<T>(subscription: Option<&mut Subscription<T>>) -> Option<T> {
    match subscription {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}
