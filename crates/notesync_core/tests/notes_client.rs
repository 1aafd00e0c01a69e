use futures_util::future::{FutureExt, LocalBoxFuture};
use notesync_core::clock::ManualClock;
use notesync_core::config::SyncSettings;
use notesync_core::error::InputError;
use notesync_core::search::NoteFilter;
use notesync_core::service::{NotesClient, REDIRECT_FAILED_MESSAGE};
use notesync_core::session::{AuthError, Identity, IdentityProvider, SignInOutcome};
use notesync_core::storage::{KvStore, MemoryKvStore};
use notesync_core::sync::memory::InMemoryRemoteStore;
use notesync_core::sync::queue::queue_key;
use notesync_core::sync::remote::{NoteDocument, RemoteStore};
use std::cell::RefCell;
use std::rc::Rc;
use tokio::sync::watch;

/// Redirect completion fails without a message.
struct FailingRedirect;

impl IdentityProvider for FailingRedirect {
    fn sign_in_interactive(&self) -> LocalBoxFuture<'_, Result<Identity, AuthError>> {
        async { Err(AuthError::InteractiveBlocked) }.boxed_local()
    }

    fn sign_in_redirect(&self) -> LocalBoxFuture<'_, Result<(), AuthError>> {
        async { Ok(()) }.boxed_local()
    }

    fn complete_redirect(&self) -> LocalBoxFuture<'_, Result<Option<Identity>, AuthError>> {
        async { Err(AuthError::Failed(String::new())) }.boxed_local()
    }

    fn sign_out(&self) -> LocalBoxFuture<'_, Result<(), AuthError>> {
        async { Ok(()) }.boxed_local()
    }

    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        watch::channel(None).1
    }
}

fn client_with(
    remote: Rc<InMemoryRemoteStore>,
    store: Rc<MemoryKvStore>,
    settings: SyncSettings,
) -> NotesClient {
    NotesClient::new(remote, store, Rc::new(ManualClock::new(10_000)), settings)
}

fn client() -> (Rc<InMemoryRemoteStore>, Rc<MemoryKvStore>, NotesClient) {
    let remote = Rc::new(InMemoryRemoteStore::new());
    let store = Rc::new(MemoryKvStore::new());
    let client = client_with(remote.clone(), store.clone(), SyncSettings::default());
    (remote, store, client)
}

fn doc(body: &str, updated_at_ms: i64) -> NoteDocument {
    NoteDocument {
        body: Some(body.to_string()),
        updated_at_ms: Some(updated_at_ms),
        ..NoteDocument::default()
    }
}

#[test]
fn use_cases_require_a_session() {
    let (_, _, client) = client();
    let mut editor = client.new_editor();
    editor.set_body("body");

    assert_eq!(client.create_label("Work"), Err(InputError::NotSignedIn));
    assert_eq!(
        client.save_new_note(&mut editor).unwrap_err(),
        InputError::NotSignedIn
    );
    assert_eq!(client.delete_note("n1"), Err(InputError::NotSignedIn));
    assert_eq!(editor.body(), "body");
}

#[test]
fn invalid_input_is_rejected_without_state_change() {
    let (_, _, client) = client();
    client.start_session(Identity::new("u1"));
    client.create_label("Work").unwrap();

    assert_eq!(
        client.create_label("  work "),
        Err(InputError::DuplicateLabel("work".to_string()))
    );
    assert_eq!(client.create_label("   "), Err(InputError::EmptyLabelName));

    let mut editor = client.new_editor();
    editor.set_title("Title only");
    editor.set_body("   ");
    assert_eq!(
        client.save_new_note(&mut editor).unwrap_err(),
        InputError::EmptyBody
    );
    assert_eq!(editor.title(), "Title only");
    assert_eq!(
        client.delete_label("missing"),
        Err(InputError::LabelNotFound("missing".to_string()))
    );
    assert_eq!(
        client.delete_note("missing"),
        Err(InputError::NoteNotFound("missing".to_string()))
    );
    assert_eq!(client.pending_len(), 1);
}

#[test]
fn sign_out_keeps_persisted_queue_for_that_identity() {
    let remote = Rc::new(InMemoryRemoteStore::new());
    remote.set_reachable(false);
    let store = Rc::new(MemoryKvStore::new());
    let client = client_with(remote, store.clone(), SyncSettings::default());

    client.start_session(Identity::new("u1"));
    let mut editor = client.new_editor();
    editor.set_body("offline thought");
    client.save_new_note(&mut editor).unwrap();

    client.end_session();
    assert!(!client.is_signed_in());
    assert!(client.display().notes.is_empty());
    assert_eq!(client.pending_len(), 0);
    assert!(store.get(&queue_key("u1")).unwrap().is_some());

    client.start_session(Identity::new("u2"));
    assert_eq!(client.pending_len(), 0);
    assert!(client.display().notes.is_empty());

    client.start_session(Identity::new("u1"));
    assert_eq!(client.pending_len(), 1);
    assert_eq!(client.display().notes[0].body, "offline thought");
}

#[tokio::test]
async fn load_more_pages_older_notes_without_duplicates() {
    let remote = Rc::new(InMemoryRemoteStore::new());
    for (id, at) in [("n1", 50), ("n2", 40), ("n3", 30), ("n4", 20), ("n5", 10)] {
        remote.seed_note("u1", id, doc(id, at));
    }
    let settings = SyncSettings {
        notes_page_size: 2,
        ..SyncSettings::default()
    };
    let client = client_with(remote.clone(), Rc::new(MemoryKvStore::new()), settings);
    let ctx = client.start_session(Identity::new("u1"));
    assert!(client.loading_data());

    let mut notes_rx = remote.watch_notes(ctx.uid(), 2);
    let first = notes_rx.try_recv().unwrap();
    assert!(client.apply_notes_snapshot(&ctx, &first));
    assert!(!client.loading_data());
    assert!(client.has_more_notes());

    assert_eq!(client.load_more_notes().await.unwrap(), 2);
    assert_eq!(client.load_more_notes().await.unwrap(), 1);
    assert!(!client.has_more_notes());
    assert_eq!(client.load_more_notes().await.unwrap(), 0);

    let ids: Vec<String> = client.display().notes.into_iter().map(|n| n.id).collect();
    assert_eq!(ids, vec!["n1", "n2", "n3", "n4", "n5"]);

    // n5 rises to the top; already loaded older notes stay visible.
    remote
        .upsert_note("u1", "n5", doc("n5 edited", 60))
        .await
        .unwrap();
    while let Ok(page) = notes_rx.try_recv() {
        client.apply_notes_snapshot(&ctx, &page);
    }
    let ids: Vec<String> = client.display().notes.into_iter().map(|n| n.id).collect();
    assert_eq!(ids, vec!["n5", "n1", "n3", "n4"]);
}

#[tokio::test]
async fn failed_page_fetch_releases_the_slot() {
    let remote = Rc::new(InMemoryRemoteStore::new());
    for (id, at) in [("a", 3), ("b", 2), ("c", 1)] {
        remote.seed_note("u1", id, doc(id, at));
    }
    let settings = SyncSettings {
        notes_page_size: 2,
        ..SyncSettings::default()
    };
    let client = client_with(remote.clone(), Rc::new(MemoryKvStore::new()), settings);
    let ctx = client.start_session(Identity::new("u1"));
    let first = remote.fetch_notes_page("u1", None, 2).await.unwrap();
    client.apply_notes_snapshot(&ctx, &first);

    remote.set_reachable(false);
    assert!(client.load_more_notes().await.is_err());
    assert!(!client.is_loading_more());

    remote.set_reachable(true);
    assert_eq!(client.load_more_notes().await.unwrap(), 1);
}

#[test]
fn snapshots_for_an_ended_session_are_ignored() {
    let (remote, _, client) = client();
    remote.seed_note("u1", "n1", doc("hello", 1));
    let stale = client.start_session(Identity::new("u1"));
    client.end_session();
    let current = client.start_session(Identity::new("u1"));
    assert_ne!(stale, current);

    let mut notes_rx = remote.watch_notes("u1", 40);
    let page = notes_rx.try_recv().unwrap();
    assert!(!client.apply_notes_snapshot(&stale, &page));
    assert!(client.display().notes.is_empty());
    assert!(client.apply_notes_snapshot(&current, &page));
    assert_eq!(client.display().notes.len(), 1);
}

#[test]
fn observers_see_every_recompute_until_unsubscribed() {
    let (_, _, client) = client();
    let seen: Rc<RefCell<Vec<usize>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let id = client.subscribe(move |state| sink.borrow_mut().push(state.notes.len()));

    client.start_session(Identity::new("u1"));
    let mut editor = client.new_editor();
    editor.set_body("one");
    client.save_new_note(&mut editor).unwrap();
    assert!(client.unsubscribe(id));
    editor.set_body("two");
    client.save_new_note(&mut editor).unwrap();

    assert_eq!(*seen.borrow(), vec![0, 1]);
}

#[test]
fn visible_notes_and_label_counts_follow_display() {
    let (_, _, client) = client();
    client.start_session(Identity::new("u1"));
    let label = client.create_label("Errands").unwrap();

    let mut editor = client.new_editor();
    editor.set_body("post office");
    editor.toggle_label(&label.id);
    client.save_new_note(&mut editor).unwrap();
    editor.set_body("Read a book");
    client.save_new_note(&mut editor).unwrap();

    assert_eq!(client.visible_notes(&NoteFilter::keyword("BOOK")).len(), 1);
    assert_eq!(client.visible_notes(&NoteFilter::label(&label.id)).len(), 1);
    let counts = client.label_note_counts();
    assert_eq!(counts.get(&label.id), Some(&1));
    assert_eq!(counts.get("none"), Some(&1));
}

#[tokio::test]
async fn redirect_failure_without_message_uses_fallback_notice() {
    let (_, _, client) = client();
    assert_eq!(client.complete_redirect(&FailingRedirect).await, None);
    let notices = client.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].message, REDIRECT_FAILED_MESSAGE);
}

#[tokio::test]
async fn blocked_interactive_sign_in_falls_back_to_redirect() {
    let (_, _, client) = client();
    assert_eq!(
        client.sign_in(&FailingRedirect).await,
        Some(SignInOutcome::Redirecting)
    );
    assert!(client.notices().is_empty());
    assert!(!client.is_signed_in());
}
