//! Notes client controller.
//!
//! # Responsibility
//! - Own the active session: queue, listener base and flusher.
//! - Validate user actions and turn them into queued mutations.
//! - Recompute the displayed state and notify observers.
//!
//! # Invariants
//! - Displayed state is always `project(base, queue)` of the active session.
//! - Rejected input leaves queue and display untouched.
//! - Results of async work started under an older session are discarded.
//! - No `RefCell` borrow is held across an await.
//!
//! # See also
//! - `sync::driver::run_sync` for the event loop feeding this controller.

use crate::clipboard::{Clipboard, COPY_FAILED_MESSAGE, PASTE_FAILED_MESSAGE};
use crate::clock::{Clock, Stamper};
use crate::config::SyncSettings;
use crate::error::InputError;
use crate::model::ids::{new_id, LABEL_ID_PREFIX, MUTATION_ID_PREFIX, NOTE_ID_PREFIX};
use crate::model::label::Label;
use crate::model::mutation::Mutation;
use crate::model::note::Note;
use crate::notice::{Notice, NoticeBoard, NoticeId, NoticeKind};
use crate::search::{self, NoteFilter};
use crate::service::editor::NoteEditor;
use crate::session::{self, AuthError, Identity, IdentityProvider, SessionContext, SignInOutcome};
use crate::storage::KvStore;
use crate::sync::flusher::{FlushOutcome, FlushSkip, FlushTarget, Flusher};
use crate::sync::listener::SnapshotListener;
use crate::sync::projector::{project, DisplayState};
use crate::sync::queue::MutationQueue;
use crate::sync::remote::{NotesPage, RemoteLabel, RemoteResult, RemoteStore};
use log::{debug, info, warn};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use tokio::sync::Notify;

/// Notice shown when a redirect sign-in fails without a message.
pub const REDIRECT_FAILED_MESSAGE: &str = "Sign-in redirect failed.";

pub type ObserverId = u64;
pub type Observer = Rc<dyn Fn(&DisplayState)>;

struct ActiveSession {
    ctx: SessionContext,
    queue: MutationQueue,
    listener: SnapshotListener,
    flusher: Rc<Flusher>,
}

pub struct NotesClient {
    remote: Rc<dyn RemoteStore>,
    store: Rc<dyn KvStore>,
    clock: Rc<dyn Clock>,
    settings: SyncSettings,
    stamper: Stamper,
    generation: Cell<u64>,
    session: RefCell<Option<ActiveSession>>,
    display: RefCell<DisplayState>,
    loading_data: Cell<bool>,
    notices: RefCell<NoticeBoard>,
    observers: RefCell<Vec<(ObserverId, Observer)>>,
    next_observer_id: Cell<ObserverId>,
    queue_changed: Rc<Notify>,
}

impl NotesClient {
    pub fn new(
        remote: Rc<dyn RemoteStore>,
        store: Rc<dyn KvStore>,
        clock: Rc<dyn Clock>,
        settings: SyncSettings,
    ) -> Self {
        let notices = NoticeBoard::new(settings.notice_duration_ms);
        Self {
            remote,
            store,
            clock,
            settings,
            stamper: Stamper::new(),
            generation: Cell::new(0),
            session: RefCell::new(None),
            display: RefCell::new(DisplayState::default()),
            loading_data: Cell::new(false),
            notices: RefCell::new(notices),
            observers: RefCell::new(Vec::new()),
            next_observer_id: Cell::new(1),
            queue_changed: Rc::new(Notify::new()),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn remote(&self) -> Rc<dyn RemoteStore> {
        Rc::clone(&self.remote)
    }

    /// Signalled whenever the pending queue gains entries.
    pub fn queue_changed(&self) -> Rc<Notify> {
        Rc::clone(&self.queue_changed)
    }

    /// Starts a session for `identity`, replacing any active one.
    ///
    /// The persisted queue is projected over an empty base right away, so
    /// pending local work is visible before the first snapshot arrives.
    pub fn start_session(&self, identity: Identity) -> SessionContext {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        let ctx = SessionContext::new(identity, generation);

        let queue = MutationQueue::load(&ctx, Rc::clone(&self.store), self.settings.max_queue_len);
        let pending = queue.len();
        let active = ActiveSession {
            listener: SnapshotListener::new(ctx.clone(), self.settings.notes_page_size),
            flusher: Rc::new(Flusher::new(
                ctx.clone(),
                self.settings.base_interval_ms,
                self.settings.max_backoff_ms,
            )),
            queue,
            ctx: ctx.clone(),
        };
        *self.session.borrow_mut() = Some(active);
        self.loading_data.set(true);
        info!("event=session_start module=service status=ok generation={generation} pending={pending}");

        self.recompute();
        if pending > 0 {
            self.queue_changed.notify_one();
        }
        ctx
    }

    /// Drops all in-memory session state. The persisted queue is kept for
    /// the identity's next sign-in.
    pub fn end_session(&self) {
        let Some(ended) = self.session.borrow_mut().take() else {
            return;
        };
        self.loading_data.set(false);
        info!(
            "event=session_end module=service status=ok generation={} pending={}",
            ended.ctx.generation(),
            ended.queue.len()
        );
        self.recompute();
    }

    pub fn session(&self) -> Option<SessionContext> {
        self.session.borrow().as_ref().map(|active| active.ctx.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.borrow().is_some()
    }

    /// Signs in through `provider`; failures become error notices.
    pub async fn sign_in(&self, provider: &dyn IdentityProvider) -> Option<SignInOutcome> {
        match session::sign_in(provider).await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                self.report_auth_error("sign_in", &err);
                None
            }
        }
    }

    /// Resolves a pending redirect sign-in.
    pub async fn complete_redirect(&self, provider: &dyn IdentityProvider) -> Option<Identity> {
        match provider.complete_redirect().await {
            Ok(identity) => identity,
            Err(err) => {
                self.report_auth_error("complete_redirect", &err);
                None
            }
        }
    }

    /// Signs out through `provider`. Returns `false` when the provider
    /// refused; the session then stays active and an error notice is shown.
    pub async fn sign_out(&self, provider: &dyn IdentityProvider) -> bool {
        match provider.sign_out().await {
            Ok(()) => {
                self.end_session();
                true
            }
            Err(err) => {
                self.report_auth_error("sign_out", &err);
                false
            }
        }
    }

    fn report_auth_error(&self, event: &str, err: &AuthError) {
        warn!("event={event} module=service status=error error={err}");
        let message = err.to_string();
        let message = if message.trim().is_empty() {
            REDIRECT_FAILED_MESSAGE.to_string()
        } else {
            message
        };
        self.show_notice(message, NoticeKind::Error);
    }

    /// Replaces the base labels. Returns `false` for a stale session.
    pub fn apply_labels_snapshot(&self, ctx: &SessionContext, labels: &[RemoteLabel]) -> bool {
        {
            let mut guard = self.session.borrow_mut();
            let Some(active) = guard.as_mut().filter(|active| &active.ctx == ctx) else {
                debug!("event=labels_snapshot module=service status=skip reason=stale_session");
                return false;
            };
            active.listener.on_labels_snapshot(labels);
        }
        self.recompute();
        true
    }

    /// Applies the live first page. Returns `false` for a stale session.
    pub fn apply_notes_snapshot(&self, ctx: &SessionContext, page: &NotesPage) -> bool {
        {
            let mut guard = self.session.borrow_mut();
            let Some(active) = guard.as_mut().filter(|active| &active.ctx == ctx) else {
                debug!("event=notes_snapshot module=service status=skip reason=stale_session");
                return false;
            };
            active.listener.on_first_page(page);
            if let Some(newest) = active
                .listener
                .base_notes()
                .iter()
                .map(|note| note.updated_at_ms)
                .max()
            {
                self.stamper.observe(newest);
            }
        }
        self.loading_data.set(false);
        self.recompute();
        true
    }

    /// Fetches the next older page once; returns how many notes were new.
    ///
    /// A no-op when nothing more is available or a fetch is running.
    pub async fn load_more_notes(&self) -> RemoteResult<usize> {
        let (ctx, cursor) = {
            let mut guard = self.session.borrow_mut();
            let Some(active) = guard.as_mut() else {
                return Ok(0);
            };
            match active.listener.begin_load_more() {
                Some(cursor) => (active.ctx.clone(), cursor),
                None => return Ok(0),
            }
        };

        let result = self
            .remote
            .fetch_notes_page(ctx.uid(), Some(cursor), self.settings.notes_page_size)
            .await;

        let added = {
            let mut guard = self.session.borrow_mut();
            let Some(active) = guard.as_mut().filter(|active| active.ctx == ctx) else {
                debug!("event=load_more module=service status=skip reason=stale_session");
                return Ok(0);
            };
            match result {
                Ok(page) => active.listener.finish_load_more(&page),
                Err(err) => {
                    active.listener.abort_load_more();
                    warn!("event=load_more module=service status=error error={err}");
                    return Err(err);
                }
            }
        };
        info!("event=load_more module=service status=ok added={added}");
        self.recompute();
        Ok(added)
    }

    pub fn create_label(&self, name: &str) -> Result<Label, InputError> {
        self.require_session()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(InputError::EmptyLabelName);
        }
        if self.display.borrow().labels.iter().any(|label| label.has_name(name)) {
            return Err(InputError::DuplicateLabel(name.to_string()));
        }

        let now = self.clock.now_ms();
        let label = Label::new(new_id(LABEL_ID_PREFIX, now), name);
        self.enqueue(vec![Mutation::label_upsert(
            new_id(MUTATION_ID_PREFIX, now),
            label.clone(),
        )])?;
        info!("event=label_create module=service status=ok label_id={}", label.id);
        Ok(label)
    }

    /// Deletes a confirmed label and rewrites every note that carried it.
    ///
    /// Returns how many notes were rewritten.
    pub fn delete_label(&self, label_id: &str) -> Result<usize, InputError> {
        self.require_session()?;
        let (label, carriers) = {
            let display = self.display.borrow();
            let label = display
                .labels
                .iter()
                .find(|label| label.id == label_id)
                .cloned()
                .ok_or_else(|| InputError::LabelNotFound(label_id.to_string()))?;
            let carriers: Vec<Note> = display
                .notes
                .iter()
                .filter(|note| note.has_label(label_id))
                .cloned()
                .collect();
            (label, carriers)
        };
        if label.is_optimistic {
            return Err(InputError::LabelPendingSync(label.name));
        }

        let now = self.clock.now_ms();
        let mut mutations = vec![Mutation::label_delete(
            new_id(MUTATION_ID_PREFIX, now),
            label_id,
        )];
        for mut note in carriers {
            note.strip_label(label_id);
            note.updated_at_ms = self.stamper.next(now);
            mutations.push(Mutation::note_upsert(new_id(MUTATION_ID_PREFIX, now), note));
        }
        let rewritten = mutations.len() - 1;
        self.enqueue(mutations)?;
        info!("event=label_delete module=service status=ok label_id={label_id} notes={rewritten}");
        Ok(rewritten)
    }

    /// Creates a note from the editor draft and resets the editor.
    pub fn save_new_note(&self, editor: &mut NoteEditor) -> Result<Note, InputError> {
        self.require_session()?;
        let now = self.clock.now_ms();
        let note = self.note_from_editor(new_id(NOTE_ID_PREFIX, now), editor)?;
        self.enqueue(vec![Mutation::note_upsert(
            new_id(MUTATION_ID_PREFIX, now),
            note.clone(),
        )])?;
        editor.reset();
        info!(
            "event=note_create module=service status=ok note_id={} labels={}",
            note.id,
            note.label_ids.len()
        );
        Ok(note)
    }

    /// Replaces title, body and labels of an existing note.
    pub fn save_note_edits(&self, note_id: &str, editor: &NoteEditor) -> Result<Note, InputError> {
        self.require_session()?;
        self.require_note(note_id)?;
        let note = self.note_from_editor(note_id.to_string(), editor)?;
        self.enqueue(vec![Mutation::note_upsert(
            new_id(MUTATION_ID_PREFIX, self.clock.now_ms()),
            note.clone(),
        )])?;
        info!("event=note_update module=service status=ok note_id={note_id}");
        Ok(note)
    }

    pub fn delete_note(&self, note_id: &str) -> Result<(), InputError> {
        self.require_session()?;
        self.require_note(note_id)?;
        self.enqueue(vec![Mutation::note_delete(
            new_id(MUTATION_ID_PREFIX, self.clock.now_ms()),
            note_id,
        )])?;
        info!("event=note_delete module=service status=ok note_id={note_id}");
        Ok(())
    }

    /// Editor for the displayed note `note_id`.
    pub fn edit_note(&self, note_id: &str) -> Result<NoteEditor, InputError> {
        let display = self.display.borrow();
        let editor = display
            .notes
            .iter()
            .find(|note| note.id == note_id)
            .map(|note| NoteEditor::for_note(note, self.settings.max_history));
        editor.ok_or_else(|| InputError::NoteNotFound(note_id.to_string()))
    }

    pub fn new_editor(&self) -> NoteEditor {
        NoteEditor::new(self.settings.max_history)
    }

    /// Drains the pending queue; see `Flusher::flush`.
    pub async fn flush(&self) -> FlushOutcome {
        let flusher = match self.session.borrow().as_ref() {
            Some(active) => Rc::clone(&active.flusher),
            None => return FlushOutcome::Skipped(FlushSkip::NoIdentity),
        };
        flusher
            .flush(self.remote.as_ref(), self, self.clock.as_ref())
            .await
    }

    /// Copies a displayed note's body. Returns `Ok(false)` when the
    /// clipboard refused; an error notice is shown in that case.
    pub async fn copy_note_body(
        &self,
        clipboard: &dyn Clipboard,
        note_id: &str,
    ) -> Result<bool, InputError> {
        let body = self
            .display
            .borrow()
            .notes
            .iter()
            .find(|note| note.id == note_id)
            .map(|note| note.body.clone())
            .ok_or_else(|| InputError::NoteNotFound(note_id.to_string()))?;
        match clipboard.write_text(&body).await {
            Ok(()) => {
                debug!("event=clipboard_copy module=service status=ok note_id={note_id}");
                Ok(true)
            }
            Err(err) => {
                warn!("event=clipboard_copy module=service status=error error={err}");
                self.show_notice(COPY_FAILED_MESSAGE, NoticeKind::Error);
                Ok(false)
            }
        }
    }

    /// Appends clipboard text to the editor body as one undo step.
    pub async fn paste_into_editor(&self, clipboard: &dyn Clipboard, editor: &mut NoteEditor) -> bool {
        match clipboard.read_text().await {
            Ok(text) => editor.paste(&text),
            Err(err) => {
                warn!("event=clipboard_paste module=service status=error error={err}");
                self.show_notice(PASTE_FAILED_MESSAGE, NoticeKind::Error);
                false
            }
        }
    }

    pub fn display(&self) -> DisplayState {
        self.display.borrow().clone()
    }

    pub fn visible_notes(&self, filter: &NoteFilter) -> Vec<Note> {
        let display = self.display.borrow();
        let visible: Vec<Note> = search::filter_notes(&display.notes, filter)
            .into_iter()
            .cloned()
            .collect();
        visible
    }

    pub fn label_note_counts(&self) -> BTreeMap<String, usize> {
        search::label_note_counts(&self.display.borrow().notes)
    }

    pub fn pending_mutations(&self) -> Vec<Mutation> {
        self.session
            .borrow()
            .as_ref()
            .map(|active| active.queue.entries().to_vec())
            .unwrap_or_default()
    }

    pub fn pending_len(&self) -> usize {
        self.session
            .borrow()
            .as_ref()
            .map(|active| active.queue.len())
            .unwrap_or(0)
    }

    /// Quiet warning while queued changes wait for a retry.
    pub fn sync_warning(&self) -> Option<&'static str> {
        self.session
            .borrow()
            .as_ref()
            .and_then(|active| active.flusher.warning())
    }

    pub fn has_more_notes(&self) -> bool {
        self.session
            .borrow()
            .as_ref()
            .map(|active| active.listener.has_more())
            .unwrap_or(false)
    }

    pub fn is_loading_more(&self) -> bool {
        self.session
            .borrow()
            .as_ref()
            .map(|active| active.listener.is_loading_more())
            .unwrap_or(false)
    }

    /// True from session start until the first notes snapshot.
    pub fn loading_data(&self) -> bool {
        self.loading_data.get()
    }

    pub fn show_notice(&self, message: impl Into<String>, kind: NoticeKind) -> NoticeId {
        self.notices
            .borrow_mut()
            .show(message, kind, None, self.clock.now_ms())
    }

    pub fn dismiss_notice(&self, id: NoticeId) -> bool {
        self.notices.borrow_mut().dismiss(id)
    }

    /// Active notices after dropping expired ones.
    pub fn notices(&self) -> Vec<Notice> {
        let mut board = self.notices.borrow_mut();
        board.expire(self.clock.now_ms());
        board.active().to_vec()
    }

    /// Registers `observer`; it receives the displayed state after every
    /// recompute.
    pub fn subscribe(&self, observer: impl Fn(&DisplayState) + 'static) -> ObserverId {
        let id = self.next_observer_id.get();
        self.next_observer_id.set(id + 1);
        self.observers.borrow_mut().push((id, Rc::new(observer)));
        id
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    fn require_session(&self) -> Result<(), InputError> {
        if self.session.borrow().is_some() {
            Ok(())
        } else {
            Err(InputError::NotSignedIn)
        }
    }

    fn require_note(&self, note_id: &str) -> Result<(), InputError> {
        if self.display.borrow().notes.iter().any(|note| note.id == note_id) {
            Ok(())
        } else {
            Err(InputError::NoteNotFound(note_id.to_string()))
        }
    }

    /// Validated note from the editor draft; labels resolve against the
    /// displayed labels in display order.
    fn note_from_editor(&self, id: String, editor: &NoteEditor) -> Result<Note, InputError> {
        let title = editor.title().trim().to_string();
        let body = editor.body().trim().to_string();
        if body.is_empty() {
            return Err(InputError::EmptyBody);
        }
        let (label_ids, label_names): (Vec<String>, Vec<String>) = self
            .display
            .borrow()
            .labels
            .iter()
            .filter(|label| editor.is_selected(&label.id))
            .map(|label| (label.id.clone(), label.name.clone()))
            .unzip();
        Ok(Note {
            id,
            title,
            body,
            label_ids,
            label_names,
            updated_at_ms: self.stamper.next(self.clock.now_ms()),
        })
    }

    fn enqueue(&self, mutations: Vec<Mutation>) -> Result<(), InputError> {
        {
            let mut guard = self.session.borrow_mut();
            let Some(active) = guard.as_mut() else {
                return Err(InputError::NotSignedIn);
            };
            active.queue.enqueue(mutations);
        }
        self.recompute();
        self.queue_changed.notify_one();
        Ok(())
    }

    fn recompute(&self) {
        let next = match self.session.borrow().as_ref() {
            Some(active) => project(
                active.listener.base_labels(),
                active.listener.base_notes(),
                active.queue.entries(),
            ),
            None => DisplayState::default(),
        };
        *self.display.borrow_mut() = next.clone();

        let observers: Vec<Observer> = self
            .observers
            .borrow()
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        for observer in observers {
            observer(&next);
        }
    }
}

impl FlushTarget for NotesClient {
    fn is_active(&self, ctx: &SessionContext) -> bool {
        self.session
            .borrow()
            .as_ref()
            .map_or(false, |active| &active.ctx == ctx)
    }

    fn head(&self) -> Option<Mutation> {
        self.session
            .borrow()
            .as_ref()
            .and_then(|active| active.queue.head().cloned())
    }

    fn acknowledge(&self, mutation: &Mutation) {
        if let Some(active) = self.session.borrow_mut().as_mut() {
            active.queue.remove(&mutation.id);
            active.listener.acknowledge(mutation);
        }
        self.recompute();
    }
}
