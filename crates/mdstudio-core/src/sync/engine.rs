//! Sync engine implementation

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::merge::{merge_remote, MergeReport};
use super::scheduler::PushScheduler;
use super::state::{SyncEvent, SyncState};
use super::{SyncError, SyncResult};
use crate::config::Config;
use crate::models::{
    title_from_heading, Mode, Note, NoteCollection, NoteRef, WELCOME_CONTENT, WELCOME_TITLE,
};
use crate::remote::{RemoteConnector, RemoteStore, SavedNote};
use crate::share::{
    decode_fragment, seal, share_url, DirectShare, ShareError, ShareResult, ShareTokenService,
};
use crate::storage::{LocalNoteStore, StorageError, StorageResult, StoredNotes};

/// Title given to imported shared notes without a heading
const SHARED_NOTE_TITLE: &str = "Shared Note";

/// Timing knobs of the engine
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub debounce: Duration,
    pub max_backoff: Duration,
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            debounce: config.debounce(),
            max_backoff: config.max_backoff(),
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(2500),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// Snapshot of a note taken when its push starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushJob {
    target: NoteRef,
    version: Option<String>,
    path: Option<String>,
    title: String,
    content: String,
}

impl PushJob {
    pub fn target(&self) -> &NoteRef {
        &self.target
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

struct Connection<S> {
    credential: String,
    session: S,
}

/// Owns the note collection of the current mode and its cloud session
pub struct SyncEngine<C: RemoteConnector> {
    connector: C,
    store: LocalNoteStore,
    mode: Mode,
    notes: NoteCollection,
    /// Cloud notes edited since their last successful push
    pending: Vec<NoteRef>,
    /// Whether `notes` came from the stored cloud cache
    cache_loaded: bool,
    connection: Option<Connection<C::Session>>,
    /// Set when the remote rejected the credential during a push
    auth_blocked: bool,
    scheduler: PushScheduler,
    status: watch::Sender<SyncState>,
    status_rx: watch::Receiver<SyncState>,
    event_tx: mpsc::UnboundedSender<SyncEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<SyncEvent>>,
}

impl<C: RemoteConnector> SyncEngine<C> {
    /// Load the stored mode and its notes
    ///
    /// In cloud mode the cached copy is shown right away; call
    /// [`connect`](Self::connect) to reconcile it with the remote.
    pub fn open(connector: C, store: LocalNoteStore, options: EngineOptions) -> SyncResult<Self> {
        let mode = store.load_mode()?;
        let stored = load_stored(&store, mode)?;
        let cache_loaded = mode == Mode::Cloud && stored.is_some();

        let (notes, pending, fresh) = match stored {
            Some(StoredNotes {
                collection,
                pending,
            }) if mode == Mode::Cloud => (collection, pending, false),
            Some(stored) => (stored.collection, Vec::new(), false),
            None => (NoteCollection::with_welcome(), Vec::new(), true),
        };

        let initial = match mode {
            Mode::Local => SyncState::Local,
            Mode::Cloud if pending.is_empty() => SyncState::CloudIdle,
            Mode::Cloud => SyncState::CloudPendingSync,
        };
        let (status_tx, status_rx) = watch::channel(initial);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let engine = Self {
            connector,
            store,
            mode,
            notes,
            pending,
            cache_loaded,
            connection: None,
            auth_blocked: false,
            scheduler: PushScheduler::new(options.debounce, options.max_backoff),
            status: status_tx,
            status_rx,
            event_tx,
            event_rx: Some(event_rx),
        };

        if fresh && mode == Mode::Local {
            engine.persist()?;
        }
        debug!("Opened {} notes in {} mode", engine.notes.len(), mode);
        Ok(engine)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> SyncState {
        *self.status_rx.borrow()
    }

    /// Subscribe to state changes
    pub fn subscribe_status(&self) -> watch::Receiver<SyncState> {
        self.status_rx.clone()
    }

    /// Take the event receiver (can only be called once)
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SyncEvent>> {
        self.event_rx.take()
    }

    pub fn notes(&self) -> &NoteCollection {
        &self.notes
    }

    pub fn active(&self) -> &Note {
        self.notes.active()
    }

    pub fn pending(&self) -> &[NoteRef] {
        &self.pending
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn store(&self) -> &LocalNoteStore {
        &self.store
    }

    /// When the next push is due, if one is scheduled
    pub fn next_push_at(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    // ----- mode and connection -----

    /// Store a credential and, in cloud mode, connect with it
    pub async fn login(&mut self, credential: &str) -> SyncResult<()> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(SyncError::CredentialRequired);
        }
        self.store.save_credential(credential)?;

        if self
            .connection
            .as_ref()
            .is_some_and(|c| c.credential != credential)
        {
            self.connection = None;
        }
        self.auth_blocked = false;

        if self.mode == Mode::Cloud {
            self.connect().await?;
        }
        Ok(())
    }

    /// Forget the credential; leaves cloud mode if active
    pub fn logout(&mut self) -> SyncResult<()> {
        self.store.clear_credential()?;
        if self.mode == Mode::Cloud {
            self.switch_to_local()?;
        }
        self.connection = None;
        Ok(())
    }

    /// Enter cloud mode
    ///
    /// Refused before any state changes when no credential is stored. When
    /// there is no cloud cache yet, the active local note is carried over
    /// and pushed as a new cloud note.
    pub async fn switch_to_cloud(&mut self) -> SyncResult<MergeReport> {
        if self.mode == Mode::Cloud {
            return self.connect().await;
        }
        if self.store.credential()?.is_none() {
            return Err(SyncError::CredentialRequired);
        }

        self.persist()?;
        self.mode = Mode::Cloud;
        self.store.save_mode(Mode::Cloud)?;

        match load_stored(&self.store, Mode::Cloud)? {
            Some(stored) => {
                self.notes = stored.collection;
                self.pending = stored.pending;
                self.cache_loaded = true;
            }
            None => {
                let carried = self.notes.active().clone();
                info!("Carrying '{}' over to cloud mode", carried.title);
                self.pending = vec![carried.note_ref()];
                self.notes = NoteCollection::single(carried);
                self.cache_loaded = false;
            }
        }
        self.set_state(if self.pending.is_empty() {
            SyncState::CloudIdle
        } else {
            SyncState::CloudPendingSync
        });

        self.connect().await
    }

    /// Leave cloud mode, keeping the cloud cache and pending pushes on disk
    pub fn switch_to_local(&mut self) -> SyncResult<()> {
        if self.mode == Mode::Local {
            return Ok(());
        }
        if self.cache_loaded {
            self.persist()?;
        }
        self.connection = None;
        self.scheduler.cancel();
        self.enter_local()
    }

    /// Connect with the stored credential and merge the remote listing
    ///
    /// A no-op while already connected with the same credential. A missing
    /// or rejected credential makes the engine fall back to local mode. Any
    /// other failure leaves it in cloud mode, working from the cache and
    /// unconnected so the next call retries. The error is returned either way.
    pub async fn connect(&mut self) -> SyncResult<MergeReport> {
        if self.mode != Mode::Cloud {
            return Err(SyncError::NotConnected);
        }
        let credential = match self.store.credential()? {
            Some(c) => c,
            None => {
                let err = SyncError::CredentialRequired;
                self.fall_back(&err)?;
                return Err(err);
            }
        };
        if self
            .connection
            .as_ref()
            .is_some_and(|c| c.credential == credential)
        {
            return Ok(MergeReport::default());
        }

        match self.try_connect(credential).await {
            Ok(report) => Ok(report),
            Err(err) if err.is_auth() => {
                self.fall_back(&err)?;
                Err(err)
            }
            Err(err) => {
                self.go_offline(&err)?;
                Err(err)
            }
        }
    }

    async fn try_connect(&mut self, credential: String) -> SyncResult<MergeReport> {
        let session = self.connector.connect(&credential).await?;
        let remote = session.list_notes().await?;
        let listed = remote.len();

        let report = if self.cache_loaded {
            merge_remote(&mut self.notes, remote)
        } else {
            self.adopt_listing(&session, remote).await?
        };
        let notes = &self.notes;
        self.pending.retain(|r| notes.find(r).is_some());

        self.connection = Some(Connection {
            credential,
            session,
        });
        self.auth_blocked = false;
        self.persist()?;

        if self.pending.is_empty() {
            self.scheduler.cancel();
            self.set_state(SyncState::CloudIdle);
        } else {
            self.scheduler.arm();
            self.set_state(SyncState::CloudPendingSync);
        }

        info!(
            "Connected: {} remote notes, {} added, {} pending",
            listed,
            report.added,
            self.pending.len()
        );
        self.emit(SyncEvent::Connected {
            notes: self.notes.len(),
            added: report.added,
        });
        Ok(report)
    }

    /// Replace the placeholder view with the remote listing
    ///
    /// Unsynced notes from the view are kept in front. An empty listing with
    /// nothing carried gets the welcome note, created remotely.
    async fn adopt_listing(
        &mut self,
        session: &C::Session,
        remote: Vec<Note>,
    ) -> SyncResult<MergeReport> {
        let mut carried: Vec<Note> = self
            .notes
            .notes()
            .iter()
            .filter(|n| !n.is_remote() && self.pending.contains(&n.note_ref()))
            .cloned()
            .collect();
        let report = MergeReport {
            added: remote.len(),
            rekeyed: 0,
        };

        let mut collection = match NoteCollection::from_notes(remote, None) {
            Some(collection) => collection,
            None => match carried.pop() {
                Some(last) => NoteCollection::single(last),
                None => {
                    info!("Remote store is empty, creating the welcome note");
                    let saved = session
                        .save_note(None, None, WELCOME_TITLE, WELCOME_CONTENT)
                        .await?;
                    NoteCollection::single(Note {
                        id: saved.version,
                        path: Some(saved.path),
                        title: WELCOME_TITLE.to_string(),
                        content: WELCOME_CONTENT.to_string(),
                    })
                }
            },
        };
        for note in carried.into_iter().rev() {
            collection.prepend(note);
        }

        self.notes = collection;
        self.cache_loaded = true;
        Ok(report)
    }

    /// Re-list the remote store and merge it into the cache
    pub async fn refresh(&mut self) -> SyncResult<MergeReport> {
        let conn = self.connection.as_ref().ok_or(SyncError::NotConnected)?;
        let remote = conn.session.list_notes().await?;
        let report = merge_remote(&mut self.notes, remote);
        self.persist()?;
        debug!("Refreshed: {:?}", report);
        Ok(report)
    }

    fn fall_back(&mut self, err: &SyncError) -> SyncResult<()> {
        warn!("Cloud connection failed, falling back to local mode: {}", err);
        if self.cache_loaded {
            self.persist()?;
        }
        self.connection = None;
        self.scheduler.cancel();
        self.enter_local()?;
        self.emit(SyncEvent::FellBack(err.to_string()));
        Ok(())
    }

    fn go_offline(&mut self, err: &SyncError) -> SyncResult<()> {
        warn!("Cloud connection failed, working from the cached copy: {}", err);
        self.connection = None;
        self.scheduler.cancel();
        if self.cache_loaded || !self.pending.is_empty() {
            self.persist()?;
        }
        self.set_state(if self.pending.is_empty() {
            SyncState::CloudIdle
        } else {
            SyncState::CloudPendingSync
        });
        self.emit(SyncEvent::Offline(err.to_string()));
        Ok(())
    }

    fn enter_local(&mut self) -> SyncResult<()> {
        self.mode = Mode::Local;
        self.store.save_mode(Mode::Local)?;
        self.pending.clear();
        self.cache_loaded = false;

        match load_stored(&self.store, Mode::Local)? {
            Some(stored) => self.notes = stored.collection,
            None => {
                self.notes = NoteCollection::with_welcome();
                self.persist()?;
            }
        }
        self.set_state(SyncState::Local);
        Ok(())
    }

    // ----- edits -----

    /// Replace the active note's content
    pub fn update_active_content(&mut self, content: impl Into<String>) -> SyncResult<()> {
        let note = self.notes.active_mut();
        note.set_content(content);
        let note_ref = note.note_ref();
        self.mark_pending(note_ref);
        self.persist()?;
        Ok(())
    }

    /// Create a note named `name` and make it active
    pub fn create_note(&mut self, name: &str) -> SyncResult<Note> {
        let note = self.notes.create(name).clone();
        self.mark_pending(note.note_ref());
        self.persist()?;
        Ok(note)
    }

    /// Import a file's content as a new active note
    pub fn import_note(&mut self, file_name: &str, content: impl Into<String>) -> SyncResult<Note> {
        let note = self.notes.import(file_name, content).clone();
        self.mark_pending(note.note_ref());
        self.persist()?;
        Ok(note)
    }

    /// Import a note embedded in a link fragment
    pub fn import_shared_fragment(&mut self, fragment: &str) -> ShareResult<Note> {
        let text = decode_fragment(fragment)?;
        let title = title_from_heading(&text).unwrap_or_else(|| SHARED_NOTE_TITLE.to_string());
        let note = self.notes.prepend(Note::with_title(title, text)).clone();
        self.mark_pending(note.note_ref());
        self.persist()?;
        Ok(note)
    }

    pub fn select_note(&mut self, note_ref: &NoteRef) -> SyncResult<()> {
        if !self.notes.select(note_ref) {
            return Err(SyncError::NoteNotFound(note_ref.to_string()));
        }
        self.persist()?;
        Ok(())
    }

    /// Delete a note
    ///
    /// Cloud notes with a path are deleted remotely first, best effort: a
    /// remote failure is reported as an event and the local delete proceeds.
    pub async fn delete_note(&mut self, note_ref: &NoteRef) -> SyncResult<Note> {
        let note = self
            .notes
            .find(note_ref)
            .cloned()
            .ok_or_else(|| SyncError::NoteNotFound(note_ref.to_string()))?;

        if self.mode == Mode::Cloud {
            if let Some(ref path) = note.path {
                let result = match self.connection {
                    Some(ref conn) => conn
                        .session
                        .delete_note(path, &note.id)
                        .await
                        .map_err(SyncError::from),
                    None => Err(SyncError::NotConnected),
                };
                if let Err(e) = result {
                    warn!("Remote delete of {} failed: {}", path, e);
                    self.emit(SyncEvent::DeleteFailed(e.to_string()));
                }
            }
        }

        self.notes.delete(note_ref);
        self.pending.retain(|r| !note.matches(r));
        if self.pending.is_empty() && self.state() == SyncState::CloudPendingSync {
            self.scheduler.cancel();
            self.set_state(SyncState::CloudIdle);
        }
        self.persist()?;
        info!("Deleted note '{}'", note.title);
        Ok(note)
    }

    fn mark_pending(&mut self, note_ref: NoteRef) {
        if self.mode != Mode::Cloud {
            return;
        }
        if !self.pending.contains(&note_ref) {
            self.pending.push(note_ref);
        }
        self.scheduler.arm();
        if self.state() != SyncState::CloudSyncing {
            self.set_state(SyncState::CloudPendingSync);
        }
    }

    // ----- pushes -----

    /// Start a push of one pending note
    ///
    /// The active note goes first when it is pending, otherwise the oldest
    /// pending note. `None` when nothing can be pushed right now.
    pub fn begin_push(&mut self) -> Option<PushJob> {
        if self.mode != Mode::Cloud
            || self.connection.is_none()
            || self.auth_blocked
            || self.state() == SyncState::CloudSyncing
        {
            return None;
        }

        let notes = &self.notes;
        self.pending.retain(|r| notes.find(r).is_some());

        let active_ref = self.notes.active().note_ref();
        let target = if self.pending.contains(&active_ref) {
            active_ref
        } else {
            self.pending.first()?.clone()
        };
        let note = self.notes.find(&target)?;

        let job = PushJob {
            target: target.clone(),
            version: note.path.as_ref().map(|_| note.id.clone()),
            path: note.path.clone(),
            title: note.title.clone(),
            content: note.content.clone(),
        };
        self.scheduler.cancel();
        self.set_state(SyncState::CloudSyncing);
        debug!("Pushing {}", target);
        Some(job)
    }

    /// Send a push to the remote store
    pub async fn push_job(&self, job: &PushJob) -> SyncResult<SavedNote> {
        let conn = self.connection.as_ref().ok_or(SyncError::NotConnected)?;
        let saved = conn
            .session
            .save_note(
                job.version.as_deref(),
                job.path.as_deref(),
                &job.title,
                &job.content,
            )
            .await?;
        Ok(saved)
    }

    /// Apply the outcome of a push
    pub fn complete_push(&mut self, job: PushJob, result: SyncResult<SavedNote>) -> SyncResult<()> {
        match result {
            Ok(saved) => self.apply_saved(job, saved),
            Err(err) => {
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    fn apply_saved(&mut self, job: PushJob, saved: SavedNote) -> SyncResult<()> {
        self.scheduler.on_success();

        let edited = self
            .notes
            .find(&job.target)
            .map(|note| note.content != job.content);

        match edited {
            Some(edited) => {
                let new_ref = self
                    .notes
                    .record_version(&job.target, &saved.path, &saved.version)
                    .unwrap_or_else(|| NoteRef::Path(saved.path.clone()));
                if edited {
                    debug!("{} changed during push, keeping it pending", saved.path);
                    for r in self.pending.iter_mut().filter(|r| **r == job.target) {
                        *r = new_ref.clone();
                    }
                } else {
                    self.pending.retain(|r| *r != job.target);
                }
            }
            None => {
                warn!("{} was deleted while being pushed", saved.path);
                self.pending.retain(|r| *r != job.target);
            }
        }

        self.persist()?;
        info!("Pushed {} ({})", saved.path, saved.version);
        self.emit(SyncEvent::Pushed { path: saved.path });

        if self.pending.is_empty() {
            self.set_state(SyncState::CloudIdle);
        } else {
            self.scheduler.arm();
            self.set_state(SyncState::CloudPendingSync);
        }
        Ok(())
    }

    fn record_failure(&mut self, err: &SyncError) {
        if err.is_auth() {
            warn!("Push rejected, credential needs attention: {}", err);
            self.auth_blocked = true;
            self.scheduler.cancel();
            self.emit(SyncEvent::AuthRequired(err.to_string()));
        } else {
            let delay = self.scheduler.arm_after_failure();
            warn!("Push failed, retrying in {:?}: {}", delay, err);
            self.emit(SyncEvent::PushFailed(err.to_string()));
        }
        self.set_state(SyncState::CloudPendingSync);
    }

    /// Push one note now, ignoring the debounce
    ///
    /// Returns whether anything was pushed.
    pub async fn push_now(&mut self) -> SyncResult<bool> {
        let Some(job) = self.begin_push() else {
            return Ok(false);
        };
        let result = self.push_job(&job).await;
        self.complete_push(job, result)?;
        Ok(true)
    }

    /// Push one note if the debounce has fired
    pub async fn push_due(&mut self) -> SyncResult<bool> {
        if !self.scheduler.is_due(Instant::now()) {
            return Ok(false);
        }
        self.push_now().await
    }

    /// Wait out the debounce and push until nothing is pending
    ///
    /// Stops at the first failed push; the note stays pending.
    pub async fn settle(&mut self) -> SyncResult<()> {
        while self.can_push() {
            self.scheduler.wait().await;
            if !self.push_now().await? {
                break;
            }
        }
        Ok(())
    }

    /// Push every pending note right away
    pub async fn flush(&mut self) -> SyncResult<usize> {
        let mut pushed = 0;
        while self.push_now().await? {
            pushed += 1;
        }
        Ok(pushed)
    }

    fn can_push(&self) -> bool {
        self.mode == Mode::Cloud
            && self.connection.is_some()
            && !self.auth_blocked
            && !self.pending.is_empty()
    }

    // ----- sharing -----

    /// Share link for the active note
    pub fn share_active(&self, tokens: &ShareTokenService, base_url: &str) -> ShareResult<String> {
        if self.mode != Mode::Cloud {
            return Err(ShareError::LocalMode);
        }
        let token = tokens.create_token(self.notes.active())?;
        Ok(share_url(base_url, &token.token))
    }

    /// Encrypt the active note and upload it as a private paste
    pub async fn share_direct(&self) -> ShareResult<DirectShare> {
        if self.mode != Mode::Cloud {
            return Err(ShareError::LocalMode);
        }
        let conn = self.connection.as_ref().ok_or(ShareError::NotConnected)?;
        let sealed = seal(&self.notes.active().content)?;
        let paste_id = conn.session.create_shared_paste(&sealed.ciphertext).await?;
        info!("Uploaded encrypted share {}", paste_id);
        Ok(DirectShare {
            paste_id,
            key: sealed.key,
        })
    }

    /// Resolve a share token against the current remote listing
    pub async fn open_shared(&self, tokens: &ShareTokenService, token: &str) -> ShareResult<Note> {
        let conn = self.connection.as_ref().ok_or(ShareError::NotConnected)?;
        tokens
            .resolve_shared_note(token, || conn.session.list_notes())
            .await
    }

    // ----- internals -----

    fn persist(&self) -> StorageResult<()> {
        let pending: &[NoteRef] = match self.mode {
            Mode::Cloud => &self.pending,
            Mode::Local => &[],
        };
        self.store.save(self.mode, &self.notes, pending)
    }

    fn set_state(&self, state: SyncState) {
        if self.state() == state {
            return;
        }
        let _ = self.status.send(state);
        self.emit(SyncEvent::StatusChanged(state));
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Load a stored collection, treating unreadable data as absent
fn load_stored(store: &LocalNoteStore, mode: Mode) -> SyncResult<Option<StoredNotes>> {
    match store.load(mode) {
        Ok(stored) => Ok(stored),
        Err(StorageError::InvalidFormat { key, details }) => {
            warn!("Discarding unreadable notes under '{}': {}", key, details);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
