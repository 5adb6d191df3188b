//! The upload page: selection, transfer, record, confirmation, redirect.
//!
//! Every selection starts a new *generation*. Transfer events, timers and
//! retries carry the generation they were started for and are ignored once it
//! is stale, so a superseded upload can never move the page or navigate.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use dropshare_blob::{
    ObjectKeyStrategy, ObjectStore, PrefixKeyStrategy, ResumableUpload, StoredObject,
    TransferController, TransferEvent, UploadId, UploadMetadata, UploadProgress,
};
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    DocumentStore, IdentityProvider, IdentityState, Navigator, RandomRecordIds, RecordId,
    RecordIdGenerator, SelectedFile, UploadConfig, UploadError, UploadRecord, UploadResult,
};

/// Attempts at drawing an unused record id before giving up
const MAX_ID_ATTEMPTS: usize = 16;

/// Step of the flow that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStep {
    Transfer,
    DownloadUrl,
    SaveRecord,
}

/// Where the page is in the upload flow
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Idle,
    Uploading,
    Paused,
    /// Bytes are stored; the completion view shows after the confirm delay
    Uploaded,
    /// Completion view; redirects once the record is saved and the delay passed
    Completed,
    Redirected,
    Failed { step: FailedStep, reason: String },
}

/// Snapshot of what the upload and completion views render
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub stage: Stage,
    /// Percentage in `[0, 100]`
    pub progress: f64,
    pub record_id: Option<RecordId>,
    pub share_url: Option<String>,
}

impl Default for PageView {
    fn default() -> Self {
        Self {
            stage: Stage::Idle,
            progress: 0.0,
            record_id: None,
            share_url: None,
        }
    }
}

impl PageView {
    /// Whether the completion view replaces the form
    pub fn shows_completion(&self) -> bool {
        self.stage == Stage::Completed
    }

    pub fn failure(&self) -> Option<(FailedStep, &str)> {
        match &self.stage {
            Stage::Failed { step, reason } => Some((*step, reason.as_str())),
            _ => None,
        }
    }
}

/// What `retry` picks up after a failure
enum Resume {
    Transfer { file: SelectedFile },
    Finish(Finish),
}

/// Steps that follow a stored transfer
enum Finish {
    DownloadUrl { file: SelectedFile, object: StoredObject },
    SaveRecord { record: UploadRecord },
}

struct PageState {
    view: PageView,
    generation: u64,
    transfer: Option<TransferController>,
    driver: Option<JoinHandle<()>>,
    confirm_timer: Option<JoinHandle<()>>,
    redirect_timer: Option<JoinHandle<()>>,
    /// Persisted record waiting for the preview redirect
    saved: Option<RecordId>,
    resume: Option<Resume>,
    issued_ids: HashSet<RecordId>,
    unmounted: bool,
}

impl PageState {
    fn new() -> Self {
        Self {
            view: PageView::default(),
            generation: 0,
            transfer: None,
            driver: None,
            confirm_timer: None,
            redirect_timer: None,
            saved: None,
            resume: None,
            issued_ids: HashSet::new(),
            unmounted: false,
        }
    }

    /// Cancel everything tied to the current upload and open a new generation
    fn supersede(&mut self) -> u64 {
        if let Some(transfer) = self.transfer.take() {
            transfer.cancel();
        }
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        self.cancel_timers();
        self.saved = None;
        self.resume = None;
        self.generation += 1;
        self.generation
    }

    fn cancel_timers(&mut self) {
        for timer in [self.confirm_timer.take(), self.redirect_timer.take()]
            .into_iter()
            .flatten()
        {
            timer.abort();
        }
    }
}

struct PageInner {
    storage: Arc<dyn ObjectStore>,
    documents: Arc<dyn DocumentStore>,
    navigator: Arc<dyn Navigator>,
    keys: Arc<dyn ObjectKeyStrategy>,
    ids: Arc<dyn RecordIdGenerator>,
    identity: watch::Receiver<IdentityState>,
    config: UploadConfig,
    state: Mutex<PageState>,
    view: watch::Sender<PageView>,
    gate: Mutex<Option<JoinHandle<()>>>,
}

/// Mounted upload page.
///
/// Dropping the page unmounts it: pending timers are aborted and an active
/// transfer is cancelled.
pub struct UploadPage {
    inner: Arc<PageInner>,
}

/// Collaborators and settings for an [`UploadPage`]
pub struct UploadPageBuilder {
    storage: Arc<dyn ObjectStore>,
    documents: Arc<dyn DocumentStore>,
    navigator: Arc<dyn Navigator>,
    identity: watch::Receiver<IdentityState>,
    config: UploadConfig,
    keys: Option<Arc<dyn ObjectKeyStrategy>>,
    ids: Option<Arc<dyn RecordIdGenerator>>,
}

impl UploadPageBuilder {
    pub fn config(mut self, config: UploadConfig) -> Self {
        self.config = config;
        self
    }

    /// Override object naming; defaults to the configured key prefix
    pub fn key_strategy<K: ObjectKeyStrategy + 'static>(mut self, keys: K) -> Self {
        self.keys = Some(Arc::new(keys));
        self
    }

    /// Override record ids; defaults to random ids of the configured length
    pub fn id_generator<G: RecordIdGenerator + 'static>(mut self, ids: G) -> Self {
        self.ids = Some(Arc::new(ids));
        self
    }

    /// Mount the page and start watching identity.
    ///
    /// Must be called from within a tokio runtime.
    pub fn mount(self) -> UploadPage {
        let keys: Arc<dyn ObjectKeyStrategy> = match self.keys {
            Some(keys) => keys,
            None => Arc::new(PrefixKeyStrategy::new(self.config.key_prefix.clone())),
        };
        let ids: Arc<dyn RecordIdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(RandomRecordIds::new(self.config.record_id_length)),
        };
        let (view, _) = watch::channel(PageView::default());

        let inner = Arc::new(PageInner {
            storage: self.storage,
            documents: self.documents,
            navigator: self.navigator,
            keys,
            ids,
            identity: self.identity.clone(),
            config: self.config,
            state: Mutex::new(PageState::new()),
            view,
            gate: Mutex::new(None),
        });

        let mut identity = self.identity;
        let initial = identity.borrow_and_update().clone();
        inner.apply_identity(&initial);

        let gate = tokio::spawn(run_identity_gate(
            Arc::downgrade(&inner),
            identity,
            (initial.is_loaded, initial.is_signed_in),
        ));
        *inner.gate.lock() = Some(gate);

        debug!("Upload page mounted");
        UploadPage { inner }
    }
}

impl UploadPage {
    pub fn builder<S, D, N, I>(storage: S, documents: D, navigator: N, identity: &I) -> UploadPageBuilder
    where
        S: ObjectStore + 'static,
        D: DocumentStore + 'static,
        N: Navigator + 'static,
        I: IdentityProvider + ?Sized,
    {
        UploadPageBuilder {
            storage: Arc::new(storage),
            documents: Arc::new(documents),
            navigator: Arc::new(navigator),
            identity: identity.subscribe(),
            config: UploadConfig::default(),
            keys: None,
            ids: None,
        }
    }

    /// Hand a file over from the upload form.
    ///
    /// Without a file or a signed-in user nothing happens and the reason is
    /// returned. A selection while another upload is still running replaces it.
    ///
    /// The transfer is driven by a task owned by the page, so dropping the
    /// returned future does not stall it.
    pub async fn select_file(&self, file: Option<SelectedFile>) -> UploadResult<UploadId> {
        let file = file.ok_or(UploadError::NoFileSelected)?;
        if self.inner.identity.borrow().user.is_none() {
            debug!("Ignoring selection of {}: no signed-in user", file.name);
            return Err(UploadError::NotSignedIn);
        }
        self.inner.start_transfer(file).await
    }

    /// Pause the running transfer. Returns false if nothing is uploading.
    pub fn pause(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.view.stage != Stage::Uploading {
            return false;
        }
        let paused = state.transfer.as_ref().map_or(false, |t| t.pause());
        if paused {
            state.view.stage = Stage::Paused;
            self.inner.publish(&state);
            debug!("Upload paused at {:.1}%", state.view.progress);
        }
        paused
    }

    /// Resume a paused transfer. Returns false if nothing is paused.
    pub fn resume(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.view.stage != Stage::Paused {
            return false;
        }
        let resumed = state.transfer.as_ref().map_or(false, |t| t.resume());
        if resumed {
            state.view.stage = Stage::Uploading;
            self.inner.publish(&state);
            debug!("Upload resumed at {:.1}%", state.view.progress);
        }
        resumed
    }

    /// Abandon the running transfer or finishing step and go back to the
    /// empty form. Returns false if nothing is in flight.
    pub fn cancel(&self) -> bool {
        let mut state = self.inner.state.lock();
        let driving = state.driver.as_ref().map_or(false, |d| !d.is_finished());
        if state.transfer.is_none() && !driving {
            return false;
        }
        state.supersede();
        state.view = PageView::default();
        self.inner.publish(&state);
        info!("Upload cancelled");
        true
    }

    /// Re-run the step that failed: the transfer with the same file, or the
    /// record write with the same record id.
    ///
    /// The work runs on a task owned by the page; dropping the returned future
    /// only stops waiting for the outcome.
    pub async fn retry(&self) -> UploadResult<()> {
        let (resume, generation) = {
            let mut state = self.inner.state.lock();
            if state.unmounted {
                return Err(UploadError::Unmounted);
            }
            if !matches!(state.view.stage, Stage::Failed { .. }) {
                return Err(UploadError::NothingToRetry);
            }
            let resume = state.resume.take().ok_or(UploadError::NothingToRetry)?;
            (resume, state.generation)
        };

        match resume {
            Resume::Transfer { file } => {
                info!("Retrying upload of {}", file.name);
                self.inner.start_transfer(file).await.map(|_| ())
            }
            Resume::Finish(step) => self.inner.spawn_finish(generation, step).await,
        }
    }

    pub fn view(&self) -> PageView {
        self.inner.view.borrow().clone()
    }

    /// Change stream of the view
    pub fn subscribe(&self) -> watch::Receiver<PageView> {
        self.inner.view.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        !self.inner.state.lock().unmounted
    }

    /// Tear the page down. Idempotent.
    pub fn unmount(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.unmounted {
                return;
            }
            state.unmounted = true;
            state.supersede();
        }
        if let Some(gate) = self.inner.gate.lock().take() {
            gate.abort();
        }
        debug!("Upload page unmounted");
    }
}

impl Drop for UploadPage {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl PageInner {
    fn publish(&self, state: &PageState) {
        self.view.send_replace(state.view.clone());
    }

    /// Signed-out users are sent to sign in; this wins over any upload state
    fn apply_identity(&self, identity: &IdentityState) {
        if !identity.requires_sign_in() {
            return;
        }
        {
            let mut state = self.state.lock();
            if state.unmounted {
                return;
            }
            state.supersede();
            state.view = PageView::default();
            self.publish(&state);
        }
        warn!("No signed-in user, redirecting to {}", self.config.sign_in_route);
        self.navigator.go_to(&self.config.sign_in_route);
    }

    async fn start_transfer(self: &Arc<Self>, file: SelectedFile) -> UploadResult<UploadId> {
        let generation = {
            let mut state = self.state.lock();
            if state.unmounted {
                return Err(UploadError::Unmounted);
            }
            let generation = state.supersede();
            state.view = PageView {
                stage: Stage::Uploading,
                ..PageView::default()
            };
            self.publish(&state);
            generation
        };

        let (started_tx, started_rx) = oneshot::channel();
        let driver = tokio::spawn(run_transfer(Arc::downgrade(self), generation, file, started_tx));
        self.adopt_driver(generation, driver);

        match started_rx.await {
            Ok(result) => result,
            Err(_) => Err(self.abandoned()),
        }
    }

    /// Run the steps after a stored transfer on a page-owned task
    async fn spawn_finish(self: &Arc<Self>, generation: u64, step: Finish) -> UploadResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        let page = Arc::downgrade(self);
        let driver = tokio::spawn(async move {
            let Some(inner) = page.upgrade() else {
                return;
            };
            let result = inner.finish(generation, step).await;
            let _ = done_tx.send(result);
        });
        self.adopt_driver(generation, driver);

        match done_rx.await {
            Ok(result) => result,
            Err(_) => Err(self.abandoned()),
        }
    }

    async fn finish(self: &Arc<Self>, generation: u64, step: Finish) -> UploadResult<()> {
        match step {
            Finish::DownloadUrl { file, object } => {
                info!("Retrying download URL for {}", object.key);
                self.complete_upload(generation, file, object).await
            }
            Finish::SaveRecord { record } => {
                info!("Retrying save of record {}", record.id);
                if !self.enter_uploaded(generation) {
                    return Err(UploadError::Superseded);
                }
                self.save_record(generation, record).await
            }
        }
    }

    /// Keep `driver` as the task of `generation`, or stop it if that is stale
    fn adopt_driver(&self, generation: u64, driver: JoinHandle<()>) {
        let mut state = self.state.lock();
        if state.generation != generation {
            driver.abort();
            return;
        }
        if let Some(previous) = state.driver.replace(driver) {
            previous.abort();
        }
    }

    /// Why a driver stopped before reporting back
    fn abandoned(&self) -> UploadError {
        if self.state.lock().unmounted {
            UploadError::Unmounted
        } else {
            UploadError::Superseded
        }
    }

    fn record_progress(&self, generation: u64, progress: UploadProgress) {
        let mut state = self.state.lock();
        if state.generation != generation
            || !matches!(state.view.stage, Stage::Uploading | Stage::Paused)
        {
            return;
        }
        state.view.progress = progress.percent();
        self.publish(&state);
        debug!(
            "Upload progress {}/{} bytes ({:.1}%)",
            progress.bytes_transferred,
            progress.total_bytes,
            state.view.progress
        );
    }

    fn transfer_cancelled(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation != generation {
            return;
        }
        state.supersede();
        state.view = PageView::default();
        self.publish(&state);
        info!("Transfer cancelled by the store");
    }

    fn fail(&self, generation: u64, step: FailedStep, reason: String, resume: Resume) {
        let mut state = self.state.lock();
        if state.generation != generation {
            return;
        }
        if let Some(transfer) = state.transfer.take() {
            transfer.cancel();
        }
        state.cancel_timers();
        state.saved = None;
        state.resume = Some(resume);
        state.view.stage = Stage::Failed { step, reason };
        self.publish(&state);
    }

    /// Mark the bytes as stored and start the confirmation timer
    fn enter_uploaded(self: &Arc<Self>, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        state.transfer = None;
        state.view.progress = 100.0;
        state.view.stage = Stage::Uploaded;
        self.schedule_confirmation(&mut state, generation);
        self.publish(&state);
        true
    }

    async fn complete_upload(
        self: &Arc<Self>,
        generation: u64,
        file: SelectedFile,
        object: StoredObject,
    ) -> UploadResult<()> {
        if !self.enter_uploaded(generation) {
            return Err(UploadError::Superseded);
        }
        info!("Upload of {} finished ({} bytes)", file.name, object.size_bytes);

        let file_url = match self.storage.download_url(&object).await {
            Ok(url) => url,
            Err(e) => {
                error!("Could not resolve download URL for {}: {}", object.key, e);
                self.fail(
                    generation,
                    FailedStep::DownloadUrl,
                    e.to_string(),
                    Resume::Finish(Finish::DownloadUrl { file, object }),
                );
                return Err(e.into());
            }
        };

        let record = match self.issue_record(generation, &file, file_url) {
            Ok(record) => record,
            Err(UploadError::Superseded) => return Err(UploadError::Superseded),
            Err(e) => {
                error!("Could not create record for {}: {}", file.name, e);
                self.fail(
                    generation,
                    FailedStep::SaveRecord,
                    e.to_string(),
                    Resume::Finish(Finish::DownloadUrl { file, object }),
                );
                return Err(e);
            }
        };

        self.save_record(generation, record).await
    }

    /// Draw a fresh record id and build the record around it
    fn issue_record(
        &self,
        generation: u64,
        file: &SelectedFile,
        file_url: String,
    ) -> UploadResult<UploadRecord> {
        let mut state = self.state.lock();
        if state.generation != generation {
            return Err(UploadError::Superseded);
        }

        let id = (0..MAX_ID_ATTEMPTS)
            .map(|_| self.ids.generate())
            .find(|id| !state.issued_ids.contains(id))
            .ok_or(UploadError::IdExhausted {
                attempts: MAX_ID_ATTEMPTS,
            })?;
        state.issued_ids.insert(id.clone());

        let user = self.identity.borrow().user.clone();
        let record = UploadRecord::new(id, file, file_url, user.as_ref(), &self.config);

        state.view.record_id = Some(record.id.clone());
        state.view.share_url = Some(record.short_url.clone());
        self.publish(&state);
        Ok(record)
    }

    async fn save_record(self: &Arc<Self>, generation: u64, record: UploadRecord) -> UploadResult<()> {
        let document = match record.to_document() {
            Ok(document) => document,
            Err(e) => {
                error!("Could not serialize record {}: {}", record.id, e);
                self.fail(
                    generation,
                    FailedStep::SaveRecord,
                    e.to_string(),
                    Resume::Finish(Finish::SaveRecord { record }),
                );
                return Err(e.into());
            }
        };

        if let Err(e) = self
            .documents
            .write(&self.config.collection, record.id.as_str(), document)
            .await
        {
            error!("Error saving record {}: {}", record.id, e);
            self.fail(
                generation,
                FailedStep::SaveRecord,
                e.to_string(),
                Resume::Finish(Finish::SaveRecord { record }),
            );
            return Err(e);
        }

        info!("Saved record {} for {}", record.id, record.file_name);
        let mut state = self.state.lock();
        if state.generation == generation {
            state.saved = Some(record.id);
            self.schedule_redirect(&mut state, generation);
        }
        Ok(())
    }

    fn schedule_confirmation(self: &Arc<Self>, state: &mut PageState, generation: u64) {
        if let Some(timer) = state.confirm_timer.take() {
            timer.abort();
        }
        let page = Arc::downgrade(self);
        let delay = self.config.confirm_delay;
        state.confirm_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = page.upgrade() {
                inner.confirm(generation);
            }
        }));
    }

    fn confirm(self: &Arc<Self>, generation: u64) {
        let mut state = self.state.lock();
        if state.generation != generation || state.view.stage != Stage::Uploaded {
            return;
        }
        state.confirm_timer = None;
        state.view.stage = Stage::Completed;
        self.publish(&state);
        debug!("Showing completion view");
        self.schedule_redirect(&mut state, generation);
    }

    /// Needs both the completion view and a saved record
    fn schedule_redirect(self: &Arc<Self>, state: &mut PageState, generation: u64) {
        if state.view.stage != Stage::Completed
            || state.saved.is_none()
            || state.redirect_timer.is_some()
        {
            return;
        }
        let page = Arc::downgrade(self);
        let delay = self.config.redirect_delay;
        state.redirect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = page.upgrade() {
                inner.redirect(generation);
            }
        }));
    }

    fn redirect(&self, generation: u64) {
        let path = {
            let mut state = self.state.lock();
            if state.generation != generation || state.view.stage != Stage::Completed {
                return;
            }
            let Some(id) = state.saved.take() else {
                return;
            };
            state.redirect_timer = None;
            state.view.stage = Stage::Redirected;
            self.publish(&state);
            self.config.preview_path(id.as_str())
        };
        info!("Redirecting to {}", path);
        self.navigator.go_to(&path);
    }
}

/// Start the transfer, report the outcome of the start, then follow it
async fn run_transfer(
    page: Weak<PageInner>,
    generation: u64,
    file: SelectedFile,
    started: oneshot::Sender<UploadResult<UploadId>>,
) {
    let Some((storage, key)) = page
        .upgrade()
        .map(|inner| (inner.storage.clone(), inner.keys.object_key(&file.name)))
    else {
        return;
    };
    let metadata = UploadMetadata::new().with_content_type(file.content_type.clone());

    info!("Uploading {} ({} bytes) to {}", file.name, file.size, key);
    let result = storage
        .start_resumable_upload(&key, file.body.clone(), metadata)
        .await;
    let Some(inner) = page.upgrade() else {
        return;
    };

    let upload = match result {
        Ok(upload) => upload,
        Err(e) => {
            error!("Upload of {} could not start: {}", file.name, e);
            inner.fail(generation, FailedStep::Transfer, e.to_string(), Resume::Transfer { file });
            let _ = started.send(Err(e.into()));
            return;
        }
    };

    let current = {
        let mut state = inner.state.lock();
        if state.generation == generation {
            state.transfer = Some(upload.controller());
            true
        } else {
            false
        }
    };
    if !current {
        upload.cancel();
        let _ = started.send(Err(inner.abandoned()));
        return;
    }
    drop(inner);

    let _ = started.send(Ok(upload.id().clone()));
    drive_transfer(page, generation, upload, file).await;
}

async fn drive_transfer(
    page: Weak<PageInner>,
    generation: u64,
    mut upload: ResumableUpload,
    file: SelectedFile,
) {
    while let Some(event) = upload.next_event().await {
        let Some(inner) = page.upgrade() else {
            return;
        };
        match event {
            TransferEvent::Progress(progress) => inner.record_progress(generation, progress),
            TransferEvent::Failed { reason } => {
                error!("Upload {} of {} failed: {}", upload.id(), file.name, reason);
                inner.fail(generation, FailedStep::Transfer, reason, Resume::Transfer { file });
                return;
            }
            TransferEvent::Cancelled => {
                inner.transfer_cancelled(generation);
                return;
            }
            TransferEvent::Completed(object) => {
                // Failures are already logged and published on the view
                let _ = inner.complete_upload(generation, file, object).await;
                return;
            }
        }
    }

    if let Some(inner) = page.upgrade() {
        warn!("Upload {} ended without a result", upload.id());
        inner.fail(
            generation,
            FailedStep::Transfer,
            "transfer ended without a result".to_string(),
            Resume::Transfer { file },
        );
    }
}

async fn run_identity_gate(
    page: Weak<PageInner>,
    mut identity: watch::Receiver<IdentityState>,
    mut last: (bool, bool),
) {
    while identity.changed().await.is_ok() {
        let state = identity.borrow_and_update().clone();
        let key = (state.is_loaded, state.is_signed_in);
        if key == last {
            continue;
        }
        last = key;
        let Some(inner) = page.upgrade() else {
            return;
        };
        inner.apply_identity(&state);
    }
}
