use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::{StoredObject, TransferControl, TransferEvent, UploadId, UploadProgress};

/// Handle to a transfer started with [`ObjectStore::start_resumable_upload`].
///
/// Events arrive in order through [`ResumableUpload::next_event`]. The run
/// state is steered through the handle itself or a detached
/// [`TransferController`].
///
/// [`ObjectStore::start_resumable_upload`]: crate::ObjectStore::start_resumable_upload
pub struct ResumableUpload {
    id: UploadId,
    events: mpsc::UnboundedReceiver<TransferEvent>,
    control: TransferController,
}

/// Cloneable remote for pausing, resuming and cancelling a transfer
#[derive(Clone)]
pub struct TransferController {
    upload_id: UploadId,
    state: Arc<watch::Sender<TransferControl>>,
}

/// Backend side of a transfer: reports events and observes the run state
pub struct TransferReporter {
    upload_id: UploadId,
    events: mpsc::UnboundedSender<TransferEvent>,
    control: watch::Receiver<TransferControl>,
}

impl ResumableUpload {
    /// Create a connected handle/reporter pair
    pub fn channel() -> (Self, TransferReporter) {
        let id = UploadId::new();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = watch::channel(TransferControl::Running);

        let upload = Self {
            id: id.clone(),
            events: event_rx,
            control: TransferController {
                upload_id: id.clone(),
                state: Arc::new(control_tx),
            },
        };
        let reporter = TransferReporter {
            upload_id: id,
            events: event_tx,
            control: control_rx,
        };
        (upload, reporter)
    }

    pub fn id(&self) -> &UploadId {
        &self.id
    }

    /// Next event, or `None` once the backend has gone away
    pub async fn next_event(&mut self) -> Option<TransferEvent> {
        self.events.recv().await
    }

    pub fn controller(&self) -> TransferController {
        self.control.clone()
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn cancel(&self) {
        self.control.cancel();
    }
}

impl TransferController {
    pub fn upload_id(&self) -> &UploadId {
        &self.upload_id
    }

    pub fn state(&self) -> TransferControl {
        *self.state.borrow()
    }

    /// Pause a running transfer. Returns false if it was not running.
    pub fn pause(&self) -> bool {
        self.transition(TransferControl::Running, TransferControl::Paused)
    }

    /// Resume a paused transfer. Returns false if it was not paused.
    pub fn resume(&self) -> bool {
        self.transition(TransferControl::Paused, TransferControl::Running)
    }

    /// Cancel the transfer. Cancellation is final.
    pub fn cancel(&self) {
        self.state.send_replace(TransferControl::Cancelled);
    }

    fn transition(&self, from: TransferControl, to: TransferControl) -> bool {
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }
}

impl TransferReporter {
    pub fn upload_id(&self) -> &UploadId {
        &self.upload_id
    }

    /// Report progress. Returns false when nobody is listening anymore.
    pub fn progress(&self, bytes_transferred: u64, total_bytes: u64) -> bool {
        self.events
            .send(TransferEvent::Progress(UploadProgress::new(
                bytes_transferred,
                total_bytes,
            )))
            .is_ok()
    }

    pub fn fail<S: Into<String>>(self, reason: S) {
        let _ = self.events.send(TransferEvent::Failed {
            reason: reason.into(),
        });
    }

    pub fn cancelled(self) {
        let _ = self.events.send(TransferEvent::Cancelled);
    }

    pub fn complete(self, object: StoredObject) {
        let _ = self.events.send(TransferEvent::Completed(object));
    }

    /// Wait out a pause. Resolves with `Running` or `Cancelled`; a dropped
    /// handle counts as cancelled.
    pub async fn checkpoint(&mut self) -> TransferControl {
        loop {
            let state = *self.control.borrow_and_update();
            if state != TransferControl::Paused {
                return state;
            }
            if self.control.changed().await.is_err() {
                return TransferControl::Cancelled;
            }
        }
    }

    /// Resolve once the transfer is cancelled or its handle is dropped
    pub async fn wait_for_cancel(&mut self) {
        loop {
            if *self.control.borrow_and_update() == TransferControl::Cancelled {
                return;
            }
            if self.control.changed().await.is_err() {
                return;
            }
        }
    }
}
