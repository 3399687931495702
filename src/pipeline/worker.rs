//! Background worker for processing runs.
//!
//! Runs execute on a dedicated thread and stream events over a channel:
//! periodic `Progress` updates followed by exactly one terminal event
//! (`Completed`, `Cancelled`, or `Failed`). The caller keeps a
//! [`RunHandle`] to receive events and to request cancellation.

use crate::model::TraceData;
use crate::pipeline::{process_file, CancellationToken, RunOutcome};
use crate::utils::error::ProcessError;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, warn};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

/// Event emitted by a background run
#[derive(Debug)]
pub enum RunEvent {
    /// Whole-percent progress update
    Progress(u8),
    /// Run finished; carries the full aggregate
    Completed(Box<TraceData>),
    /// Run stopped after a cancel request
    Cancelled,
    /// Run aborted on a structural fault
    Failed(ProcessError),
}

/// Handle to a background run
#[derive(Debug)]
pub struct RunHandle {
    events: Receiver<RunEvent>,
    cancel: CancellationToken,
    thread: JoinHandle<()>,
}

impl RunHandle {
    /// Ask the run to stop. Takes effect at the next line boundary.
    pub fn cancel(&self) {
        self.cancel.request();
    }

    pub fn events(&self) -> &Receiver<RunEvent> {
        &self.events
    }

    /// Wait for the worker thread to exit
    pub fn join(self) {
        if self.thread.join().is_err() {
            warn!("Run worker thread panicked");
        }
    }
}

/// Start processing `path` on a background thread.
pub fn spawn_run(path: PathBuf) -> RunHandle {
    let (sender, events): (Sender<RunEvent>, Receiver<RunEvent>) = unbounded();
    let cancel = CancellationToken::new();
    let worker_cancel = cancel.clone();

    let thread = thread::spawn(move || {
        debug!("Worker started for {}", path.display());

        let progress_sender = sender.clone();
        let result = process_file(&path, &worker_cancel, move |percent| {
            // Receiver may be gone if the caller dropped the handle
            let _ = progress_sender.send(RunEvent::Progress(percent));
        });

        let terminal = match result {
            Ok(RunOutcome::Completed(data)) => RunEvent::Completed(Box::new(data)),
            Ok(RunOutcome::Cancelled) => RunEvent::Cancelled,
            Err(error) => RunEvent::Failed(error),
        };
        let _ = sender.send(terminal);
    });

    RunHandle {
        events,
        cancel,
        thread,
    }
}
