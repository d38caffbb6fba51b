use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::{Arc, RwLock};
use std::thread;

use chrono::Utc;
use serde_json::json;

use crate::campaign::{CampaignState, MessageParams};
use crate::dispatch_result::DispatchResult;
use crate::storage::ResultStorage;
use crate::transport::{RelayOutcome, RelayTransport, SendRequest};

/// Signals from the `Dispatcher` to the worker of one run. Only looked at when the
/// loop is between recipients.
pub enum Command {
    /// Stop at the next checkpoint, remembering where to resume
    Pause,
    /// Abandon the run
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum WorkerStatus {
    Ok = 0,
    Terminated = 1,
    LockPoisoned = 2,
    StorageWriteFailed = 3,
    StorageReadFailed = 4,
    Unknown = 255,
}
impl WorkerStatus {
    pub fn from_u8(value: u8) -> WorkerStatus {
        match value {
            0 => WorkerStatus::Ok,
            1 => WorkerStatus::Terminated,
            2 => WorkerStatus::LockPoisoned,
            3 => WorkerStatus::StorageWriteFailed,
            4 => WorkerStatus::StorageReadFailed,
            _ => WorkerStatus::Unknown,
        }
    }
}

enum Checkpoint {
    Continue,
    Exit(WorkerStatus),
}

pub struct Worker<T: RelayTransport + 'static, S: ResultStorage + 'static> {
    receiver: mpsc::Receiver<Command>,

    worker_status: Arc<RwLock<u8>>,

    state: Arc<RwLock<CampaignState>>,

    // The result log, shared with readers
    storage: Arc<RwLock<S>>,

    transport: Arc<T>,

    params: MessageParams,

    // Recipients of the whole campaign; the loop starts at the state's cursor
    recipients: Vec<String>,

    // Campaign generation this run belongs to
    generation: u64,

    pause_requested: bool,
    terminated: bool,
}

impl<T: RelayTransport + 'static, S: ResultStorage + 'static> Worker<T, S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        receiver: mpsc::Receiver<Command>,
        worker_status: Arc<RwLock<u8>>,
        state: Arc<RwLock<CampaignState>>,
        storage: Arc<RwLock<S>>,
        transport: Arc<T>,
        params: MessageParams,
        recipients: Vec<String>,
        generation: u64,
    ) -> Worker<T, S> {
        Worker {
            receiver,
            worker_status,
            state,
            storage,
            transport,
            params,
            recipients,
            generation,
            pause_requested: false,
            terminated: false,
        }
    }

    pub fn run(&mut self) {
        let status = self.dispatch_all();

        match status {
            WorkerStatus::Ok => debug!("(worker) exiting"),
            WorkerStatus::Terminated => info!("(worker) terminated"),
            _ => {
                error!("(worker) failed and terminated: {:?}", status);
                self.release();
            }
        }

        if let Ok(mut guard) = self.worker_status.write() {
            *guard = status as u8;
        }
    }

    fn dispatch_all(&mut self) -> WorkerStatus {
        let start = match self.state.read() {
            Ok(guard) => guard.cursor,
            Err(_) => return WorkerStatus::LockPoisoned,
        };
        let total = self.recipients.len();

        debug!("(worker) dispatching #{}..#{}", start + 1, total);

        for index in start..total {
            if let Checkpoint::Exit(status) = self.checkpoint(index) {
                return status;
            }

            let status = self.dispatch_one(index);
            if status != WorkerStatus::Ok {
                return status;
            }

            if index + 1 < total {
                // A pause that arrived during the send skips the delay
                self.poll_commands();
                if !self.pause_requested && !self.terminated {
                    trace!("(worker) waiting {:?}", self.params.delay);
                    thread::sleep(self.params.delay);
                }
            }
        }

        self.finish()
    }

    fn poll_commands(&mut self) {
        loop {
            match self.receiver.try_recv() {
                Ok(Command::Pause) => {
                    debug!("(worker) received Pause command");
                    self.pause_requested = true;
                }
                Ok(Command::Terminate) => {
                    debug!("(worker) received Terminate command");
                    self.terminated = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.terminated = true;
                    break;
                }
            }
        }
    }

    // Runs before recipient `index` is touched. `pause()` sends while holding the
    // state lock, so a pause it accepted is either in the channel or already
    // visible as `state.paused` here.
    fn checkpoint(&mut self, index: usize) -> Checkpoint {
        let state_lock = self.state.clone();
        let mut state = match state_lock.write() {
            Ok(guard) => guard,
            Err(_) => return Checkpoint::Exit(WorkerStatus::LockPoisoned),
        };
        self.poll_commands();

        if self.terminated || state.generation != self.generation {
            debug!("(worker) campaign abandoned before #{}", index + 1);
            return Checkpoint::Exit(WorkerStatus::Terminated);
        }

        if self.pause_requested || state.paused {
            state.cursor = index;
            state.running = false;
            state.paused = true;
            info!("(worker) paused before #{} of {}", index + 1, self.recipients.len());
            return Checkpoint::Exit(WorkerStatus::Ok);
        }

        Checkpoint::Continue
    }

    fn dispatch_one(&mut self, index: usize) -> WorkerStatus {
        let sequence_number = index + 1;

        let mut result: DispatchResult = {
            let guard = match self.storage.read() {
                Ok(guard) => guard,
                Err(_) => return WorkerStatus::LockPoisoned,
            };
            match guard.retrieve(sequence_number) {
                Ok(r) => r,
                Err(e) => {
                    error!("(worker) unable to read result #{}: {}", sequence_number, e);
                    return WorkerStatus::StorageReadFailed;
                }
            }
        };

        if result.status.completed() {
            warn!(
                "(worker) #{} ({}) is already {:?}, not sending again",
                sequence_number, result.recipient, result.status
            );
            return self.advance_cursor(index, None);
        }

        // Left in Sending by a run whose final write failed. The relay may or may
        // not have taken it, so record it as failed rather than sending twice.
        if !result.mark_sending() {
            warn!(
                "(worker) #{} ({}) was interrupted mid-send, marking it failed",
                sequence_number, result.recipient
            );
            let outcome = RelayOutcome::failed(
                "Interrupted before the result was recorded",
                json!({ "error": "Interrupted before the result was recorded" }),
            );
            result.complete(&outcome, Utc::now().to_rfc3339());
            let status = self.store(&result);
            if status != WorkerStatus::Ok {
                return status;
            }
            return self.advance_cursor(index, Some(false));
        }
        let status = self.store(&result);
        if status != WorkerStatus::Ok {
            return status;
        }

        debug!("(worker) sending #{} to {}", sequence_number, result.recipient);
        let request = SendRequest::new(&self.params, &result.recipient);
        let transport = &self.transport;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| transport.send(&request))) {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("(worker) transport panicked sending to {}", result.recipient);
                RelayOutcome::failed("Transport panicked", json!({ "error": "Transport panicked" }))
            }
        };

        result.complete(&outcome, Utc::now().to_rfc3339());
        info!(
            "(worker) #{} {}: {:?} ({})",
            sequence_number,
            result.recipient,
            result.status,
            result.message.as_deref().unwrap_or("")
        );

        let status = self.store(&result);
        if status != WorkerStatus::Ok {
            return status;
        }

        self.advance_cursor(index, Some(outcome.success))
    }

    // Count the outcome and move the cursor past `index`, unless the campaign was
    // stopped while we were sending
    fn advance_cursor(&mut self, index: usize, success: Option<bool>) -> WorkerStatus {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(_) => return WorkerStatus::LockPoisoned,
        };

        match success {
            Some(true) => state.succeeded += 1,
            Some(false) => state.failed += 1,
            None => {}
        }

        if state.generation == self.generation {
            state.cursor = index + 1;
        } else {
            debug!("(worker) campaign was stopped during #{}", index + 1);
        }
        WorkerStatus::Ok
    }

    fn store(&mut self, result: &DispatchResult) -> WorkerStatus {
        let mut guard = match self.storage.write() {
            Ok(guard) => guard,
            Err(e) => {
                error!("{:?}", e);
                return WorkerStatus::LockPoisoned;
            }
        };

        if let Err(e) = guard.update(result.clone()) {
            error!("(worker) unable to store result #{}: {}", result.sequence_number, e);
            return WorkerStatus::StorageWriteFailed;
        }

        WorkerStatus::Ok
    }

    fn finish(&mut self) -> WorkerStatus {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(_) => return WorkerStatus::LockPoisoned,
        };

        if state.generation != self.generation {
            return WorkerStatus::Terminated;
        }

        state.cursor = 0;
        state.running = false;
        state.paused = false;
        info!(
            "(worker) campaign complete: {} succeeded, {} failed",
            state.succeeded, state.failed
        );
        WorkerStatus::Ok
    }

    // After a failure, leave the campaign resumable from the cursor
    fn release(&mut self) {
        if let Ok(mut state) = self.state.write() {
            if state.generation == self.generation {
                state.running = false;
            }
        }
    }
}
