//! Send one email per pasted recipient through a mail relay, one at a time, with
//! a pause between sends and a live per-recipient log.
//!
//! A `Dispatcher` owns the campaign. `start` normalizes the pasted text and runs
//! the send loop on a worker thread; `pause`, `stop` and `clear` steer it, and
//! `state` and `results` let a UI watch it.

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;


pub mod campaign;
pub mod config;
pub mod dispatch_result;
pub mod error;
pub mod identity;
pub mod recipients;
pub mod relay;
pub mod storage;
pub mod transport;
mod worker;

use std::sync::{mpsc, Arc, RwLock};
use std::thread::{self, JoinHandle};

pub use crate::campaign::{CampaignPhase, CampaignState, MessageParams};
pub use crate::config::Config;
pub use crate::dispatch_result::{DispatchResult, DispatchStatus};
pub use crate::error::Error;
pub use crate::worker::WorkerStatus;

use crate::identity::{IdentityStore, SenderIdentity};
use crate::storage::ResultStorage;
use crate::transport::{HttpRelay, RelayTransport};
use crate::worker::{Command, Worker};

pub struct Dispatcher<T: RelayTransport + 'static, S: ResultStorage + 'static> {
    config: Config,
    transport: Arc<T>,
    storage: Arc<RwLock<S>>,
    state: Arc<RwLock<CampaignState>>,
    worker_status: Arc<RwLock<u8>>,
    // Control channel of the current run
    control: Option<mpsc::Sender<Command>>,
    worker: Option<JoinHandle<()>>,
    // The worker was stopped and may still be blocked on its last send
    abandoned: bool,
}

impl<S: ResultStorage + 'static> Dispatcher<HttpRelay, S> {
    /// Create a dispatcher which posts to `config.relay_url`.
    pub fn with_http_relay(config: Config, storage: S) -> Result<Dispatcher<HttpRelay, S>, Error> {
        if !config.is_valid() {
            return Err(Error::InvalidConfig);
        }
        let relay = HttpRelay::new(&config)?;
        Ok(Dispatcher::new(config, relay, storage))
    }
}

impl<T: RelayTransport + 'static, S: ResultStorage + 'static> Dispatcher<T, S> {
    /// Create an idle dispatcher.
    pub fn new(config: Config, transport: T, storage: S) -> Dispatcher<T, S> {
        Dispatcher {
            config,
            transport: Arc::new(transport),
            storage: Arc::new(RwLock::new(storage)),
            state: Arc::new(RwLock::new(CampaignState::default())),
            worker_status: Arc::new(RwLock::new(WorkerStatus::Ok as u8)),
            control: None,
            worker: None,
            abandoned: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The saved default sender, if an identity file is configured and exists
    pub fn default_identity(&self) -> Result<Option<SenderIdentity>, Error> {
        match IdentityStore::from_config(&self.config) {
            Some(store) => store.load(),
            None => Ok(None),
        }
    }

    /// Message parameters using the configured default delay
    pub fn message_params(&self, identity: &SenderIdentity, subject: &str, body: &str) -> MessageParams {
        MessageParams::new(identity, subject, body, self.config.default_delay_secs)
    }

    /// Start a campaign to the addresses in `raw_text`, or resume a paused one.
    ///
    /// A fresh start (cursor at 0) replaces the result log with one pending entry
    /// per recipient and zeroes the counters. A resume keeps the log and continues
    /// with the campaign's own recipient list from the cursor; `params` always
    /// replaces the previous message parameters.
    ///
    /// Returns as soon as the worker is running. Use `wait` to block until it
    /// finishes or pauses.
    pub fn start(&mut self, raw_text: &str, params: MessageParams) -> Result<(), Error> {
        let recipients = recipients::normalize_with(raw_text, &self.config.delimiters);
        if recipients.is_empty() {
            warn!("Refusing to start: no valid recipient addresses");
            return Err(Error::NoRecipients);
        }

        let state_lock = self.state.clone();
        let mut state = state_lock.write().map_err(|_| Error::LockPoisoned)?;
        if state.running {
            return Err(Error::AlreadyRunning);
        }
        if self.worker_busy() {
            return Err(Error::WorkerBusy);
        }
        self.reap_worker()?;

        let campaign: Vec<String> = if state.cursor == 0 {
            let results = recipients
                .iter()
                .enumerate()
                .map(|(i, r)| DispatchResult::pending(i + 1, r))
                .collect();
            self.storage
                .write()
                .map_err(|_| Error::LockPoisoned)?
                .store_all(results)
                .map_err(|e| Error::Storage(e.to_string()))?;

            state.reset_counters();
            state.total = recipients.len();
            info!("Starting campaign to {} recipients", state.total);
            recipients
        } else {
            let stored: Vec<String> = self
                .storage
                .read()
                .map_err(|_| Error::LockPoisoned)?
                .retrieve_all()
                .map_err(|e| Error::Storage(e.to_string()))?
                .into_iter()
                .map(|r| r.recipient)
                .collect();

            if stored != recipients {
                warn!(
                    "Recipient list changed while paused; resuming the paused list of {} recipients",
                    stored.len()
                );
            }
            info!("Resuming campaign at #{} of {}", state.cursor + 1, state.total);
            stored
        };

        state.running = true;
        state.paused = false;
        let generation = state.generation;
        drop(state);

        if let Ok(mut guard) = self.worker_status.write() {
            *guard = WorkerStatus::Ok as u8;
        }

        let (sender, receiver) = mpsc::channel();
        let mut worker = Worker::new(
            receiver,
            self.worker_status.clone(),
            self.state.clone(),
            self.storage.clone(),
            self.transport.clone(),
            params,
            campaign,
            generation,
        );

        self.worker = Some(thread::spawn(move || {
            worker.run();
        }));
        self.control = Some(sender);

        Ok(())
    }

    /// Ask the running campaign to pause. The send in flight, if any, completes
    /// first; the campaign stops before the next recipient. Does nothing when no
    /// campaign is running.
    pub fn pause(&self) -> Result<(), Error> {
        let mut state = self.state.write().map_err(|_| Error::LockPoisoned)?;
        if !state.running {
            debug!("Pause ignored, no campaign is running");
            return Ok(());
        }

        state.paused = true;
        if let Some(ref control) = self.control {
            let _ = control.send(Command::Pause);
        }
        info!("Pause requested");
        Ok(())
    }

    /// End the campaign now, forgetting the resume position. A send in flight
    /// still completes and is logged, but nothing after it is sent.
    pub fn stop(&mut self) -> Result<(), Error> {
        {
            let mut state = self.state.write().map_err(|_| Error::LockPoisoned)?;
            state.force_idle();
        }
        if let Some(control) = self.control.take() {
            let _ = control.send(Command::Terminate);
        }
        self.abandoned = self.worker.is_some();
        info!("Campaign stopped");
        Ok(())
    }

    /// Discard the result log and reset the counters. Not allowed while a
    /// campaign is running.
    pub fn clear(&mut self) -> Result<(), Error> {
        let state_lock = self.state.clone();
        let mut state = state_lock.write().map_err(|_| Error::LockPoisoned)?;
        if state.running {
            return Err(Error::AlreadyRunning);
        }
        if self.worker_busy() {
            return Err(Error::WorkerBusy);
        }
        self.reap_worker()?;

        self.storage
            .write()
            .map_err(|_| Error::LockPoisoned)?
            .clear()
            .map_err(|e| Error::Storage(e.to_string()))?;

        state.cursor = 0;
        state.paused = false;
        state.total = 0;
        state.reset_counters();
        debug!("Results cleared");
        Ok(())
    }

    /// Block until the current worker finishes, pauses or is stopped.
    pub fn wait(&mut self) -> Result<(), Error> {
        self.reap_worker()
    }

    /// A snapshot of the campaign state
    pub fn state(&self) -> Result<CampaignState, Error> {
        let state = self.state.read().map_err(|_| Error::LockPoisoned)?;
        Ok(state.clone())
    }

    pub fn phase(&self) -> Result<CampaignPhase, Error> {
        Ok(self.state()?.phase())
    }

    /// The result log, in send order
    pub fn results(&self) -> Result<Vec<DispatchResult>, Error> {
        let storage = self.storage.read().map_err(|_| Error::LockPoisoned)?;
        storage.retrieve_all().map_err(|e| Error::Storage(e.to_string()))
    }

    /// Determine the status of the worker of the latest run
    pub fn worker_status(&self) -> WorkerStatus {
        match self.worker_status.read() {
            Ok(guard) => WorkerStatus::from_u8(*guard),
            Err(_) => WorkerStatus::LockPoisoned,
        }
    }

    // Only a stopped worker can still be sending. Any other worker has already
    // released the campaign and is about to exit.
    fn worker_busy(&self) -> bool {
        match self.worker {
            Some(ref handle) => self.abandoned && !handle.is_finished(),
            None => false,
        }
    }

    fn reap_worker(&mut self) -> Result<(), Error> {
        self.abandoned = false;
        match self.worker.take() {
            Some(handle) => handle.join().map_err(|_| Error::WorkerPanicked),
            None => Ok(()),
        }
    }
}

impl<T: RelayTransport + 'static, S: ResultStorage + 'static> Drop for Dispatcher<T, S> {
    fn drop(&mut self) {
        if let Some(ref control) = self.control {
            let _ = control.send(Command::Terminate);
        }
    }
}
