use std::time::Duration;

use crate::identity::SenderIdentity;

/// What to send, and how long to wait between recipients
#[derive(Debug, Clone, PartialEq)]
pub struct MessageParams {
    pub from_name: String,
    pub from_email: String,
    pub subject: String,
    pub body: String,
    pub delay: Duration,
}

impl MessageParams {
    pub fn new(identity: &SenderIdentity, subject: &str, body: &str, delay_secs: u64) -> MessageParams {
        MessageParams {
            from_name: identity.from_name.clone(),
            from_email: identity.from_email.clone(),
            subject: subject.to_owned(),
            body: body.to_owned(),
            delay: Duration::from_secs(delay_secs),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> MessageParams {
        self.delay = delay;
        self
    }
}

/// Coarse view of a campaign for callers that do not care about the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignPhase {
    /// Nothing to resume. Either never started, completed, stopped or cleared.
    Idle,
    Running,
    /// Stopped at a checkpoint; `start` resumes from the cursor.
    Paused,
}

/// The whole state machine of one campaign, owned by the `Dispatcher` and written
/// only by its operations and its worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignState {
    /// Index of the next recipient that has not been sent to. 0 when idle.
    pub cursor: usize,

    /// The worker loop is executing.
    pub running: bool,

    /// A pause was requested; once `running` is false, it was honored.
    pub paused: bool,

    /// Number of recipients in the current campaign
    pub total: usize,

    pub succeeded: usize,
    pub failed: usize,

    // Bumped by stop() so a worker still blocked on a send can tell its campaign
    // was abandoned
    pub(crate) generation: u64,
}

impl CampaignState {
    pub fn phase(&self) -> CampaignPhase {
        if self.running {
            CampaignPhase::Running
        } else if self.cursor == 0 {
            CampaignPhase::Idle
        } else {
            CampaignPhase::Paused
        }
    }

    pub fn is_idle(&self) -> bool {
        self.cursor == 0 && !self.running
    }

    /// Recipients that reached a terminal status
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }

    pub(crate) fn reset_counters(&mut self) {
        self.succeeded = 0;
        self.failed = 0;
    }

    /// Force the idle state, abandoning any resume position
    pub(crate) fn force_idle(&mut self) {
        self.cursor = 0;
        self.running = false;
        self.paused = false;
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase() {
        let mut s = CampaignState::default();
        assert_eq!(s.phase(), CampaignPhase::Idle);
        assert!(s.is_idle());

        s.running = true;
        assert_eq!(s.phase(), CampaignPhase::Running);

        s.running = false;
        s.paused = true;
        s.cursor = 2;
        assert_eq!(s.phase(), CampaignPhase::Paused);
        assert!(!s.is_idle());

        let generation = s.generation;
        s.force_idle();
        assert!(s.is_idle());
        assert!(!s.paused);
        assert_eq!(s.generation, generation + 1);
    }
}
