use crate::transport::RelayOutcome;

/// Where a single recipient is in its send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    /// Not yet attempted in this campaign.
    Pending,

    /// The request to the relay is in flight. At most one recipient is ever in this
    /// state.
    Sending,

    /// The relay accepted the email.
    Success,

    /// The relay rejected the email, the request failed, or the response could not
    /// be understood.
    Failed,
}

impl DispatchStatus {
    pub fn completed(&self) -> bool {
        match *self {
            DispatchStatus::Pending | DispatchStatus::Sending => false,
            _ => true,
        }
    }

    // Statuses only move forward: pending -> sending -> success|failed
    fn rank(&self) -> u8 {
        match *self {
            DispatchStatus::Pending => 0,
            DispatchStatus::Sending => 1,
            DispatchStatus::Success | DispatchStatus::Failed => 2,
        }
    }

    pub fn can_advance_to(&self, next: DispatchStatus) -> bool {
        next.rank() == self.rank() + 1
    }
}

/// Per-recipient entry of the campaign log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    /// 1-based position in send order
    pub sequence_number: usize,

    pub recipient: String,

    pub status: DispatchStatus,

    /// RFC 3339 time the send reached a terminal status
    pub completed_at: Option<String>,

    /// Short outcome text, set on terminal status
    pub message: Option<String>,

    /// Serialized payload returned by the relay (or a diagnostic stand-in)
    pub raw_response: Option<String>,
}

impl DispatchResult {
    pub fn pending(sequence_number: usize, recipient: &str) -> DispatchResult {
        DispatchResult {
            sequence_number,
            recipient: recipient.to_owned(),
            status: DispatchStatus::Pending,
            completed_at: None,
            message: None,
            raw_response: None,
        }
    }

    pub fn mark_sending(&mut self) -> bool {
        if !self.status.can_advance_to(DispatchStatus::Sending) {
            return false;
        }
        self.status = DispatchStatus::Sending;
        true
    }

    /// Move to the terminal status carried by `outcome`. Returns false (and changes
    /// nothing) if this entry is not currently sending.
    pub fn complete(&mut self, outcome: &RelayOutcome, completed_at: String) -> bool {
        let next = if outcome.success {
            DispatchStatus::Success
        } else {
            DispatchStatus::Failed
        };
        if !self.status.can_advance_to(next) {
            return false;
        }

        self.status = next;
        self.completed_at = Some(completed_at);
        self.message = Some(match outcome.message {
            Some(ref m) => m.clone(),
            None if outcome.success => "Done".to_owned(),
            None => "Failed".to_owned(),
        });
        self.raw_response = Some(outcome.raw.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_monotonic() {
        let mut r = DispatchResult::pending(1, "a@x.com");
        let outcome = RelayOutcome {
            success: true,
            message: None,
            raw: json!({"status": "success"}),
        };

        // Cannot finish before sending
        assert!(!r.complete(&outcome, "t".to_owned()));
        assert_eq!(r.status, DispatchStatus::Pending);

        assert!(r.mark_sending());
        assert!(!r.mark_sending());
        assert!(r.complete(&outcome, "t".to_owned()));
        assert_eq!(r.status, DispatchStatus::Success);
        assert_eq!(r.message.as_deref(), Some("Done"));
        assert!(r.raw_response.is_some());

        // Terminal states are final
        assert!(!r.mark_sending());
        let failed = RelayOutcome::failed("nope", json!({}));
        assert!(!r.complete(&failed, "t".to_owned()));
        assert_eq!(r.status, DispatchStatus::Success);
    }
}
