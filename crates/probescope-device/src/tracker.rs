use std::time::{Duration, Instant};

use probescope_message::Message;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::{DeviceError, Result};

/// State of the single outstanding sample request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingRequest {
    Idle,
    AwaitingSamples { issued: Instant, deadline: Instant },
}

/// Correlates a sample request with the block that answers it.
///
/// At most one request is outstanding. It ends when any sample block arrives
/// or when its deadline passes; there is no other cancellation.
#[derive(Debug)]
pub struct RequestTracker<C> {
    clock: C,
    timeout: Duration,
    state: PendingRequest,
    completed: u64,
    expired: u64,
}

impl<C: Clock> RequestTracker<C> {
    pub fn new(clock: C, timeout: Duration) -> Self {
        Self {
            clock,
            timeout,
            state: PendingRequest::Idle,
            completed: 0,
            expired: 0,
        }
    }

    /// Open a request. Fails while an earlier one is pending and unexpired.
    pub fn begin(&mut self) -> Result<Instant> {
        self.expire();
        if let PendingRequest::AwaitingSamples { deadline, .. } = self.state {
            let remaining = deadline.saturating_duration_since(self.clock.now());
            return Err(DeviceError::RequestPending { remaining });
        }

        let issued = self.clock.now();
        let deadline = issued + self.timeout;
        self.state = PendingRequest::AwaitingSamples { issued, deadline };
        debug!(timeout = ?self.timeout, "sample request pending");
        Ok(deadline)
    }

    /// Account for an inbound message. Returns the round-trip time when the
    /// message answers the pending request.
    pub fn observe(&mut self, message: &Message) -> Option<Duration> {
        let Message::Samples(_) = message else {
            return None;
        };
        self.expire();
        let PendingRequest::AwaitingSamples { issued, .. } = self.state else {
            return None;
        };
        self.state = PendingRequest::Idle;
        self.completed += 1;
        let elapsed = self.clock.now().saturating_duration_since(issued);
        debug!(?elapsed, "sample request answered");
        Some(elapsed)
    }

    /// Drop the pending request if its deadline has passed.
    pub fn expire(&mut self) -> bool {
        match self.state {
            PendingRequest::AwaitingSamples { deadline, .. } if self.clock.now() >= deadline => {
                self.state = PendingRequest::Idle;
                self.expired += 1;
                warn!(timeout = ?self.timeout, "sample request expired without a reply");
                true
            }
            _ => false,
        }
    }

    /// Forget the pending request, e.g. because sending it failed.
    pub fn cancel(&mut self) {
        self.state = PendingRequest::Idle;
    }

    /// True while a request is outstanding and unexpired.
    pub fn is_pending(&self) -> bool {
        match self.state {
            PendingRequest::AwaitingSamples { deadline, .. } => self.clock.now() < deadline,
            PendingRequest::Idle => false,
        }
    }

    pub fn state(&self) -> PendingRequest {
        self.state
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Requests answered so far.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Requests that expired unanswered so far.
    pub fn expired(&self) -> u64 {
        self.expired
    }
}

#[cfg(test)]
mod tests {
    use probescope_message::{Message, RegisterWriteAck, SampleBlock};

    use super::*;
    use crate::clock::ManualClock;

    fn tracker() -> (RequestTracker<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (RequestTracker::new(clock.clone(), Duration::from_secs(1)), clock)
    }

    fn samples() -> Message {
        Message::Samples(SampleBlock::new(1, vec![0]))
    }

    #[test]
    fn second_request_rejected_until_deadline() {
        let (mut tracker, clock) = tracker();
        tracker.begin().unwrap();

        clock.advance(Duration::from_millis(400));
        match tracker.begin() {
            Err(DeviceError::RequestPending { remaining }) => {
                assert_eq!(remaining, Duration::from_millis(600));
            }
            other => panic!("expected RequestPending, got {other:?}"),
        }

        clock.advance(Duration::from_millis(600));
        assert!(!tracker.is_pending());
        tracker.begin().unwrap();
        assert_eq!(tracker.expired(), 1);
    }

    #[test]
    fn sample_block_completes_request() {
        let (mut tracker, clock) = tracker();
        tracker.begin().unwrap();
        clock.advance(Duration::from_millis(30));

        assert_eq!(tracker.observe(&samples()), Some(Duration::from_millis(30)));
        assert_eq!(tracker.state(), PendingRequest::Idle);
        assert_eq!(tracker.completed(), 1);
        tracker.begin().unwrap();
    }

    #[test]
    fn other_messages_leave_request_pending() {
        let (mut tracker, _clock) = tracker();
        tracker.begin().unwrap();

        let ack = Message::WriteAck(RegisterWriteAck { bytes_written: 1 });
        assert_eq!(tracker.observe(&ack), None);
        assert!(tracker.is_pending());
    }

    #[test]
    fn unsolicited_block_is_not_a_reply() {
        let (mut tracker, _clock) = tracker();
        assert_eq!(tracker.observe(&samples()), None);
        assert_eq!(tracker.completed(), 0);
    }

    #[test]
    fn late_block_after_expiry_is_not_counted() {
        let (mut tracker, clock) = tracker();
        tracker.begin().unwrap();
        clock.advance(Duration::from_secs(2));

        assert_eq!(tracker.observe(&samples()), None);
        assert_eq!(tracker.expired(), 1);
        assert_eq!(tracker.completed(), 0);
    }

    #[test]
    fn cancel_releases_request() {
        let (mut tracker, _clock) = tracker();
        tracker.begin().unwrap();
        tracker.cancel();
        assert!(!tracker.is_pending());
        assert_eq!(tracker.expired(), 0);
    }
}
