use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::SessionError;
use crate::source::FrameSource;

use super::snapshot::{Snapshot, SnapshotSlot};
use super::state::{CaptureSession, SessionOutcome, SessionState};

/// Caller-side ownership of a running sampling task.
///
/// Dropping the handle without joining detaches the task; it still stops
/// once its stop token is cancelled or the frame cap is hit.
pub struct SessionHandle {
    stop: CancellationToken,
    slot: SnapshotSlot,
    state: watch::Receiver<SessionState>,
    task: JoinHandle<SessionOutcome>,
}

impl SessionHandle {
    pub fn spawn<S: FrameSource + 'static>(session: CaptureSession<S>) -> Self {
        let stop = session.stop_token();
        let slot = session.snapshots();
        let state = session.state_watch();
        let task = tokio::spawn(session.run());
        Self {
            stop,
            slot,
            state,
            task,
        }
    }

    /// Set the stop signal. Idempotent; the task exits within one capture interval.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn latest(&self) -> Option<Snapshot> {
        self.slot.latest()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Snapshot>> {
        self.slot.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the session and wait for its result.
    pub async fn finish(self, timeout: Duration) -> Result<SessionOutcome, SessionError> {
        self.stop();
        self.join(timeout).await
    }

    /// Wait for the session to end on its own (frame cap) or after `stop`.
    ///
    /// On timeout the task is abandoned, not aborted: a capture call that
    /// hangs cannot be interrupted safely.
    pub async fn join(self, timeout: Duration) -> Result<SessionOutcome, SessionError> {
        match tokio::time::timeout(timeout, self.task).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(SessionError::Panicked(e.to_string())),
            Err(_) => {
                warn!(?timeout, "sampling task did not exit in time, abandoning it");
                Err(SessionError::JoinTimeout(timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::page_frame;
    use crate::session::state::{SessionConfig, TerminationReason};
    use crate::source::CaptureFault;
    use longshot_common::frame::{Frame, Region};
    use std::time::Instant;

    fn region() -> Region {
        Region::new(0, 0, 64, 60).unwrap()
    }

    fn scrolling_source() -> impl FnMut(&Region) -> Result<Frame, CaptureFault> + Send {
        let mut top = 0;
        move |_: &Region| {
            let frame = page_frame(40, 64, 60, top);
            top += 25;
            Ok::<_, CaptureFault>(frame)
        }
    }

    #[tokio::test]
    async fn finish_stops_and_returns_outcome() {
        let config = SessionConfig {
            capture_interval: Duration::from_millis(5),
            ..SessionConfig::default()
        };
        let handle = CaptureSession::new(region(), config, scrolling_source()).spawn();
        let mut rx = handle.subscribe();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_some());

        let outcome = handle.finish(Duration::from_secs(3)).await.unwrap();
        assert!(matches!(outcome.reason, TerminationReason::UserStop));
        assert!(outcome.frame_count >= 1);
        let image = outcome.image.unwrap();
        assert_eq!(image.height(), 60 + 25 * outcome.stitch_count);
    }

    #[tokio::test]
    async fn join_waits_for_frame_cap() {
        let config = SessionConfig {
            capture_interval: Duration::from_millis(1),
            max_frames: 4,
            ..SessionConfig::default()
        };
        let handle = CaptureSession::new(region(), config, scrolling_source()).spawn();
        let stop = handle.stop_token();

        let outcome = handle.join(Duration::from_secs(3)).await.unwrap();
        assert!(matches!(outcome.reason, TerminationReason::MaxFramesReached));
        assert_eq!(outcome.frame_count, 4);
        assert_eq!(outcome.stitch_count, 3);
        assert_eq!(outcome.image.unwrap().height(), 135);
        assert!(!stop.is_cancelled());
    }

    #[tokio::test]
    async fn hanging_capture_times_out() {
        let source = |_: &Region| {
            std::thread::sleep(Duration::from_millis(800));
            Err::<Frame, _>(CaptureFault::NoData)
        };
        let handle = CaptureSession::new(region(), SessionConfig::default(), source).spawn();

        // The runtime stays responsive while the capture blocks.
        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_millis(500));

        let err = handle.finish(Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, SessionError::JoinTimeout(_)));
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn state_is_visible_through_the_handle() {
        let config = SessionConfig {
            capture_interval: Duration::from_millis(5),
            ..SessionConfig::default()
        };
        let handle = CaptureSession::new(region(), config, scrolling_source()).spawn();
        let mut rx = handle.subscribe();
        rx.changed().await.unwrap();
        assert_eq!(handle.state(), SessionState::Sampling);

        handle.stop();
        while !handle.is_finished() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(handle.state(), SessionState::Terminated);
        handle.join(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn latest_is_empty_before_first_frame() {
        let source = |_: &Region| Err::<Frame, _>(CaptureFault::NoData);
        let handle = CaptureSession::new(region(), SessionConfig::default(), source).spawn();
        assert!(handle.latest().is_none());
        let outcome = handle.finish(Duration::from_secs(3)).await.unwrap();
        assert!(outcome.image.is_none());
        assert_eq!(outcome.frame_count, 0);
    }
}
