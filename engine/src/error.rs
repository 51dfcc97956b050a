use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StitchError {
    #[error("cannot allocate {bytes} bytes for the composed image")]
    Allocation { bytes: usize },
    #[error("frame width {frame} does not match composed width {composed}")]
    WidthMismatch { composed: u32, frame: u32 },
    #[error("composed buffer does not fit {width}x{height}")]
    Layout { width: u32, height: u32 },
}

/// Non-recoverable fault inside the sampling loop.
///
/// The loop stops at once and hands back whatever it had composed before.
#[derive(Debug, thiserror::Error)]
pub enum LoopFault {
    #[error("stitch failed: {0}")]
    Stitch(#[from] StitchError),
    /// The worker running a tick panicked; its state is gone.
    #[error("sampling worker failed: {0}")]
    Worker(String),
}

/// Failure to collect a session's result from the caller's side.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The sampling task did not exit in time; a capture call is hanging.
    /// Abandon the task, do not retry.
    #[error("sampling task did not exit within {0:?}")]
    JoinTimeout(Duration),
    #[error("sampling task panicked: {0}")]
    Panicked(String),
}
