use longshot_common::frame::{Frame, Region};

/// Screen-pixel acquisition for one region.
///
/// `capture` must return promptly: the session never interrupts a call in
/// flight, so a hanging capture is what makes a session miss its join
/// deadline.
pub trait FrameSource: Send {
    fn capture(&mut self, region: &Region) -> Result<Frame, CaptureFault>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

impl<F> FrameSource for F
where
    F: FnMut(&Region) -> Result<Frame, CaptureFault> + Send,
{
    fn capture(&mut self, region: &Region) -> Result<Frame, CaptureFault> {
        self(region)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

/// A capture that produced nothing usable this tick. Always transient.
#[derive(Debug, thiserror::Error)]
pub enum CaptureFault {
    #[error("capture returned no data")]
    NoData,
    #[error("captured {got_width}x{got_height} frame for a {width}x{height} region")]
    DimensionMismatch {
        got_width: u32,
        got_height: u32,
        width: u32,
        height: u32,
    },
    #[error("capture backend error: {0}")]
    Backend(String),
}
