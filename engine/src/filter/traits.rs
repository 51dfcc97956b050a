use longshot_common::frame::Frame;

/// Duplicate-frame detection between two consecutive samples.
///
/// Implementations decide whether the user has scrolled since `prev` was
/// captured. A duplicate is dropped before any matching work is done.
pub trait FrameFilter: Send + Sync {
    /// Returns `true` if `curr` shows the same content as `prev`.
    fn is_duplicate(&self, prev: &Frame, curr: &Frame) -> bool;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}
