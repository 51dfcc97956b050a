pub mod handle;
pub mod snapshot;
pub mod state;

pub use handle::SessionHandle;
pub use snapshot::{PreviewSink, Snapshot, SnapshotSlot};
pub use state::{CaptureSession, SessionConfig, SessionOutcome, SessionState, TerminationReason};
