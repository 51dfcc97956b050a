//! Incremental long-screenshot stitching.
//!
//! A [`CaptureSession`] samples a fixed screen region through a
//! [`FrameSource`] while the user scrolls, drops frames that did not move
//! ([`filter`]), locates each new frame's overlap with the image built so
//! far ([`matcher`]) and appends only the novel rows ([`stitcher`]).

pub mod composed;
pub mod error;
pub mod filter;
pub mod matcher;
pub mod session;
pub mod source;
pub mod stitcher;

#[cfg(test)]
pub(crate) mod fixtures;

pub use composed::ComposedImage;
pub use error::{LoopFault, SessionError, StitchError};
pub use matcher::{MatchResult, OverlapMatcher};
pub use session::{
    CaptureSession, PreviewSink, SessionConfig, SessionHandle, SessionOutcome, SessionState,
    Snapshot, SnapshotSlot, TerminationReason,
};
pub use source::{CaptureFault, FrameSource};
