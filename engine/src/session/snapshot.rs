use std::sync::Arc;
use tokio::sync::watch;

use crate::composed::ComposedImage;

/// What the preview side sees after one accepted frame.
///
/// Always published as a whole, so an image is never paired with another
/// tick's match flag.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub image: Arc<ComposedImage>,
    /// Whether this tick's frame was seeded or stitched.
    pub matched: bool,
    /// Correlation score of this tick's match attempt; `None` for the seed frame.
    pub confidence: Option<f64>,
    pub frame_count: u32,
    pub stitch_count: u32,
}

/// Consumer of per-tick snapshots (preview panel, status indicator).
///
/// Called from the sampling task once per accepted frame, never for
/// duplicates or capture faults. Must not block.
pub trait PreviewSink: Send + Sync {
    fn on_snapshot(&self, snapshot: &Snapshot);
}

/// The single "latest snapshot" cell shared with the UI side.
///
/// Backed by a watch channel: readers either peek at the latest value or
/// await the next change.
#[derive(Clone)]
pub struct SnapshotSlot {
    tx: Arc<watch::Sender<Option<Snapshot>>>,
}

impl SnapshotSlot {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn latest(&self) -> Option<Snapshot> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Snapshot>> {
        self.tx.subscribe()
    }
}

impl Default for SnapshotSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewSink for SnapshotSlot {
    fn on_snapshot(&self, snapshot: &Snapshot) {
        // send_replace stores even with no receiver attached.
        self.tx.send_replace(Some(snapshot.clone()));
    }
}
