use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use longshot_common::frame::{Frame, Region};
use longshot_engine::{CaptureFault, FrameSource};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::ReplayError;

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Replays recorded frames from a directory, in file-name order.
///
/// Once every file has been handed out the stop token is cancelled, the
/// same way a user pressing "done" would end a live capture.
pub struct DirectorySource {
    pending: VecDeque<PathBuf>,
    stop: CancellationToken,
}

impl DirectorySource {
    pub fn open(dir: &Path, stop: CancellationToken) -> Result<Self, ReplayError> {
        let entries =
            std::fs::read_dir(dir).map_err(|e| ReplayError::ReadDir(dir.display().to_string(), e))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_frame_file(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(ReplayError::NoFrames(dir.display().to_string()));
        }
        info!(dir = %dir.display(), frames = paths.len(), "frame directory opened");

        Ok(Self {
            pending: paths.into(),
            stop,
        })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Region covering the first frame; every later frame must match it.
    pub fn region(&self) -> Result<Region, ReplayError> {
        let first = self
            .pending
            .front()
            .ok_or_else(|| ReplayError::NoFrames("<empty>".into()))?;
        let (width, height) = image::image_dimensions(first)?;
        Ok(Region::from_origin_size(0, 0, width, height)?)
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for DirectorySource {
    fn capture(&mut self, _region: &Region) -> Result<Frame, CaptureFault> {
        let Some(path) = self.pending.pop_front() else {
            if !self.stop.is_cancelled() {
                info!("all recorded frames replayed, stopping");
                self.stop.cancel();
            }
            return Err(CaptureFault::NoData);
        };

        debug!(path = %path.display(), remaining = self.pending.len(), "replaying frame");
        let image = image::open(&path)
            .map_err(|e| CaptureFault::Backend(format!("{}: {e}", path.display())))?;
        Ok(Frame::new(image.to_rgb8()))
    }

    fn name(&self) -> &str {
        "directory"
    }
}
