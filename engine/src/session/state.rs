use std::sync::Arc;
use std::time::Duration;

use longshot_common::config::Config;
use longshot_common::frame::{Frame, Region};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::composed::ComposedImage;
use crate::error::LoopFault;
use crate::filter::pixel_diff::DEFAULT_SIMILARITY_THRESHOLD;
use crate::filter::{FrameFilter, PixelDiffFilter};
use crate::matcher::{MatchResult, OverlapMatcher, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_OVERLAP_RATIO};
use crate::source::{CaptureFault, FrameSource};
use crate::stitcher::{self, StitchOutcome};

use super::handle::SessionHandle;
use super::snapshot::{PreviewSink, Snapshot, SnapshotSlot};

/// A progress notice is logged every this many accepted frames.
const PROGRESS_EVERY: u32 = 5;

const MIN_CAPTURE_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub capture_interval: Duration,
    /// Hard cap on accepted frames; bounds memory and CPU for one session.
    pub max_frames: u32,
    pub overlap_ratio: f64,
    pub confidence_threshold: f64,
    pub similarity_threshold: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture_interval: Duration::from_millis(250),
            max_frames: 150,
            overlap_ratio: DEFAULT_OVERLAP_RATIO,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl SessionConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            capture_interval: Duration::from_millis(config.capture.interval_ms),
            max_frames: config.capture.max_frames,
            overlap_ratio: config.matching.overlap_ratio,
            confidence_threshold: config.matching.confidence_threshold,
            similarity_threshold: config.filter.similarity_threshold,
        }
    }

    /// Raise a zero frame cap or interval to the smallest usable value.
    fn clamped(mut self) -> Self {
        if self.max_frames == 0 {
            warn!("max_frames of 0 raised to 1");
            self.max_frames = 1;
        }
        if self.capture_interval < MIN_CAPTURE_INTERVAL {
            warn!(
                interval = ?self.capture_interval,
                "capture interval raised to {:?}",
                MIN_CAPTURE_INTERVAL
            );
            self.capture_interval = MIN_CAPTURE_INTERVAL;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Sampling,
    Terminated,
}

#[derive(Debug)]
pub enum TerminationReason {
    /// The stop signal was set.
    UserStop,
    /// `max_frames` accepted frames were processed.
    MaxFramesReached,
    /// The loop aborted; the image is whatever existed before the fault.
    Fault(LoopFault),
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::UserStop => "user_stop",
            TerminationReason::MaxFramesReached => "max_frames_reached",
            TerminationReason::Fault(_) => "fault",
        }
    }

    pub fn is_graceful(&self) -> bool {
        !matches!(self, TerminationReason::Fault(_))
    }
}

/// Final result of a session. The composed image is handed over here.
#[derive(Debug)]
pub struct SessionOutcome {
    /// `None` only when no frame was ever accepted.
    pub image: Option<ComposedImage>,
    pub frame_count: u32,
    pub stitch_count: u32,
    pub reason: TerminationReason,
    pub last_match: Option<MatchResult>,
}

#[derive(Debug)]
enum Tick {
    CaptureFault,
    Duplicate,
    Accepted,
}

/// Samples a fixed region while the user scrolls and grows a long image.
///
/// The outside world only sees the stop token, the state watch and the
/// snapshot slot. Each tick runs on the blocking pool, so a slow capture
/// or match never stalls the runtime.
pub struct CaptureSession<S> {
    config: SessionConfig,
    stop: CancellationToken,
    state: watch::Sender<SessionState>,
    slot: SnapshotSlot,
    sampler: Sampler<S>,
}

/// Everything one tick touches. Moved onto a blocking thread and back.
struct Sampler<S> {
    region: Region,
    source: S,
    filter: Box<dyn FrameFilter>,
    matcher: OverlapMatcher,
    slot: SnapshotSlot,
    sink: Option<Arc<dyn PreviewSink>>,
    composed: Option<Arc<ComposedImage>>,
    last_frame: Option<Frame>,
    frame_count: u32,
    stitch_count: u32,
    last_match: Option<MatchResult>,
}

impl<S: FrameSource + 'static> CaptureSession<S> {
    pub fn new(region: Region, config: SessionConfig, source: S) -> Self {
        let config = config.clamped();
        let slot = SnapshotSlot::new();
        let (state, _rx) = watch::channel(SessionState::Idle);
        let sampler = Sampler {
            region,
            source,
            filter: Box::new(PixelDiffFilter::new(config.similarity_threshold)),
            matcher: OverlapMatcher::new(config.overlap_ratio, config.confidence_threshold),
            slot: slot.clone(),
            sink: None,
            composed: None,
            last_frame: None,
            frame_count: 0,
            stitch_count: 0,
            last_match: None,
        };
        Self {
            config,
            stop: CancellationToken::new(),
            state,
            slot,
            sampler,
        }
    }

    pub fn with_filter(mut self, filter: Box<dyn FrameFilter>) -> Self {
        self.sampler.filter = filter;
        self
    }

    /// Extra snapshot consumer, called after the built-in slot is updated.
    pub fn with_sink(mut self, sink: Arc<dyn PreviewSink>) -> Self {
        self.sampler.sink = Some(sink);
        self
    }

    pub fn with_stop_token(mut self, stop: CancellationToken) -> Self {
        self.stop = stop;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn snapshots(&self) -> SnapshotSlot {
        self.slot.clone()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Follows the session through `Sampling` to `Terminated` after `run` takes it.
    pub fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Run the sampling task on the tokio runtime.
    pub fn spawn(self) -> SessionHandle {
        SessionHandle::spawn(self)
    }

    /// Sample until stopped, capped, or faulted.
    pub async fn run(self) -> SessionOutcome {
        let CaptureSession {
            config,
            stop,
            state,
            slot,
            mut sampler,
        } = self;

        state.send_replace(SessionState::Sampling);
        info!(
            region = ?sampler.region,
            source = sampler.source.name(),
            filter = sampler.filter.name(),
            interval_ms = config.capture_interval.as_millis() as u64,
            max_frames = config.max_frames,
            "sampling started"
        );

        let (reason, sampler) = loop {
            if stop.is_cancelled() {
                break (TerminationReason::UserStop, Some(sampler));
            }

            let ticked = tokio::task::spawn_blocking(move || {
                let tick = sampler.tick();
                (sampler, tick)
            })
            .await;

            sampler = match ticked {
                Ok((returned, Ok(tick))) => {
                    trace!(?tick, frame_count = returned.frame_count, "tick");
                    returned
                }
                Ok((returned, Err(fault))) => {
                    error!(
                        error = %fault,
                        frame_count = returned.frame_count,
                        "capture loop aborted"
                    );
                    break (TerminationReason::Fault(fault), Some(returned));
                }
                Err(e) => {
                    let fault = LoopFault::Worker(e.to_string());
                    error!(error = %fault, "capture loop aborted");
                    break (TerminationReason::Fault(fault), None);
                }
            };

            if sampler.frame_count >= config.max_frames {
                info!(
                    max_frames = config.max_frames,
                    "frame limit reached, finish the capture"
                );
                break (TerminationReason::MaxFramesReached, Some(sampler));
            }

            tokio::select! {
                _ = tokio::time::sleep(config.capture_interval) => {}
                _ = stop.cancelled() => {}
            }
        };

        let outcome = match sampler {
            Some(sampler) => sampler.into_outcome(reason),
            None => recover_outcome(&slot, reason),
        };
        state.send_replace(SessionState::Terminated);
        outcome
    }
}

/// Outcome when the worker was lost mid-tick: the last published snapshot
/// is the last consistent state.
fn recover_outcome(slot: &SnapshotSlot, reason: TerminationReason) -> SessionOutcome {
    let latest = slot.latest();
    let (frame_count, stitch_count) = latest
        .as_ref()
        .map_or((0, 0), |s| (s.frame_count, s.stitch_count));
    let image = latest.map(|s| Arc::unwrap_or_clone(s.image));
    warn!(
        frame_count,
        stitch_count,
        reason = reason.as_str(),
        "capture finished from last snapshot"
    );
    SessionOutcome {
        image,
        frame_count,
        stitch_count,
        reason,
        last_match: None,
    }
}

impl<S: FrameSource> Sampler<S> {
    fn tick(&mut self) -> Result<Tick, LoopFault> {
        let frame = match self.source.capture(&self.region) {
            Ok(frame) if frame.fits(&self.region) => frame,
            Ok(frame) => {
                let fault = CaptureFault::DimensionMismatch {
                    got_width: frame.width(),
                    got_height: frame.height(),
                    width: self.region.width(),
                    height: self.region.height(),
                };
                debug!(error = %fault, "capture fault, retrying next tick");
                return Ok(Tick::CaptureFault);
            }
            Err(fault) => {
                debug!(error = %fault, source = self.source.name(), "capture fault, retrying next tick");
                return Ok(Tick::CaptureFault);
            }
        };

        if let Some(last) = &self.last_frame {
            if self.filter.is_duplicate(last, &frame) {
                return Ok(Tick::Duplicate);
            }
        }

        self.frame_count += 1;

        let result = self
            .composed
            .as_deref()
            .map(|composed| self.matcher.find_overlap(composed, &frame));
        let outcome = stitcher::append(
            self.composed.as_deref(),
            &frame,
            result.unwrap_or(MatchResult::NONE),
        )?;
        let matched = outcome.is_success();

        match outcome {
            StitchOutcome::Seeded(image) => {
                info!(
                    width = image.width(),
                    height = image.height(),
                    "first frame recorded, scroll the content"
                );
                self.composed = Some(Arc::new(image));
            }
            StitchOutcome::Extended {
                image,
                appended_rows,
            } => {
                self.stitch_count += 1;
                info!(
                    appended_rows,
                    height = image.height(),
                    confidence = format!("{:.4}", result.map_or(0.0, |r| r.confidence)),
                    stitch_count = self.stitch_count,
                    "stitched frame"
                );
                self.composed = Some(Arc::new(image));
            }
            StitchOutcome::Unchanged(why) => {
                debug!(
                    ?why,
                    confidence = format!("{:.4}", result.map_or(0.0, |r| r.confidence)),
                    frame_count = self.frame_count,
                    "frame not stitched"
                );
            }
        }

        if result.is_some() {
            self.last_match = result;
        }
        self.publish(matched, result.map(|r| r.confidence));
        self.last_frame = Some(frame);

        if self.frame_count % PROGRESS_EVERY == 0 {
            info!(
                frames = self.frame_count,
                stitches = self.stitch_count,
                "capture progress"
            );
        }

        Ok(Tick::Accepted)
    }

    fn publish(&self, matched: bool, confidence: Option<f64>) {
        let Some(image) = &self.composed else {
            return;
        };
        let snapshot = Snapshot {
            image: Arc::clone(image),
            matched,
            confidence,
            frame_count: self.frame_count,
            stitch_count: self.stitch_count,
        };
        self.slot.on_snapshot(&snapshot);
        if let Some(sink) = &self.sink {
            sink.on_snapshot(&snapshot);
        }
    }

    fn into_outcome(self, reason: TerminationReason) -> SessionOutcome {
        let image = self.composed.map(Arc::unwrap_or_clone);
        match &image {
            Some(image) => info!(
                width = image.width(),
                height = image.height(),
                frame_count = self.frame_count,
                stitch_count = self.stitch_count,
                reason = reason.as_str(),
                "capture finished"
            ),
            None => info!(reason = reason.as_str(), "capture finished, no content captured"),
        }
        SessionOutcome {
            image,
            frame_count: self.frame_count,
            stitch_count: self.stitch_count,
            reason,
            last_match: self.last_match,
        }
    }
}
