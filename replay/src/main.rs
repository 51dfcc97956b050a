mod source;

use std::path::{Path, PathBuf};
use std::time::Duration;

use longshot_common::config::{Config, ConfigError};
use longshot_common::frame::RegionError;
use longshot_engine::{CaptureSession, SessionConfig, SessionError, SessionOutcome};
use source::DirectorySource;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("failed to read frame directory {0}: {1}")]
    ReadDir(String, std::io::Error),
    #[error("no frame images found in {0}")]
    NoFrames(String),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid region: {0}")]
    Region(#[from] RegionError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("no content captured")]
    NothingCaptured,
}

const USAGE: &str = "usage: longshot-replay <frames-dir> <output.png> [config.toml]";

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let (Some(frames_dir), Some(output)) = (args.next(), args.next()) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let config = match args.next().map(PathBuf::from) {
        Some(path) => match Config::load(&path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config from {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        frames_dir,
        output,
        interval_ms = config.capture.interval_ms,
        max_frames = config.capture.max_frames,
        confidence_threshold = config.matching.confidence_threshold,
        "starting long-screenshot replay"
    );

    let stop = CancellationToken::new();
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, finishing capture");
            ctrl_c_stop.cancel();
        }
    });

    match replay(Path::new(&frames_dir), Path::new(&output), &config, stop).await {
        Ok(outcome) => info!(
            output,
            frames = outcome.frame_count,
            stitches = outcome.stitch_count,
            reason = outcome.reason.as_str(),
            "long screenshot written"
        ),
        Err(e) => {
            error!(error = %e, "replay failed");
            std::process::exit(1);
        }
    }
}

/// Run one capture session over the recorded frames and save the result.
async fn replay(
    frames_dir: &Path,
    output: &Path,
    config: &Config,
    stop: CancellationToken,
) -> Result<SessionOutcome, ReplayError> {
    let source = DirectorySource::open(frames_dir, stop.clone())?;
    let region = source.region()?;
    let session_config = SessionConfig::from_config(config);
    let poll = session_config.capture_interval;

    let handle = CaptureSession::new(region, session_config, source)
        .with_stop_token(stop.clone())
        .spawn();

    let mut rx = handle.subscribe();
    let preview = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            if let Some(snapshot) = rx.borrow_and_update().clone() {
                debug!(
                    height = snapshot.image.height(),
                    matched = snapshot.matched,
                    frames = snapshot.frame_count,
                    "preview updated"
                );
            }
        }
    });

    // Either the source runs dry (stop is set) or the frame cap ends the session.
    tokio::select! {
        _ = stop.cancelled() => {}
        _ = async {
            while !handle.is_finished() {
                tokio::time::sleep(poll).await;
            }
        } => {}
    }

    let joined = handle
        .finish(Duration::from_millis(config.capture.join_timeout_ms))
        .await;
    preview.abort();
    let mut outcome = joined?;

    if !outcome.reason.is_graceful() {
        warn!(
            reason = outcome.reason.as_str(),
            "capture aborted, saving what was composed"
        );
    }

    let image = outcome.image.take().ok_or(ReplayError::NothingCaptured)?;
    image.image().save(output)?;
    info!(
        width = image.width(),
        height = image.height(),
        path = %output.display(),
        "saved composed image"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// Rows of a noisy page starting at `top`.
    fn page(width: u32, height: u32, top: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let mut z = ((top + y) as u64) << 32 | x as u64;
            z = z.wrapping_mul(0x9e37_79b9_7f4a_7c15);
            z ^= z >> 29;
            z = z.wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z ^= z >> 32;
            Rgb([z as u8, (z >> 8) as u8, (z >> 16) as u8])
        })
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.capture.interval_ms = 1;
        config
    }

    #[tokio::test]
    async fn replays_scrolled_frames_into_one_image() {
        let frames = tempfile::tempdir().unwrap();
        for (i, top) in [0u32, 20, 20, 45].iter().enumerate() {
            page(80, 50, *top)
                .save(frames.path().join(format!("{i:03}.png")))
                .unwrap();
        }
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("long.png");

        let outcome = replay(frames.path(), &output, &fast_config(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.frame_count, 3);
        assert_eq!(outcome.stitch_count, 2);
        let saved = image::open(&output).unwrap().to_rgb8();
        assert_eq!(saved.dimensions(), (80, 95));
        assert_eq!(saved, page(80, 95, 0));
    }

    #[tokio::test]
    async fn frame_cap_ends_replay_early() {
        let frames = tempfile::tempdir().unwrap();
        for i in 0..6u32 {
            page(40, 50, i * 20)
                .save(frames.path().join(format!("{i:03}.png")))
                .unwrap();
        }
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("long.png");
        let mut config = fast_config();
        config.capture.max_frames = 2;

        let outcome = replay(frames.path(), &output, &config, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.frame_count, 2);
        assert_eq!(outcome.reason.as_str(), "max_frames_reached");
        let saved = image::open(&output).unwrap().to_rgb8();
        assert_eq!(saved.height(), 70);
    }
}
