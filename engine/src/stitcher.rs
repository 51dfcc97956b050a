use longshot_common::frame::Frame;
use tracing::debug;

use crate::composed::ComposedImage;
use crate::error::StitchError;
use crate::matcher::MatchResult;

/// What a single stitch attempt did to the composed image.
#[derive(Debug)]
pub enum StitchOutcome {
    /// There was no composed image yet; the frame became it.
    Seeded(ComposedImage),
    /// The frame's novel rows were appended.
    Extended {
        image: ComposedImage,
        appended_rows: u32,
    },
    /// Nothing changed.
    Unchanged(NoStitch),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoStitch {
    /// The matcher found no usable overlap.
    NoMatch,
    /// The match point leaves no rows below it.
    NothingNew,
    /// Frame width differs from the composed image.
    WidthMismatch,
}

impl StitchOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, StitchOutcome::Unchanged(_))
    }
}

/// Append a frame's novel rows to the composed image.
///
/// The current image is only borrowed: a rejected stitch leaves it exactly
/// as it was, and a successful one returns a new image whose height is
/// `old + (frame.height - offset)`.
pub fn append(
    composed: Option<&ComposedImage>,
    frame: &Frame,
    result: MatchResult,
) -> Result<StitchOutcome, StitchError> {
    let Some(composed) = composed else {
        return Ok(StitchOutcome::Seeded(ComposedImage::from_frame(frame)));
    };

    if result.offset == 0 {
        return Ok(StitchOutcome::Unchanged(NoStitch::NoMatch));
    }
    if result.offset >= frame.height() {
        debug!(
            offset = result.offset,
            frame_height = frame.height(),
            "match leaves no new rows"
        );
        return Ok(StitchOutcome::Unchanged(NoStitch::NothingNew));
    }
    if frame.width() != composed.width() {
        return Ok(StitchOutcome::Unchanged(NoStitch::WidthMismatch));
    }

    let image = composed.extended_with(frame, result.offset)?;
    Ok(StitchOutcome::Extended {
        appended_rows: frame.height() - result.offset,
        image,
    })
}
