use image::RgbImage;
use longshot_common::frame::{Frame, CHANNELS};
use std::ops::Range;

use crate::error::StitchError;

/// The long image assembled so far.
///
/// Width is fixed at creation; height only grows. Rows already written are
/// never touched again: growth always copies the existing rows verbatim and
/// appends below them.
#[derive(Debug, Clone)]
pub struct ComposedImage {
    image: RgbImage,
}

impl ComposedImage {
    /// Seed a composed image from the first usable frame.
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            image: frame.image().clone(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Raw bytes of a contiguous band of rows.
    pub fn rows(&self, range: Range<u32>) -> &[u8] {
        let stride = self.stride();
        &self.image.as_raw()[range.start as usize * stride..range.end as usize * stride]
    }

    fn stride(&self) -> usize {
        self.image.width() as usize * CHANNELS
    }

    /// New image = these rows followed by `frame` rows `[from_row, frame.height)`.
    pub(crate) fn extended_with(&self, frame: &Frame, from_row: u32) -> Result<Self, StitchError> {
        if frame.width() != self.width() {
            return Err(StitchError::WidthMismatch {
                composed: self.width(),
                frame: frame.width(),
            });
        }
        let added = frame.rows(from_row..frame.height());
        let old = self.image.as_raw();
        let total = old.len() + added.len();

        let mut buf: Vec<u8> = Vec::new();
        buf.try_reserve_exact(total)
            .map_err(|_| StitchError::Allocation { bytes: total })?;
        buf.extend_from_slice(old);
        buf.extend_from_slice(added);

        let height = self.height() + (frame.height() - from_row);
        let image = RgbImage::from_raw(self.width(), height, buf).ok_or(StitchError::Layout {
            width: self.width(),
            height,
        })?;
        Ok(Self { image })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{page_frame, solid_frame};

    #[test]
    fn extension_keeps_old_rows_and_appends_tail() {
        let seed = page_frame(7, 16, 10, 0);
        let composed = ComposedImage::from_frame(&seed);
        let next = page_frame(7, 16, 10, 4);

        let grown = composed.extended_with(&next, 6).unwrap();
        assert_eq!(grown.height(), 14);
        assert_eq!(grown.rows(0..10), composed.rows(0..10));
        assert_eq!(grown.rows(10..14), next.rows(6..10));
        // Rows 0..14 of the page in order.
        assert_eq!(grown.rows(0..14), page_frame(7, 16, 14, 0).rows(0..14));
    }

    #[test]
    fn width_mismatch_is_error() {
        let composed = ComposedImage::from_frame(&solid_frame(16, 10, 0));
        let err = composed.extended_with(&solid_frame(8, 10, 0), 2).unwrap_err();
        assert!(matches!(err, StitchError::WidthMismatch { composed: 16, frame: 8 }));
    }
}
