use image::{RgbImage, RgbaImage};
use std::ops::Range;

/// Bytes per pixel in every frame and composed image (RGB).
pub const CHANNELS: usize = 3;

/// Rectangular capture area in screen-pixel coordinates.
///
/// `right` and `bottom` are exclusive, so `width = right - left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Region {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Result<Self, RegionError> {
        if right <= left || bottom <= top {
            return Err(RegionError::Empty {
                left,
                top,
                right,
                bottom,
            });
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    /// Build a region from an origin and a size, as selection overlays report it.
    pub fn from_origin_size(x: i32, y: i32, width: u32, height: u32) -> Result<Self, RegionError> {
        let right = i32::try_from(width)
            .ok()
            .and_then(|w| x.checked_add(w))
            .ok_or(RegionError::Overflow)?;
        let bottom = i32::try_from(height)
            .ok()
            .and_then(|h| y.checked_add(h))
            .ok_or(RegionError::Overflow)?;
        Self::new(x, y, right, bottom)
    }

    pub fn width(&self) -> u32 {
        self.right.abs_diff(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.abs_diff(self.top)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error("region ({left},{top})-({right},{bottom}) has no area")]
    Empty {
        left: i32,
        top: i32,
        right: i32,
        bottom: i32,
    },
    #[error("region size overflows screen coordinates")]
    Overflow,
}

/// One captured snapshot of a region.
///
/// Pixels are row-major RGB; a frame is never mutated after capture.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    pub captured_at_ms: i64,
}

impl Frame {
    /// Wrap an RGB buffer, stamping it with the current wall-clock time.
    pub fn new(image: RgbImage) -> Self {
        Self::with_timestamp(image, chrono::Utc::now().timestamp_millis())
    }

    pub fn with_timestamp(image: RgbImage, captured_at_ms: i64) -> Self {
        Self {
            image,
            captured_at_ms,
        }
    }

    /// Capture backends usually hand back RGBA; alpha carries nothing on screen pixels.
    pub fn from_rgba(image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let mut rgb = Vec::with_capacity(width as usize * height as usize * CHANNELS);
        for px in image.pixels() {
            rgb.extend_from_slice(&px.0[..CHANNELS]);
        }
        // Length is exact, so from_raw cannot fail.
        let image = RgbImage::from_raw(width, height, rgb).unwrap_or_else(|| RgbImage::new(0, 0));
        Self::new(image)
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

    /// Raw bytes of one row.
    pub fn row(&self, y: u32) -> &[u8] {
        self.rows(y..y + 1)
    }

    /// Raw bytes of a contiguous band of rows.
    pub fn rows(&self, range: Range<u32>) -> &[u8] {
        let stride = self.image.width() as usize * CHANNELS;
        &self.image.as_raw()[range.start as usize * stride..range.end as usize * stride]
    }

    /// Whether this frame has exactly the region's dimensions.
    pub fn fits(&self, region: &Region) -> bool {
        self.width() == region.width() && self.height() == region.height()
    }
}
