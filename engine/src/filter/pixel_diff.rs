use longshot_common::frame::{Frame, CHANNELS};
use tracing::debug;

use super::traits::FrameFilter;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.98;

/// Mean absolute pixel difference filter.
///
/// similarity = 1 - sum(|a - b|) / (width * height * channels * 255);
/// a frame is a duplicate when similarity reaches the threshold. Small
/// local changes (cursor blink, anti-aliasing shimmer) stay under the bar,
/// while any real scroll moves most of the pixels.
pub struct PixelDiffFilter {
    threshold: f64,
}

impl PixelDiffFilter {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Similarity in [0, 1], or `None` if the frames are not the same size.
    pub fn similarity(prev: &Frame, curr: &Frame) -> Option<f64> {
        if prev.width() != curr.width() || prev.height() != curr.height() {
            return None;
        }
        let a = prev.image().as_raw();
        let b = curr.image().as_raw();
        if a.is_empty() {
            return Some(1.0);
        }
        let diff: u64 = a
            .iter()
            .zip(b.iter())
            .map(|(&x, &y)| x.abs_diff(y) as u64)
            .sum();
        let max_diff = prev.width() as f64 * prev.height() as f64 * CHANNELS as f64 * 255.0;
        Some(1.0 - diff as f64 / max_diff)
    }
}

impl Default for PixelDiffFilter {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl FrameFilter for PixelDiffFilter {
    fn is_duplicate(&self, prev: &Frame, curr: &Frame) -> bool {
        match Self::similarity(prev, curr) {
            Some(similarity) => {
                let duplicate = similarity >= self.threshold;
                debug!(
                    similarity = format!("{:.4}", similarity),
                    threshold = format!("{:.4}", self.threshold),
                    duplicate,
                    "pixel-diff comparison"
                );
                duplicate
            }
            None => {
                debug!(
                    prev = format!("{}x{}", prev.width(), prev.height()),
                    curr = format!("{}x{}", curr.width(), curr.height()),
                    "frame size changed, not a duplicate"
                );
                false
            }
        }
    }

    fn name(&self) -> &str {
        "pixel-diff"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{page_frame, solid_frame};
    use image::Rgb;

    #[test]
    fn frame_is_duplicate_of_itself() {
        let filter = PixelDiffFilter::default();
        let frame = page_frame(1, 64, 48, 0);
        assert!(filter.is_duplicate(&frame, &frame));
        assert_eq!(PixelDiffFilter::similarity(&frame, &frame), Some(1.0));
    }

    #[test]
    fn size_mismatch_never_duplicate() {
        let filter = PixelDiffFilter::new(0.0);
        let a = solid_frame(10, 10, 0);
        let b = solid_frame(10, 11, 0);
        assert!(!filter.is_duplicate(&a, &b));
        assert_eq!(PixelDiffFilter::similarity(&a, &b), None);
    }

    #[test]
    fn scrolled_content_is_not_duplicate() {
        let filter = PixelDiffFilter::default();
        let before = page_frame(3, 64, 48, 0);
        let after = page_frame(3, 64, 48, 12);
        assert!(!filter.is_duplicate(&before, &after));
    }

    #[test]
    fn cursor_blink_is_duplicate() {
        let filter = PixelDiffFilter::default();
        let before = page_frame(5, 64, 48, 0);
        let mut img = before.image().clone();
        for y in 10..20 {
            img.put_pixel(30, y, Rgb([0, 0, 0]));
        }
        let after = Frame::with_timestamp(img, 1);
        assert!(filter.is_duplicate(&before, &after));
    }

    #[test]
    fn black_vs_white_is_zero_similarity() {
        let black = solid_frame(8, 8, 0);
        let white = solid_frame(8, 8, 255);
        assert_eq!(PixelDiffFilter::similarity(&black, &white), Some(0.0));
        assert!(!PixelDiffFilter::new(0.01).is_duplicate(&black, &white));
    }
}
