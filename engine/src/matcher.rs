use longshot_common::frame::{Frame, CHANNELS};
use tracing::debug;

use crate::composed::ComposedImage;

pub const DEFAULT_OVERLAP_RATIO: f64 = 0.3;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;
/// Below this template height a match is not trusted at all.
pub const MIN_TEMPLATE_ROWS: u32 = 20;

/// Where a new frame's novel content begins, and how sure we are.
///
/// `offset` is the first row of the frame that is not already in the
/// composed image. `offset == 0` means no usable match; `confidence` may
/// still be non-zero in that case and is only there for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub offset: u32,
    pub confidence: f64,
}

impl MatchResult {
    pub const NONE: Self = Self {
        offset: 0,
        confidence: 0.0,
    };

    pub fn is_match(&self) -> bool {
        self.offset > 0
    }

    /// Rows the content moved between the composed tail and this frame.
    pub fn scroll_distance(&self, frame_height: u32) -> Option<u32> {
        self.is_match()
            .then(|| frame_height.saturating_sub(self.offset))
    }
}

/// Locates the composed image's bottom band inside the top of a new frame.
///
/// Template = bottom `max(overlap_ratio * composed.height, 20)` rows of the
/// composed image, clamped to half of either image. It is slid over the top
/// `2 * template` rows of the frame and scored with mean-centred normalized
/// cross-correlation per row offset.
#[derive(Debug, Clone)]
pub struct OverlapMatcher {
    overlap_ratio: f64,
    confidence_threshold: f64,
}

impl OverlapMatcher {
    pub fn new(overlap_ratio: f64, confidence_threshold: f64) -> Self {
        Self {
            overlap_ratio,
            confidence_threshold,
        }
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// Template height for the given image heights, or `None` if too small to match.
    pub fn template_rows(&self, composed_height: u32, frame_height: u32) -> Option<u32> {
        let wanted = ((self.overlap_ratio * composed_height as f64) as u32).max(MIN_TEMPLATE_ROWS);
        let rows = wanted.min(composed_height / 2).min(frame_height / 2);
        (rows >= MIN_TEMPLATE_ROWS).then_some(rows)
    }

    pub fn find_overlap(&self, composed: &ComposedImage, frame: &Frame) -> MatchResult {
        if composed.width() != frame.width() {
            debug!(
                composed_width = composed.width(),
                frame_width = frame.width(),
                "width mismatch, skipping match"
            );
            return MatchResult::NONE;
        }

        let Some(template_rows) = self.template_rows(composed.height(), frame.height()) else {
            debug!(
                composed_height = composed.height(),
                frame_height = frame.height(),
                "region too small to match"
            );
            return MatchResult::NONE;
        };

        let template = composed.rows(composed.height() - template_rows..composed.height());
        let search_rows = (template_rows * 2).min(frame.height());
        let window = frame.rows(0..search_rows);

        let (best_row, best_score) = best_correlation(template, window, frame.width());
        let confidence = best_score.clamp(0.0, 1.0);

        if confidence >= self.confidence_threshold {
            MatchResult {
                offset: best_row + template_rows,
                confidence,
            }
        } else {
            debug!(
                best_row,
                confidence = format!("{:.4}", confidence),
                threshold = self.confidence_threshold,
                "match below confidence threshold"
            );
            MatchResult {
                offset: 0,
                confidence,
            }
        }
    }
}

impl Default for OverlapMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_OVERLAP_RATIO, DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

/// Per-channel sums over a band: sum(v), sum(v^2).
#[derive(Clone, Copy, Default)]
struct ChannelStats {
    sum: [u64; CHANNELS],
    sq: [u64; CHANNELS],
}

fn band_stats(band: &[u8]) -> ChannelStats {
    let mut stats = ChannelStats::default();
    for px in band.chunks_exact(CHANNELS) {
        for c in 0..CHANNELS {
            let v = px[c] as u64;
            stats.sum[c] += v;
            stats.sq[c] += v * v;
        }
    }
    stats
}

/// n * variance * n, summed over channels; exact in integers.
fn scaled_variance(stats: &ChannelStats, n: i128) -> i128 {
    (0..CHANNELS)
        .map(|c| n * stats.sq[c] as i128 - (stats.sum[c] as i128).pow(2))
        .sum()
}

/// Slide `template` over `window` (row-major RGB bands of equal `width`) and
/// return the row with the highest correlation and its score.
///
/// Score at each row is sum_c(cov_c) / sqrt(sum_c(var_t) * sum_c(var_w)),
/// each channel centred on its own mean, so a uniform brightness shift does
/// not change it. Zero-variance bands score 0. Ties keep the first row.
pub fn best_correlation(template: &[u8], window: &[u8], width: u32) -> (u32, f64) {
    let stride = width as usize * CHANNELS;
    if stride == 0 || template.is_empty() || window.len() < template.len() {
        return (0, 0.0);
    }
    let template_rows = template.len() / stride;
    let window_rows = window.len() / stride;
    let n = (template_rows * width as usize) as i128;

    let t_stats = band_stats(template);
    let t_var = scaled_variance(&t_stats, n);

    // Prefix sums over window rows, so each position's stats are O(channels).
    let mut prefix = vec![ChannelStats::default(); window_rows + 1];
    for r in 0..window_rows {
        let row = band_stats(&window[r * stride..(r + 1) * stride]);
        let mut acc = prefix[r];
        for c in 0..CHANNELS {
            acc.sum[c] += row.sum[c];
            acc.sq[c] += row.sq[c];
        }
        prefix[r + 1] = acc;
    }

    let mut best_row = 0u32;
    let mut best_score = f64::NEG_INFINITY;

    for y in 0..=(window_rows - template_rows) {
        let lo = prefix[y];
        let hi = prefix[y + template_rows];
        let mut w_stats = ChannelStats::default();
        for c in 0..CHANNELS {
            w_stats.sum[c] = hi.sum[c] - lo.sum[c];
            w_stats.sq[c] = hi.sq[c] - lo.sq[c];
        }
        let w_var = scaled_variance(&w_stats, n);

        let score = if t_var <= 0 || w_var <= 0 {
            0.0
        } else {
            let band = &window[y * stride..(y + template_rows) * stride];
            let mut cross = [0u64; CHANNELS];
            for (t, w) in template.chunks_exact(CHANNELS).zip(band.chunks_exact(CHANNELS)) {
                for c in 0..CHANNELS {
                    cross[c] += t[c] as u64 * w[c] as u64;
                }
            }
            let cov: i128 = (0..CHANNELS)
                .map(|c| n * cross[c] as i128 - t_stats.sum[c] as i128 * w_stats.sum[c] as i128)
                .sum();
            cov as f64 / ((t_var as f64) * (w_var as f64)).sqrt()
        };

        if score > best_score {
            best_score = score;
            best_row = y as u32;
        }
    }

    (best_row, best_score)
}
