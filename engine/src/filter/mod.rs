pub mod pixel_diff;
pub mod traits;

pub use pixel_diff::PixelDiffFilter;
pub use traits::FrameFilter;
