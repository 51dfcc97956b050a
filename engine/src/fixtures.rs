//! Deterministic test images.
//!
//! A "page" is an endless, noisy texture addressed by absolute row; a frame
//! of the page at scroll position `top` is rows `[top, top + height)`. Flat
//! colours are avoided on purpose: they have no variance and never correlate.

use image::{Rgb, RgbImage};
use longshot_common::frame::Frame;

fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

fn texel(seed: u64, x: u32, y: u32, c: u32) -> u8 {
    let key = seed
        .wrapping_mul(0x9e37_79b9_7f4a_7c15)
        .wrapping_add((y as u64) << 24)
        .wrapping_add((x as u64) << 4)
        .wrapping_add(c as u64);
    (mix(key) >> 56) as u8
}

/// View of page `seed` scrolled to `top`.
pub fn page_frame(seed: u64, width: u32, height: u32, top: u32) -> Frame {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let row = top + y;
        Rgb([
            texel(seed, x, row, 0),
            texel(seed, x, row, 1),
            texel(seed, x, row, 2),
        ])
    });
    Frame::with_timestamp(img, 0)
}

/// Frame whose rows come from different pages: `(seed, first_row, count)` bands stacked.
pub fn banded_frame(width: u32, bands: &[(u64, u32, u32)]) -> Frame {
    let height: u32 = bands.iter().map(|b| b.2).sum();
    let mut img = RgbImage::new(width, height);
    let mut out_y = 0;
    for &(seed, first, count) in bands {
        for dy in 0..count {
            for x in 0..width {
                let row = first + dy;
                img.put_pixel(
                    x,
                    out_y,
                    Rgb([
                        texel(seed, x, row, 0),
                        texel(seed, x, row, 1),
                        texel(seed, x, row, 2),
                    ]),
                );
            }
            out_y += 1;
        }
    }
    Frame::with_timestamp(img, 0)
}

pub fn solid_frame(width: u32, height: u32, value: u8) -> Frame {
    Frame::with_timestamp(RgbImage::from_pixel(width, height, Rgb([value; 3])), 0)
}
