// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Fit-to-box sizing and nearest-neighbor resampling.

use image::{DynamicImage, GenericImageView, RgbaImage};

/// Scale `orig` to the largest size that fits inside `max` with the same aspect ratio.
///
/// Small images are enlarged, large ones shrunk. Each axis is at least 1 pixel.
pub fn fit_dimensions(orig: (u32, u32), max: (u32, u32)) -> (u32, u32) {
    let (orig_w, orig_h) = orig;
    let (max_w, max_h) = max;
    if orig_w == 0 || orig_h == 0 {
        return (1, 1);
    }

    let scale_w = max_w as f64 / orig_w as f64;
    let scale_h = max_h as f64 / orig_h as f64;
    let scale = scale_w.min(scale_h);
    (
        (orig_w as f64 * scale).floor().max(1.0) as u32,
        (orig_h as f64 * scale).floor().max(1.0) as u32,
    )
}

/// Resample `img` into the `max_w` x `max_h` box.
///
/// Destination pixel `(x, y)` copies source pixel
/// `(floor(x / new_w * src_w), floor(y / new_h * src_h))`. No filtering.
pub fn resize_nearest(img: &DynamicImage, max_w: u32, max_h: u32) -> RgbaImage {
    let (src_w, src_h) = img.dimensions();
    let (new_w, new_h) = fit_dimensions((src_w, src_h), (max_w, max_h));

    let xs: Vec<u32> = (0..new_w)
        .map(|x| source_coord(x, new_w, src_w))
        .collect();
    RgbaImage::from_fn(new_w, new_h, |x, y| {
        let sy = source_coord(y, new_h, src_h);
        img.get_pixel(xs[x as usize], sy)
    })
}

fn source_coord(dst: u32, dst_len: u32, src_len: u32) -> u32 {
    let s = (dst as f64 / dst_len as f64 * src_len as f64) as u32;
    s.min(src_len.saturating_sub(1))
}
