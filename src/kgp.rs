// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Kitty Graphics Protocol helpers.
//!
//! Images are transmitted and displayed in one go (`a=T`) at the cursor position, so the
//! sequence can be printed inline like text.

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::RgbaImage;

const CHUNK_SIZE: usize = 4096;

/// Delete every image placement and free the image data.
pub fn delete_all() -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    _ = write!(buf, "\x1b_Gq=2,a=d,d=A\x1b\\");
    buf
}

/// Encode RGBA pixels as a chunked transmit-and-display sequence.
///
/// With `compress_level` set the pixel data is zlib-deflated first (`o=z`).
pub fn encode(img: &RgbaImage, compress_level: Option<u32>) -> std::io::Result<Vec<u8>> {
    let (w, h) = img.dimensions();

    let (data, compressed) = match compress_level {
        Some(level) => {
            let mut z = ZlibEncoder::new(Vec::new(), Compression::new(level));
            z.write_all(img.as_raw())?;
            (z.finish()?, true)
        }
        None => (img.as_raw().clone(), false),
    };

    let b64 = base64_simd::STANDARD.encode_to_string(&data).into_bytes();
    let mut out = Vec::with_capacity(b64.len() + (b64.len() / CHUNK_SIZE + 1) * 16 + 64);

    let mut it = b64.chunks(CHUNK_SIZE).peekable();
    let first = it.next().unwrap_or(&[]);
    _ = write!(
        out,
        "\x1b_Gq=2,a=T,f=32,s={w},v={h}{},m={};",
        if compressed { ",o=z" } else { "" },
        it.peek().is_some() as u8
    );
    out.extend_from_slice(first);
    out.extend_from_slice(b"\x1b\\");

    while let Some(chunk) = it.next() {
        _ = write!(out, "\x1b_Gm={};", it.peek().is_some() as u8);
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\x1b\\");
    }

    Ok(out)
}
