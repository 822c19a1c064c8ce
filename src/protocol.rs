// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Terminal graphics protocol selection and payload encoding.
//!
//! The protocol is chosen once at startup and handed to the encoder; it is never
//! re-detected per image.

use std::io::Write;
use std::sync::Arc;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use ratatui_image::picker::{Picker, ProtocolType};

use crate::error::EncodeError;
use crate::kgp;

/// Final escape sequence for one image, ready to print: padding, protocol bytes, newline.
pub type EncodedPayload = Arc<[u8]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphicsProtocol {
    Kitty,
    Iterm2,
}

impl GraphicsProtocol {
    pub fn name(self) -> &'static str {
        match self {
            GraphicsProtocol::Kitty => "kitty",
            GraphicsProtocol::Iterm2 => "iterm2",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("kitty") {
            Some(GraphicsProtocol::Kitty)
        } else if s.eq_ignore_ascii_case("iterm2") || s.eq_ignore_ascii_case("iterm") {
            Some(GraphicsProtocol::Iterm2)
        } else {
            None
        }
    }
}

/// Pick the graphics protocol for this terminal.
///
/// `WALLPEEK_PROTOCOL` wins, then the answer from the terminal query, then environment
/// heuristics. `None` means the terminal cannot show images.
pub fn detect(picker: Option<&Picker>) -> Option<GraphicsProtocol> {
    detect_with(picker.map(Picker::protocol_type), |key| std::env::var(key).ok())
}

fn detect_with(
    queried: Option<ProtocolType>,
    env: impl Fn(&str) -> Option<String>,
) -> Option<GraphicsProtocol> {
    if let Some(forced) = env("WALLPEEK_PROTOCOL").and_then(|v| GraphicsProtocol::parse(&v)) {
        return Some(forced);
    }

    match queried {
        Some(ProtocolType::Kitty) => return Some(GraphicsProtocol::Kitty),
        Some(ProtocolType::Iterm2) => return Some(GraphicsProtocol::Iterm2),
        _ => {}
    }

    if let Some(prog) = env("TERM_PROGRAM") {
        let lower = prog.to_ascii_lowercase();
        if lower == "iterm.app" || lower == "iterm2" {
            return Some(GraphicsProtocol::Iterm2);
        }
        if lower == "wezterm" || lower == "ghostty" {
            return Some(GraphicsProtocol::Kitty);
        }
    }
    if env("KITTY_WINDOW_ID").is_some() || env("GHOSTTY_RESOURCES_DIR").is_some() {
        return Some(GraphicsProtocol::Kitty);
    }
    if env("TERM").is_some_and(|t| t.to_ascii_lowercase().contains("kitty")) {
        return Some(GraphicsProtocol::Kitty);
    }

    None
}

/// Serializes pixel buffers into printable, horizontally centered payloads.
#[derive(Clone, Debug)]
pub struct ProtocolEncoder {
    protocol: Option<GraphicsProtocol>,
    cell_width_px: u32,
    compress_level: Option<u32>,
}

impl ProtocolEncoder {
    pub fn new(protocol: GraphicsProtocol, cell_width_px: u32, compress_level: Option<u32>) -> Self {
        Self {
            protocol: Some(protocol),
            cell_width_px: cell_width_px.max(1),
            compress_level,
        }
    }

    /// An encoder with no protocol; every call fails. Startup rejects this case.
    #[cfg(test)]
    pub fn unsupported(cell_width_px: u32) -> Self {
        Self {
            protocol: None,
            cell_width_px: cell_width_px.max(1),
            compress_level: None,
        }
    }

    /// Left padding, in spaces, that centers `image_px_w` inside `container_px_w`.
    pub fn padding(&self, image_px_w: u32, container_px_w: u32) -> usize {
        let image_cells = image_px_w.div_ceil(self.cell_width_px);
        let container_cells = container_px_w / self.cell_width_px;
        (container_cells.saturating_sub(image_cells) / 2) as usize
    }

    pub fn encode(
        &self,
        img: &RgbaImage,
        container_px_w: u32,
    ) -> Result<EncodedPayload, EncodeError> {
        let protocol = self.protocol.ok_or(EncodeError::Unsupported)?;
        let body = match protocol {
            GraphicsProtocol::Kitty => kgp::encode(img, self.compress_level)?,
            GraphicsProtocol::Iterm2 => encode_iterm2(img)?,
        };

        let pad = self.padding(img.width(), container_px_w);
        let mut out = Vec::with_capacity(pad + body.len() + 1);
        out.resize(pad, b' ');
        out.extend_from_slice(&body);
        out.push(b'\n');
        Ok(EncodedPayload::from(out))
    }
}

/// iTerm2 inline image (OSC 1337) carrying a PNG re-encode of the pixels.
fn encode_iterm2(img: &RgbaImage) -> Result<Vec<u8>, EncodeError> {
    let (w, h) = img.dimensions();
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(img.as_raw(), w, h, ExtendedColorType::Rgba8)?;

    let b64 = base64_simd::STANDARD.encode_to_string(&png);
    let mut out = Vec::with_capacity(b64.len() + 96);
    write!(
        out,
        "\x1b]1337;File=inline=1;size={};width={w}px;height={h}px;preserveAspectRatio=1:",
        png.len()
    )?;
    out.extend_from_slice(b64.as_bytes());
    out.push(0x07);
    Ok(out)
}
