// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Terminal output writer.
//!
//! This module is the only place allowed to write to stdout. It serializes output and prevents
//! escape-sequence interleaving between the event loop and anything else.
//!
//! Layout: the top half of the terminal holds the image (or a centered "Loading…"), the
//! bottom half holds the status line, padded by one row and two columns.

use std::io::{IsTerminal, Write, stdout};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::app::Body;
use crate::kgp::delete_all;

const LOADING_TEXT: &str = "Loading…";
const STATUS_PAD_ROWS: u16 = 1;
const STATUS_PAD_COLS: u16 = 2;

pub enum WriterRequest {
    /// Redraw the image half.
    Body { body: Body, size: (u16, u16) },
    /// Redraw the status half.
    Status { text: String, size: (u16, u16) },
    /// Wipe the screen, including any Kitty image placements.
    Clear { kitty: bool },
    Shutdown,
}

pub struct TerminalWriter {
    request_tx: Sender<WriterRequest>,
    handle: Option<JoinHandle<()>>,
}

impl TerminalWriter {
    /// Spawn the writer thread.
    pub fn new() -> Self {
        let (request_tx, request_rx) = mpsc::channel::<WriterRequest>();

        let handle = thread::spawn(move || {
            Self::writer_loop(request_rx);
        });

        Self {
            request_tx,
            handle: Some(handle),
        }
    }

    /// Send a request to the writer thread.
    pub fn send(&self, req: WriterRequest) {
        let _ = self.request_tx.send(req);
    }

    fn writer_loop(request_rx: Receiver<WriterRequest>) {
        let mut out = stdout();
        let is_tty = out.is_terminal();

        while let Ok(msg) = request_rx.recv() {
            if matches!(msg, WriterRequest::Shutdown) {
                break;
            }
            if !is_tty {
                continue;
            }
            let _ = Self::apply_msg(msg, &mut out);
            let _ = out.flush();
        }
    }

    fn apply_msg(msg: WriterRequest, out: &mut impl Write) -> std::io::Result<()> {
        match msg {
            WriterRequest::Body { body, size } => render_body(out, &body, size),
            WriterRequest::Status { text, size } => render_status(out, &text, size),
            WriterRequest::Clear { kitty } => clear_all(out, kitty),
            WriterRequest::Shutdown => Ok(()),
        }
    }
}

impl Drop for TerminalWriter {
    fn drop(&mut self) {
        let _ = self.request_tx.send(WriterRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn image_rows(size: (u16, u16)) -> u16 {
    size.1 / 2
}

fn clear_all(out: &mut impl Write, kitty: bool) -> std::io::Result<()> {
    if kitty {
        out.write_all(&delete_all())?;
    }
    out.write_all(b"\x1b[0m\x1b[2J\x1b[H")
}

fn erase_rows(out: &mut impl Write, from: u16, to: u16) -> std::io::Result<()> {
    for row in from..to {
        write!(out, "\x1b[{};1H\x1b[2K", row + 1)?;
    }
    Ok(())
}

fn render_body(out: &mut impl Write, body: &Body, size: (u16, u16)) -> std::io::Result<()> {
    let (w, h) = size;
    if w == 0 || h == 0 {
        return Ok(());
    }
    let top = image_rows(size);
    erase_rows(out, 0, top)?;

    match body {
        Body::Blank => Ok(()),
        Body::Loading => {
            let text_w = LOADING_TEXT.chars().count() as u16;
            let row = top / 2 + 1;
            let col = w.saturating_sub(text_w) / 2 + 1;
            write!(out, "\x1b[{row};{col}H{LOADING_TEXT}")
        }
        Body::Image(payload) => {
            out.write_all(b"\x1b[1;1H")?;
            out.write_all(payload)
        }
    }
}

fn render_status(out: &mut impl Write, text: &str, size: (u16, u16)) -> std::io::Result<()> {
    let (w, h) = size;
    if w == 0 || h == 0 {
        return Ok(());
    }
    let top = image_rows(size);
    erase_rows(out, top, h)?;

    let row = top + STATUS_PAD_ROWS + 1;
    if row > h {
        return Ok(());
    }
    let col = STATUS_PAD_COLS + 1;
    let available = w.saturating_sub(STATUS_PAD_COLS * 2) as usize;
    write!(out, "\x1b[{row};{col}H{}\x1b[0m", clip_chars(text, available))
}

fn clip_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::EncodedPayload;

    fn rendered(f: impl FnOnce(&mut Vec<u8>) -> std::io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_clip_chars_no_truncation() {
        assert_eq!(clip_chars("hello", 10), "hello");
        assert_eq!(clip_chars("hello", 5), "hello");
    }

    #[test]
    fn test_clip_chars_truncation() {
        assert_eq!(clip_chars("hello world", 5), "hello");
    }

    #[test]
    fn test_clip_chars_multibyte() {
        assert_eq!(clip_chars("h ←  l →", 3), "h ←");
        assert_eq!(clip_chars("日本語テスト", 2), "日本");
    }

    #[test]
    fn test_render_loading_is_centered_in_top_half() {
        let s = rendered(|out| render_body(out, &Body::Loading, (80, 24)));
        // 12 image rows erased, text on row 7, (80 - 8) / 2 + 1 = 37
        assert_eq!(s.matches("\x1b[2K").count(), 12);
        assert!(s.ends_with("\x1b[7;37HLoading…"));
    }

    #[test]
    fn test_render_image_writes_payload_at_home() {
        let payload = EncodedPayload::from(&b"  \x1b_Gdata\x1b\\\n"[..]);
        let s = rendered(|out| render_body(out, &Body::Image(payload), (80, 24)));
        assert!(s.ends_with("\x1b[1;1H  \x1b_Gdata\x1b\\\n"));
    }

    #[test]
    fn test_render_status_is_padded() {
        let s = rendered(|out| render_status(out, "[1/3] a.jpg", (80, 24)));
        // rows 13..=24 erased, text at row 14 col 3
        assert_eq!(s.matches("\x1b[2K").count(), 12);
        assert!(s.contains("\x1b[14;3H[1/3] a.jpg"));
    }

    #[test]
    fn test_render_status_clipped_to_width() {
        let s = rendered(|out| render_status(out, "abcdefghij", (8, 6)));
        assert!(s.contains("\x1b[5;3Habcd\x1b[0m"));
    }

    #[test]
    fn test_render_zero_size_is_noop() {
        assert!(rendered(|out| render_status(out, "x", (0, 0))).is_empty());
        assert!(rendered(|out| render_body(out, &Body::Loading, (0, 10))).is_empty());
    }

    #[test]
    fn test_clear_all() {
        let s = rendered(|out| clear_all(out, true));
        assert!(s.starts_with("\x1b_Gq=2,a=d,d=A"));
        assert!(s.ends_with("\x1b[2J\x1b[H"));
        let s = rendered(|out| clear_all(out, false));
        assert!(!s.contains("\x1b_G"));
    }
}
