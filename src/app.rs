// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Navigation state machine.
//!
//! `App` owns the session: the image list, the current selection, the viewport and the
//! payload on screen. It never does I/O itself. Transitions that need an image return a
//! `LoadRequest` for the event loop to dispatch, and finished loads come back through
//! `on_loaded`, which drops anything that no longer matches the current selection.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::WallpaperError;
use crate::protocol::EncodedPayload;
use crate::worker::{LoadRequest, LoadResult, ViewportSize};

pub const KEY_HELP: &str = "  |  h ←  l →  r rand  s set  q quit";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the first viewport size.
    Uninitialized,
    Loading,
    Ready,
    Error,
}

/// What the image half of the screen should show.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Body {
    Blank,
    Loading,
    Image(EncodedPayload),
}

pub struct App {
    images: Vec<PathBuf>,
    current_index: usize,
    viewport: Option<ViewportSize>,
    phase: Phase,
    status: String,
    payload: Option<EncodedPayload>,
    rng: StdRng,
}

impl App {
    pub fn new(images: Vec<PathBuf>, seed: u64) -> Self {
        Self {
            images,
            current_index: 0,
            viewport: None,
            phase: Phase::Uninitialized,
            status: String::new(),
            payload: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn current_path(&self) -> Option<&PathBuf> {
        self.images.get(self.current_index)
    }

    fn request_current(&mut self) -> Option<LoadRequest> {
        let viewport = self.viewport?;
        let path = self.current_path()?.clone();
        // A reload supersedes the failure it retries.
        if self.phase == Phase::Error {
            self.status.clear();
        }
        self.phase = Phase::Loading;
        self.payload = None;
        Some(LoadRequest {
            index: self.current_index,
            path,
            viewport,
        })
    }

    /// Record the terminal size. The first size (and any later change) reloads the
    /// current image for the new pixel box.
    pub fn on_resize(&mut self, viewport: ViewportSize) -> Option<LoadRequest> {
        if self.viewport == Some(viewport) {
            return None;
        }
        self.viewport = Some(viewport);
        self.request_current()
    }

    fn navigate_to(&mut self, index: usize) -> Option<LoadRequest> {
        if !matches!(self.phase, Phase::Ready | Phase::Error) || index == self.current_index {
            return None;
        }
        self.current_index = index;
        self.status.clear();
        self.request_current()
    }

    /// Move to the next image; stays on the last one.
    pub fn next(&mut self) -> Option<LoadRequest> {
        let last = self.images.len().checked_sub(1)?;
        self.navigate_to((self.current_index + 1).min(last))
    }

    /// Move to the previous image; stays on the first one.
    pub fn prev(&mut self) -> Option<LoadRequest> {
        self.navigate_to(self.current_index.saturating_sub(1))
    }

    /// Jump to a uniformly chosen image other than the current one.
    pub fn random(&mut self) -> Option<LoadRequest> {
        let n = self.images.len();
        if n < 2 || !matches!(self.phase, Phase::Ready | Phase::Error) {
            return None;
        }
        let mut idx = self.rng.gen_range(0..n - 1);
        if idx >= self.current_index {
            idx += 1;
        }
        self.navigate_to(idx)
    }

    /// Merge a finished load. Returns `false` when the result was stale and dropped.
    pub fn on_loaded(&mut self, result: LoadResult) -> bool {
        let req = &result.request;
        if req.index != self.current_index || Some(req.viewport) != self.viewport {
            debug!(
                index = req.index,
                current = self.current_index,
                "discarding stale load result"
            );
            return false;
        }
        match result.outcome {
            Ok(payload) => {
                self.payload = Some(payload);
                self.phase = Phase::Ready;
            }
            Err(msg) => {
                self.payload = None;
                self.status = msg;
                self.phase = Phase::Error;
            }
        }
        true
    }

    /// Run `set` on the current image and report the outcome in the status line.
    pub fn apply_wallpaper(
        &mut self,
        set: impl FnOnce(&Path) -> Result<(), WallpaperError>,
    ) {
        if self.phase == Phase::Uninitialized {
            return;
        }
        let Some(path) = self.current_path().cloned() else {
            return;
        };
        self.status = match set(&path) {
            Ok(()) => format!("Wallpaper set → {}", self.current_image_name()),
            Err(e) => e.to_string(),
        };
    }

    pub fn current_image_name(&self) -> String {
        self.current_path()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }

    /// The status message if there is one, otherwise the position and file name.
    pub fn status_text(&self) -> String {
        if !self.status.is_empty() {
            return self.status.clone();
        }
        format!(
            "[{}/{}] {}",
            self.current_index + 1,
            self.images.len(),
            self.current_image_name(),
        )
    }

    pub fn body(&self) -> Body {
        match (self.phase, &self.payload) {
            (Phase::Loading, _) => Body::Loading,
            (_, Some(payload)) => Body::Image(payload.clone()),
            _ => Body::Blank,
        }
    }
}
