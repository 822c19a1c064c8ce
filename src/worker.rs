// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Background image loading.
//!
//! Every request becomes its own task on a small rayon pool and answers with exactly one
//! `LoadResult` on a channel the event loop polls. Tasks are never cancelled; deciding
//! whether a result is still wanted is the caller's job.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use anyhow::Result;
use tracing::{debug, error};

use crate::loader::ImageLoader;
use crate::protocol::EncodedPayload;

/// Terminal size in character cells plus the pixel box derived from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewportSize {
    pub cols: u16,
    pub rows: u16,
    pub cell_px: (u32, u32),
}

impl ViewportSize {
    pub fn new(cols: u16, rows: u16, cell_px: (u32, u32)) -> Self {
        Self {
            cols,
            rows,
            cell_px,
        }
    }

    /// Image area in pixels: full width, top half of the rows.
    pub fn target_px(&self) -> (u32, u32) {
        (
            u32::from(self.cols) * self.cell_px.0,
            u32::from(self.rows / 2) * self.cell_px.1,
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadRequest {
    pub index: usize,
    pub path: PathBuf,
    pub viewport: ViewportSize,
}

pub struct LoadResult {
    pub request: LoadRequest,
    pub outcome: Result<EncodedPayload, String>,
}

pub struct LoadWorker {
    pool: rayon::ThreadPool,
    loader: Arc<ImageLoader>,
    result_tx: Sender<LoadResult>,
    result_rx: Receiver<LoadResult>,
}

impl LoadWorker {
    pub fn new(loader: ImageLoader, threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("wallpeek-load-{i}"))
            .build()?;
        let (result_tx, result_rx) = mpsc::channel::<LoadResult>();
        Ok(Self {
            pool,
            loader: Arc::new(loader),
            result_tx,
            result_rx,
        })
    }

    pub fn request(&self, req: LoadRequest) {
        let loader = Arc::clone(&self.loader);
        let result_tx = self.result_tx.clone();
        debug!(index = req.index, path = %req.path.display(), "load requested");

        self.pool.spawn(move || {
            let (target_w, target_h) = req.viewport.target_px();
            let outcome = guarded(|| {
                loader
                    .load(&req.path, (target_w, target_h), target_w)
                    .map_err(|e| e.to_string())
            });
            let _ = result_tx.send(LoadResult {
                request: req,
                outcome,
            });
        });
    }

    pub fn try_recv(&self) -> Option<LoadResult> {
        self.result_rx.try_recv().ok()
    }
}

/// Run one load, turning a panic (e.g. inside a decoder) into an error outcome.
fn guarded(
    f: impl FnOnce() -> Result<EncodedPayload, String>,
) -> Result<EncodedPayload, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!(panic = %msg, "image load panicked");
        Err(format!("cannot load image: {msg}"))
    })
}
