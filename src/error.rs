// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Error types for the per-image pipeline and the wallpaper command.
//!
//! Startup failures (unreadable directory, unsupported terminal) go through `anyhow` in
//! `main`; everything here is non-fatal and ends up as status text.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("cannot decode image: {0}")]
pub struct DecodeError(#[from] pub image::ImageError);

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("no supported graphics protocol")]
    Unsupported,
    #[error("cannot encode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("cannot compress image data: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("cannot stat {}: {source}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl LoadError {
    /// Classify a metadata/read failure, separating a missing file from other I/O errors.
    pub fn from_stat(path: PathBuf, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            LoadError::NotFound(path)
        } else {
            LoadError::Stat { path, source }
        }
    }
}

#[derive(Debug, Error)]
pub enum WallpaperError {
    #[error("wallpaper change not implemented on {0}")]
    NotImplemented(&'static str),
    #[error("cannot run {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} failed ({status}){}", stderr_suffix(.stderr))]
    Failed {
        program: &'static str,
        status: ExitStatus,
        stderr: String,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}
