// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Application entry point and event loop.
//!
//! This module:
//! - parses the CLI (one image directory)
//! - checks that the terminal can show images
//! - runs the input loop (navigation, random pick, wallpaper, quit)
//! - hands load requests to the worker pool and merges the results
//!
//! Terminal output is centralized in `TerminalWriter` (see `src/sender.rs`).

mod app;
mod cache;
mod codec;
mod config;
mod error;
mod fit;
mod kgp;
mod loader;
mod logging;
mod protocol;
mod sender;
mod wallpaper;
mod worker;

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal,
};
use ratatui_image::picker::Picker;
use tracing::{debug, info};

use crate::app::{App, KEY_HELP};
use crate::cache::DiskCache;
use crate::config::Config;
use crate::loader::ImageLoader;
use crate::protocol::{GraphicsProtocol, ProtocolEncoder};
use crate::sender::{TerminalWriter, WriterRequest};
use crate::worker::{LoadRequest, LoadWorker, ViewportSize};

#[derive(Parser, Debug)]
#[command(name = "wallpeek", about = "Browse images in the terminal and set the wallpaper")]
struct Cli {
    /// Directory containing .jpg/.jpeg/.png images
    dir: Option<PathBuf>,
}

const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Images directly inside `dir`, sorted by path. Subdirectories are not visited.
fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("cannot read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && is_image_file(p))
        .collect();
    images.sort();
    if images.is_empty() {
        anyhow::bail!("No image files found in directory: {}", dir.display());
    }
    Ok(images)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Quit,
    Next,
    Prev,
    Random,
    SetWallpaper,
}

fn action_for(key: &KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char('l') | KeyCode::Right => Some(Action::Next),
        KeyCode::Char('h') | KeyCode::Left => Some(Action::Prev),
        KeyCode::Char('r') => Some(Action::Random),
        KeyCode::Char('s') | KeyCode::Enter => Some(Action::SetWallpaper),
        _ => None,
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

/// Cell size in pixels: measured by the terminal query when enabled, else configured.
fn cell_px_for(picker: Option<&Picker>, config: &Config) -> (u32, u32) {
    match picker {
        Some(p) if config.detect_cell_size => {
            let (w, h) = p.font_size();
            (u32::from(w).max(1), u32::from(h).max(1))
        }
        _ => (config.cell_width_px, config.cell_height_px),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let Some(dir) = cli.dir else {
        println!("Usage: wallpeek <images-folder>");
        return Ok(());
    };

    let config = Config::load();
    logging::init(config.log_file.as_deref())?;

    let images = collect_images(&dir)?;

    let use_alt = config.use_alt_screen();
    init_terminal(use_alt)?;

    // The capability query expects raw mode and the final screen to be active.
    let picker = Picker::from_query_stdio().ok();
    let Some(protocol) = protocol::detect(picker.as_ref()) else {
        restore_terminal(use_alt);
        println!("Terminal does not support kitty/iTerm graphics.");
        return Ok(());
    };

    let cell_px = cell_px_for(picker.as_ref(), &config);
    info!(
        protocol = protocol.name(),
        ?cell_px,
        images = images.len(),
        dir = %dir.display(),
        "starting"
    );

    let result = run(images, &config, protocol, cell_px);
    restore_terminal(use_alt);

    result
}

fn run(
    images: Vec<PathBuf>,
    config: &Config,
    protocol: GraphicsProtocol,
    cell_px: (u32, u32),
) -> Result<()> {
    let encoder = ProtocolEncoder::new(protocol, cell_px.0, config.compression_level());
    let cache = config
        .cache_location()
        .map(|dir| DiskCache::new(dir, protocol));
    let worker = LoadWorker::new(ImageLoader::new(cache, encoder), config.load_threads)?;
    let writer = TerminalWriter::new();
    let is_kitty = protocol == GraphicsProtocol::Kitty;

    let mut app = App::new(images, config.seed.unwrap_or_else(clock_seed));
    let mut size = terminal::size()?;
    let mut last_status: Option<String> = None;
    let mut body_dirty = true;

    let dispatch = |req: Option<LoadRequest>, body_dirty: &mut bool| {
        if let Some(req) = req {
            writer.send(WriterRequest::Clear { kitty: is_kitty });
            worker.request(req);
            *body_dirty = true;
        }
    };

    dispatch(
        app.on_resize(ViewportSize::new(size.0, size.1, cell_px)),
        &mut body_dirty,
    );

    loop {
        while let Some(result) = worker.try_recv() {
            if app.on_loaded(result) {
                debug!(index = app.current_index(), phase = ?app.phase(), "load merged");
                body_dirty = true;
            }
        }

        let mut should_quit = false;
        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    let req = match action_for(&key) {
                        Some(Action::Quit) => {
                            should_quit = true;
                            break;
                        }
                        Some(Action::Next) => app.next(),
                        Some(Action::Prev) => app.prev(),
                        Some(Action::Random) => app.random(),
                        Some(Action::SetWallpaper) => {
                            app.apply_wallpaper(wallpaper::set_wallpaper);
                            None
                        }
                        None => None,
                    };
                    dispatch(req, &mut body_dirty);
                }
                Event::Resize(w, h) => {
                    size = (w, h);
                    body_dirty = true;
                    dispatch(
                        app.on_resize(ViewportSize::new(w, h, cell_px)),
                        &mut body_dirty,
                    );
                }
                _ => {}
            }
        }

        if should_quit {
            if is_kitty {
                writer.send(WriterRequest::Clear { kitty: true });
            }
            break;
        }

        if body_dirty {
            let body = app.body();
            writer.send(WriterRequest::Body { body, size });
            // A cleared screen or a freshly printed image may have disturbed the status rows.
            last_status = None;
            body_dirty = false;
        }

        let status_now = format!("{}{KEY_HELP}", app.status_text());
        if last_status.as_deref() != Some(status_now.as_str()) {
            writer.send(WriterRequest::Status {
                text: status_now.clone(),
                size,
            });
            last_status = Some(status_now);
        }

        let _ = event::poll(Duration::from_millis(16));
    }

    Ok(())
}

fn init_terminal(use_alt_screen: bool) -> std::io::Result<()> {
    use std::io::stdout;

    use ratatui::crossterm::{
        cursor::{Hide, MoveTo},
        execute,
        terminal::{Clear, ClearType, EnterAlternateScreen, enable_raw_mode},
    };

    enable_raw_mode()?;
    if use_alt_screen {
        execute!(stdout(), EnterAlternateScreen)?;
    }
    execute!(stdout(), Clear(ClearType::All), MoveTo(0, 0), Hide)?;
    Ok(())
}

fn restore_terminal(use_alt_screen: bool) {
    use std::io::stdout;

    use ratatui::crossterm::{
        cursor::Show,
        execute,
        terminal::{LeaveAlternateScreen, disable_raw_mode},
    };

    let _ = disable_raw_mode();
    if use_alt_screen {
        let _ = execute!(stdout(), LeaveAlternateScreen);
    }
    let _ = execute!(stdout(), Show);
}
