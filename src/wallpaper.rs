// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Desktop wallpaper integration.

use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{info, warn};

use crate::error::WallpaperError;

/// Set `path` as the desktop wallpaper using the platform's own tooling.
pub fn set_wallpaper(path: &Path) -> Result<(), WallpaperError> {
    let result = set_wallpaper_for(std::env::consts::OS, path);
    match &result {
        Ok(()) => info!(path = %path.display(), "wallpaper set"),
        Err(e) => warn!(path = %path.display(), error = %e, "wallpaper change failed"),
    }
    result
}

fn set_wallpaper_for(os: &str, path: &Path) -> Result<(), WallpaperError> {
    match os {
        "macos" => run(
            "osascript",
            Command::new("osascript").args(["-e", finder_script(path).as_str()]),
        ),
        "linux" => {
            let waypaper = run(
                "waypaper",
                Command::new("waypaper").arg("--wallpaper").arg(path),
            );
            match waypaper {
                Err(WallpaperError::Spawn { source, .. }) if source.kind() == ErrorKind::NotFound => {
                    run(
                        "gsettings",
                        Command::new("gsettings").args([
                            "set",
                            "org.gnome.desktop.background",
                            "picture-uri",
                            file_uri(path).as_str(),
                        ]),
                    )
                }
                other => other,
            }
        }
        other => Err(WallpaperError::NotImplemented(static_os_name(other))),
    }
}

/// Run a helper without touching the terminal; only its stderr is kept for the status line.
fn run(program: &'static str, cmd: &mut Command) -> Result<(), WallpaperError> {
    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| WallpaperError::Spawn { program, source })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(WallpaperError::Failed {
            program,
            status: output.status,
            stderr: first_line(&output.stderr),
        })
    }
}

fn first_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn finder_script(path: &Path) -> String {
    format!(
        "tell application \"Finder\" to set desktop picture to POSIX file \"{}\"",
        path.display()
    )
}

fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn static_os_name(os: &str) -> &'static str {
    // `std::env::consts::OS` values are all static; anything else is reported generically.
    [
        "windows", "ios", "android", "freebsd", "dragonfly", "netbsd", "openbsd", "solaris",
        "illumos",
    ]
    .into_iter()
    .find(|&known| known == os)
    .unwrap_or("this platform")
}
