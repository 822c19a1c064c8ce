// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Configuration management.
//!
//! Config values are loaded with the following priority (highest to lowest):
//! 1. Environment variables (WALLPEEK_*)
//! 2. Config file (~/.config/wallpeek/config.toml)
//! 3. Default values

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cell_width_px: u32,
    pub cell_height_px: u32,
    pub detect_cell_size: bool,
    pub cache_dir: Option<PathBuf>,
    pub no_cache: bool,
    pub kitty_compress: bool,
    pub compress_level: u32,
    pub load_threads: usize,
    pub seed: Option<u64>,
    pub log_file: Option<PathBuf>,
    pub force_alt_screen: bool,
    pub no_alt_screen: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cell_width_px: 8,
            cell_height_px: 16,
            detect_cell_size: false,
            cache_dir: None,
            no_cache: false,
            kitty_compress: true,
            compress_level: 6,
            load_threads: 2,
            seed: None,
            log_file: None,
            force_alt_screen: false,
            no_alt_screen: false,
        }
    }
}

impl Config {
    /// Load config with priority: env vars > config file > defaults
    pub fn load() -> Self {
        let mut config = Self::load_from_file().unwrap_or_default();
        config.apply_env_overrides();
        config.clamp_values();
        config
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("wallpeek").join("config.toml"))
    }

    fn load_from_file() -> Option<Self> {
        let path = Self::config_path()?;
        let content = std::fs::read_to_string(path).ok()?;
        toml::from_str(&content).ok()
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = Self::parse_env::<u32>("WALLPEEK_CELL_WIDTH") {
            self.cell_width_px = v;
        }
        if let Some(v) = Self::parse_env::<u32>("WALLPEEK_CELL_HEIGHT") {
            self.cell_height_px = v;
        }
        if std::env::var_os("WALLPEEK_DETECT_CELL_SIZE").is_some() {
            self.detect_cell_size = true;
        }
        if let Some(v) = std::env::var_os("WALLPEEK_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(v));
        }
        if std::env::var_os("WALLPEEK_NO_CACHE").is_some() {
            self.no_cache = true;
        }
        if std::env::var_os("WALLPEEK_KITTY_NO_COMPRESS").is_some() {
            self.kitty_compress = false;
        }
        if let Some(v) = Self::parse_env::<u32>("WALLPEEK_COMPRESS_LEVEL") {
            self.compress_level = v;
        }
        if let Some(v) = Self::parse_env::<usize>("WALLPEEK_LOAD_THREADS") {
            self.load_threads = v;
        }
        if let Some(v) = Self::parse_env::<u64>("WALLPEEK_SEED") {
            self.seed = Some(v);
        }
        if let Some(v) = std::env::var_os("WALLPEEK_LOG") {
            self.log_file = Some(PathBuf::from(v));
        }
        if std::env::var_os("WALLPEEK_FORCE_ALT_SCREEN").is_some() {
            self.force_alt_screen = true;
        }
        if std::env::var_os("WALLPEEK_NO_ALT_SCREEN").is_some() {
            self.no_alt_screen = true;
        }
    }

    fn clamp_values(&mut self) {
        const MAX_CELL_PX: u32 = 64;
        const MAX_COMPRESS_LEVEL: u32 = 9;

        self.cell_width_px = self.cell_width_px.clamp(1, MAX_CELL_PX);
        self.cell_height_px = self.cell_height_px.clamp(1, MAX_CELL_PX);
        self.compress_level = self.compress_level.min(MAX_COMPRESS_LEVEL);
        self.load_threads = self.load_threads.clamp(1, 8);
    }

    fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
        std::env::var(key).ok()?.parse().ok()
    }

    pub fn compression_level(&self) -> Option<u32> {
        if self.kitty_compress {
            Some(self.compress_level)
        } else {
            None
        }
    }

    /// Directory holding encoded payloads; `None` when caching is disabled.
    pub fn cache_location(&self) -> Option<PathBuf> {
        if self.no_cache {
            return None;
        }
        Some(self.cache_dir.clone().unwrap_or_else(std::env::temp_dir))
    }

    pub fn use_alt_screen(&self) -> bool {
        self.force_alt_screen || !self.no_alt_screen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.cell_width_px, 8);
        assert_eq!(config.cell_height_px, 16);
        assert_eq!(config.compress_level, 6);
        assert_eq!(config.load_threads, 2);
        assert!(config.seed.is_none());
        assert!(!config.no_cache);
        assert!(config.use_alt_screen());
    }

    #[test]
    fn test_clamp_values() {
        let mut config = Config {
            cell_width_px: 0,
            cell_height_px: 1000,
            compress_level: 20,
            load_threads: 0,
            ..Default::default()
        };
        config.clamp_values();
        assert_eq!(config.cell_width_px, 1);
        assert_eq!(config.cell_height_px, 64);
        assert_eq!(config.compress_level, 9);
        assert_eq!(config.load_threads, 1);
    }

    #[test]
    fn test_compression_level() {
        let config = Config::default();
        assert_eq!(config.compression_level(), Some(6));

        let config = Config {
            kitty_compress: false,
            ..Default::default()
        };
        assert_eq!(config.compression_level(), None);
    }

    #[test]
    fn test_cache_location() {
        let config = Config::default();
        assert_eq!(config.cache_location(), Some(std::env::temp_dir()));

        let config = Config {
            cache_dir: Some(PathBuf::from("/var/cache/wp")),
            ..Default::default()
        };
        assert_eq!(config.cache_location(), Some(PathBuf::from("/var/cache/wp")));

        let config = Config {
            no_cache: true,
            ..Default::default()
        };
        assert_eq!(config.cache_location(), None);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str("cell_width_px = 10\nseed = 42\n").unwrap();
        assert_eq!(config.cell_width_px, 10);
        assert_eq!(config.cell_height_px, 16);
        assert_eq!(config.seed, Some(42));
    }
}
