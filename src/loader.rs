// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Image loading pipeline: stat → cache lookup → decode → resize → encode → cache write.
//!
//! This is the unit of work run off the event loop. It holds no mutable state, so one
//! loader is shared by every task.

use std::path::Path;
use std::time::Instant;

use tracing::debug;

use crate::cache::{CacheKey, DiskCache};
use crate::codec;
use crate::error::LoadError;
use crate::fit::resize_nearest;
use crate::protocol::{EncodedPayload, ProtocolEncoder};

pub struct ImageLoader {
    cache: Option<DiskCache>,
    encoder: ProtocolEncoder,
}

impl ImageLoader {
    pub fn new(cache: Option<DiskCache>, encoder: ProtocolEncoder) -> Self {
        Self { cache, encoder }
    }

    /// Produce the payload for `path` fitted into `target` pixels and centered within
    /// `container_px_w`.
    ///
    /// A failure at any step returns early and nothing is cached. A failed cache write
    /// is logged and otherwise ignored.
    pub fn load(
        &self,
        path: &Path,
        target: (u32, u32),
        container_px_w: u32,
    ) -> Result<EncodedPayload, LoadError> {
        let meta =
            std::fs::metadata(path).map_err(|e| LoadError::from_stat(path.to_path_buf(), e))?;
        let modified = meta
            .modified()
            .map_err(|e| LoadError::from_stat(path.to_path_buf(), e))?;
        let key = CacheKey::new(modified, target.0, target.1);

        if let Some(payload) = self.cache.as_ref().and_then(|c| c.get(&key)) {
            return Ok(payload);
        }

        let decode_start = Instant::now();
        let bytes = std::fs::read(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let decoded = codec::decode(&bytes)?;
        let decode_elapsed = decode_start.elapsed();

        let resize_start = Instant::now();
        let resized = resize_nearest(&decoded, target.0, target.1);
        let resize_elapsed = resize_start.elapsed();

        let encode_start = Instant::now();
        let payload = self.encoder.encode(&resized, container_px_w)?;
        let encode_elapsed = encode_start.elapsed();

        debug!(
            path = %path.display(),
            orig = ?(decoded.width(), decoded.height()),
            actual = ?resized.dimensions(),
            ?target,
            ?decode_elapsed,
            ?resize_elapsed,
            ?encode_elapsed,
            "rendered image"
        );

        if let Some(cache) = &self.cache {
            let _ = cache.put(&key, &payload);
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::GraphicsProtocol;
    use image::{ImageFormat, RgbImage};
    use std::path::PathBuf;

    fn write_png(path: &Path, w: u32, h: u32) {
        RgbImage::from_pixel(w, h, image::Rgb([0, 128, 255]))
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    fn loader(cache_dir: Option<PathBuf>) -> ImageLoader {
        let encoder = ProtocolEncoder::new(GraphicsProtocol::Kitty, 8, Some(6));
        ImageLoader::new(
            cache_dir.map(|d| DiskCache::new(d, GraphicsProtocol::Kitty)),
            encoder,
        )
    }

    fn cache_entries(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|e| e == "esq"))
            .collect()
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = loader(None)
            .load(&dir.path().join("nope.png"), (80, 80), 80)
            .unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }

    #[test]
    fn test_load_corrupt_file_is_decode_error_and_not_cached() {
        let src = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let path = src.path().join("bad.png");
        std::fs::write(&path, b"not a png").unwrap();

        let err = loader(Some(cache.path().to_path_buf()))
            .load(&path, (80, 80), 80)
            .unwrap_err();
        assert!(matches!(err, LoadError::Decode(_)));
        assert!(cache_entries(cache.path()).is_empty());
    }

    #[test]
    fn test_load_without_protocol_is_encode_error() {
        let src = tempfile::tempdir().unwrap();
        let path = src.path().join("a.png");
        write_png(&path, 4, 4);

        let loader = ImageLoader::new(None, ProtocolEncoder::unsupported(8));
        let err = loader.load(&path, (80, 80), 80).unwrap_err();
        assert!(matches!(err, LoadError::Encode(_)));
    }

    #[test]
    fn test_load_writes_cache_entry() {
        let src = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let path = src.path().join("a.png");
        write_png(&path, 40, 20);

        let payload = loader(Some(cache.path().to_path_buf()))
            .load(&path, (160, 160), 160)
            .unwrap();
        let entries = cache_entries(cache.path());
        assert_eq!(entries.len(), 1);
        assert_eq!(std::fs::read(&entries[0]).unwrap(), payload.to_vec());
        // 160x80 image inside a 20-cell container -> no padding.
        assert!(payload.starts_with(b"\x1b_G"));
        assert!(payload.ends_with(b"\n"));
    }

    #[test]
    fn test_second_load_is_served_from_cache() {
        let src = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let path = src.path().join("a.png");
        write_png(&path, 30, 30);
        let loader = loader(Some(cache.path().to_path_buf()));

        let first = loader.load(&path, (64, 64), 64).unwrap();

        // Replace the stored entry with a marker: if the pipeline ran again the marker
        // would be overwritten by the real payload.
        let entries = cache_entries(cache.path());
        assert_eq!(entries.len(), 1);
        std::fs::write(&entries[0], b"cached-marker").unwrap();

        let second = loader.load(&path, (64, 64), 64).unwrap();
        assert_eq!(&second[..], b"cached-marker");
        assert_ne!(first, second);
    }

    #[test]
    fn test_same_key_gives_identical_payload() {
        let src = tempfile::tempdir().unwrap();
        let path = src.path().join("a.png");
        write_png(&path, 33, 17);

        let uncached = loader(None);
        let a = uncached.load(&path, (100, 50), 120).unwrap();
        let b = uncached.load(&path, (100, 50), 120).unwrap();
        assert_eq!(a, b);

        let cache = tempfile::tempdir().unwrap();
        let cached = loader(Some(cache.path().to_path_buf()));
        let fresh = cached.load(&path, (100, 50), 120).unwrap();
        let hit = cached.load(&path, (100, 50), 120).unwrap();
        assert_eq!(fresh, a);
        assert_eq!(hit, a);
    }

    #[test]
    fn test_different_target_is_a_different_entry() {
        let src = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let path = src.path().join("a.png");
        write_png(&path, 10, 10);
        let loader = loader(Some(cache.path().to_path_buf()));

        loader.load(&path, (64, 64), 64).unwrap();
        loader.load(&path, (32, 64), 32).unwrap();
        assert_eq!(cache_entries(cache.path()).len(), 2);
    }

    #[test]
    fn test_unwritable_cache_does_not_fail_load() {
        let src = tempfile::tempdir().unwrap();
        let path = src.path().join("a.png");
        write_png(&path, 10, 10);
        let blocker = src.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let payload = loader(Some(blocker.join("cache"))).load(&path, (16, 16), 16);
        assert!(payload.is_ok());
    }
}
