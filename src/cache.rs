// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! On-disk cache of encoded terminal payloads.
//!
//! Entries are addressed by file name only, so separate processes agree on where a payload
//! lives. The key is built from the source file's modification time and the target pixel
//! box: editing the file or resizing the terminal produces a new key, and the old entry is
//! simply never read again. There is no eviction.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::protocol::{EncodedPayload, GraphicsProtocol};

const FILE_PREFIX: &str = "wp";
const FILE_EXTENSION: &str = "esq";

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub mtime_ns: u128,
    pub width: u32,
    pub height: u32,
}

impl CacheKey {
    pub fn new(modified: SystemTime, width: u32, height: u32) -> Self {
        let mtime_ns = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        Self {
            mtime_ns,
            width,
            height,
        }
    }
}

pub struct DiskCache {
    dir: PathBuf,
    protocol: GraphicsProtocol,
}

impl DiskCache {
    /// Payloads differ per protocol, so the protocol is part of every file name.
    pub fn new(dir: PathBuf, protocol: GraphicsProtocol) -> Self {
        Self { dir, protocol }
    }

    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!(
            "{FILE_PREFIX}-{:x}-{}x{}-{}.{FILE_EXTENSION}",
            key.mtime_ns,
            key.width,
            key.height,
            self.protocol.name(),
        ))
    }

    /// Read a cached payload. Any read failure counts as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<EncodedPayload> {
        let path = self.entry_path(key);
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(path = %path.display(), len = bytes.len(), "cache hit");
                Some(EncodedPayload::from(bytes))
            }
            Err(_) => {
                debug!(path = %path.display(), "cache miss");
                None
            }
        }
    }

    /// Best-effort write. Writes go to a temporary name first and are renamed into place so
    /// a concurrent reader never sees a partial entry.
    pub fn put(&self, key: &CacheKey, payload: &[u8]) -> std::io::Result<()> {
        let path = self.entry_path(key);
        let tmp = temp_path(&path);
        fs::create_dir_all(&self.dir)?;
        if let Err(e) = fs::write(&tmp, payload).and_then(|()| fs::rename(&tmp, &path)) {
            let _ = fs::remove_file(&tmp);
            warn!(path = %path.display(), error = %e, "cache write failed");
            return Err(e);
        }
        debug!(path = %path.display(), len = payload.len(), "cache write");
        Ok(())
    }
}

/// Scratch name unique per process and per write, so two writers of one key never share it.
fn temp_path(path: &Path) -> PathBuf {
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    path.with_extension(format!("{FILE_EXTENSION}.{}.{seq}.tmp", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key(ns: u64, w: u32, h: u32) -> CacheKey {
        CacheKey::new(UNIX_EPOCH + Duration::from_nanos(ns), w, h)
    }

    #[test]
    fn test_key_from_mtime() {
        let k = key(1_700_000_000_123, 640, 480);
        assert_eq!(k.mtime_ns, 1_700_000_000_123);
        assert_eq!((k.width, k.height), (640, 480));
    }

    #[test]
    fn test_entry_path_is_deterministic() {
        let cache = DiskCache::new(PathBuf::from("/tmp/c"), GraphicsProtocol::Kitty);
        let other = DiskCache::new(PathBuf::from("/tmp/c"), GraphicsProtocol::Kitty);
        let k = key(0xabc, 800, 400);
        assert_eq!(cache.entry_path(&k), other.entry_path(&k));
        assert_eq!(
            cache.entry_path(&k),
            PathBuf::from("/tmp/c/wp-abc-800x400-kitty.esq")
        );
    }

    #[test]
    fn test_entry_path_changes_with_key_and_protocol() {
        let kitty = DiskCache::new(PathBuf::from("/tmp/c"), GraphicsProtocol::Kitty);
        let iterm = DiskCache::new(PathBuf::from("/tmp/c"), GraphicsProtocol::Iterm2);
        let k = key(1, 800, 400);
        assert_ne!(kitty.entry_path(&k), kitty.entry_path(&key(2, 800, 400)));
        assert_ne!(kitty.entry_path(&k), kitty.entry_path(&key(1, 800, 401)));
        assert_ne!(kitty.entry_path(&k), iterm.entry_path(&k));
    }

    #[test]
    fn test_get_miss_then_put_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().to_path_buf(), GraphicsProtocol::Kitty);
        let k = key(42, 16, 16);

        assert!(cache.get(&k).is_none());
        cache.put(&k, b"  \x1b_Gpayload\x1b\\\n").unwrap();
        let hit = cache.get(&k).unwrap();
        assert_eq!(&hit[..], b"  \x1b_Gpayload\x1b\\\n");
    }

    #[test]
    fn test_put_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().to_path_buf(), GraphicsProtocol::Iterm2);
        cache.put(&key(7, 1, 1), b"x").unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].to_string_lossy().ends_with(".esq"));
    }

    #[test]
    fn test_put_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"").unwrap();
        let cache = DiskCache::new(blocker.join("sub"), GraphicsProtocol::Kitty);
        assert!(cache.put(&key(1, 1, 1), b"x").is_err());
    }

    #[test]
    fn test_temp_path_is_unique_per_write() {
        let entry = PathBuf::from("/tmp/c/wp-1-2x2-kitty.esq");
        let a = temp_path(&entry);
        let b = temp_path(&entry);
        assert_ne!(a, b);
        assert_eq!(a.parent(), entry.parent());
        assert!(a.to_string_lossy().ends_with(".tmp"));
    }

    #[test]
    fn test_concurrent_puts_of_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().to_path_buf(), GraphicsProtocol::Kitty);
        let k = key(9, 32, 32);
        let payload = vec![b'p'; 256 * 1024];

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| cache.put(&k, &payload).unwrap());
            }
        });

        assert_eq!(&cache.get(&k).unwrap()[..], &payload[..]);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
