//! Durable record of already-relayed post ids
//!
//! The backing store is a flat, append-only, newline-delimited file of
//! decimal ids. It is read fully once at startup and only ever appended to
//! afterwards; no other process is assumed to write it.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::{CacheError, Result};

/// Persistent dedup store keyed by source post id.
pub struct RelayCache {
    path: PathBuf,
    relayed: HashSet<u64>,
}

impl RelayCache {
    /// Open the cache file, creating it empty if absent.
    ///
    /// Load-time reconstruction is tolerant: malformed and blank lines are
    /// discarded with a warning rather than failing the whole load, so a
    /// torn final write never bricks the relay.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(CacheError::Open)?;
            }
        }

        if !path.exists() {
            File::create(&path).map_err(CacheError::Open)?;
            debug!(path = %path.display(), "created empty relay cache");
            return Ok(Self {
                path,
                relayed: HashSet::new(),
            });
        }

        let content = fs::read_to_string(&path).map_err(CacheError::Open)?;
        let mut relayed = HashSet::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.parse::<u64>() {
                Ok(id) => {
                    relayed.insert(id);
                }
                Err(_) => warn!(%line, "discarding malformed relay cache entry"),
            }
        }

        debug!(path = %path.display(), entries = relayed.len(), "loaded relay cache");
        Ok(Self { path, relayed })
    }

    /// Whether a destination post has already been created for this id.
    pub fn contains(&self, id: u64) -> bool {
        self.relayed.contains(&id)
    }

    /// Record a successfully relayed post id. Idempotent.
    ///
    /// The durable append happens before the in-memory insert: if the append
    /// fails, the id stays out of the set and the post reads as not-yet-
    /// relayed on the next cycle. That trades a possible duplicate delivery
    /// for never silently losing the record.
    pub fn commit(&mut self, id: u64) -> Result<()> {
        if self.relayed.contains(&id) {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(CacheError::Append)?;
        writeln!(file, "{}", id).map_err(CacheError::Append)?;
        file.sync_data().map_err(CacheError::Append)?;

        self.relayed.insert(id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.relayed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relayed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache_in(dir: &TempDir) -> RelayCache {
        RelayCache::open(dir.path().join("relayed.ids")).unwrap()
    }

    #[test]
    fn test_open_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relayed.ids");
        assert!(!path.exists());

        let cache = RelayCache::open(&path).unwrap();
        assert!(path.exists());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_open_creates_missing_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("relayed.ids");

        let cache = RelayCache::open(&path).unwrap();
        assert!(path.exists());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_commit_then_contains() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache_in(&dir);

        assert!(!cache.contains(100));
        cache.commit(100).unwrap();
        assert!(cache.contains(100));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_commit_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relayed.ids");
        let mut cache = RelayCache::open(&path).unwrap();

        cache.commit(7).unwrap();
        cache.commit(7).unwrap();
        cache.commit(7).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "7\n");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_commits_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relayed.ids");

        {
            let mut cache = RelayCache::open(&path).unwrap();
            cache.commit(1).unwrap();
            cache.commit(2).unwrap();
            cache.commit(3).unwrap();
        }

        let cache = RelayCache::open(&path).unwrap();
        assert!(cache.contains(1));
        assert!(cache.contains(2));
        assert!(cache.contains(3));
        assert!(!cache.contains(4));
    }

    #[test]
    fn test_load_discards_malformed_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relayed.ids");
        fs::write(&path, "10\n\nnot-a-number\n 20 \n30\n\n").unwrap();

        let cache = RelayCache::open(&path).unwrap();
        assert_eq!(cache.len(), 3);
        assert!(cache.contains(10));
        assert!(cache.contains(20));
        assert!(cache.contains(30));
    }

    #[test]
    fn test_append_preserves_existing_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relayed.ids");
        fs::write(&path, "1\n2\n").unwrap();

        let mut cache = RelayCache::open(&path).unwrap();
        cache.commit(3).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "1\n2\n3\n");
    }
}
