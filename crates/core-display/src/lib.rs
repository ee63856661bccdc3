//! Virtual display number allocation.
//!
//! X servers advertise a claimed display `:N` through the host-wide lock
//! marker `/tmp/.X<N>-lock`. The allocator scans upward from a monotonic
//! candidate, skipping every number with a live marker, so sessions in this
//! process never collide with each other or with unrelated X servers on the
//! host. Numbers are not reclaimed on destroy; the same lock-file check on
//! the next allocation handles cross-process reuse.

use std::path::{Path, PathBuf};

use core_api::{Error, Result};
use tracing::debug;

/// First candidate display number. High enough to stay clear of the
/// physical-seat displays (`:0`, `:1`) common on developer hosts.
const FIRST_CANDIDATE: u32 = 99;

/// Upper bound on a single scan. Exhausting this means the host has
/// thousands of stale lock files and is misconfigured.
const SCAN_LIMIT: u32 = 10_000;

/// Allocates display numbers against the host lock-file convention.
#[derive(Debug)]
pub struct DisplayAllocator {
    next: u32,
    lock_dir: PathBuf,
}

impl Default for DisplayAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayAllocator {
    pub fn new() -> Self {
        Self::with_lock_dir("/tmp")
    }

    /// Allocator probing an alternate lock directory. Production always uses
    /// `/tmp`; tests substitute a scratch directory.
    pub fn with_lock_dir(lock_dir: impl AsRef<Path>) -> Self {
        Self {
            next: FIRST_CANDIDATE,
            lock_dir: lock_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the host lock marker for display `:N`.
    pub fn lock_path(&self, display: u32) -> PathBuf {
        self.lock_dir.join(format!(".X{display}-lock"))
    }

    /// Return the first free display number at or above the current
    /// candidate and advance past it.
    pub fn allocate(&mut self) -> Result<u32> {
        let start = self.next;
        while self.next < start.saturating_add(SCAN_LIMIT) {
            let candidate = self.next;
            self.next += 1;
            if self.lock_path(candidate).exists() {
                debug!(target: "display.alloc", display = candidate, "candidate_locked");
                continue;
            }
            debug!(target: "display.alloc", display = candidate, "allocated");
            return Ok(candidate);
        }
        Err(Error::InitFailed {
            display: self.next,
            reason: "display number space exhausted".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn allocates_from_first_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let mut alloc = DisplayAllocator::with_lock_dir(dir.path());
        assert_eq!(alloc.allocate().unwrap(), 99);
    }

    #[test]
    fn skips_locked_numbers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".X99-lock"), "1234\n").unwrap();
        fs::write(dir.path().join(".X100-lock"), "1235\n").unwrap();
        let mut alloc = DisplayAllocator::with_lock_dir(dir.path());
        assert_eq!(alloc.allocate().unwrap(), 101);
    }

    #[test]
    fn successive_allocations_are_distinct_and_increasing() {
        let dir = tempfile::tempdir().unwrap();
        let mut alloc = DisplayAllocator::with_lock_dir(dir.path());
        let a = alloc.allocate().unwrap();
        let b = alloc.allocate().unwrap();
        let c = alloc.allocate().unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn does_not_reclaim_after_external_lock_release() {
        // A number freed on the host is reused only by rescanning, never by
        // rewinding the counter.
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join(".X99-lock");
        fs::write(&lock, "1234\n").unwrap();
        let mut alloc = DisplayAllocator::with_lock_dir(dir.path());
        assert_eq!(alloc.allocate().unwrap(), 100);
        fs::remove_file(&lock).unwrap();
        assert_eq!(alloc.allocate().unwrap(), 101);
    }

    #[test]
    fn lock_path_follows_host_convention() {
        let alloc = DisplayAllocator::with_lock_dir("/tmp");
        assert_eq!(alloc.lock_path(104), PathBuf::from("/tmp/.X104-lock"));
    }
}
