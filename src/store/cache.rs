use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::backend::{Blob, ChildEntry};
use super::paths::BlobPath;

/// Budget used when none is configured.
pub(crate) const DEFAULT_CACHE_MAX_BYTES: usize = 64 * 1024 * 1024;

/// Rough per-entry bookkeeping cost on top of the payload.
const ENTRY_OVERHEAD: usize = 64;

/// How stale a read may be. Chosen per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CachePolicy {
    Bypass,
    Short,
    Long,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct CacheTtls {
    pub(crate) short: Duration,
    pub(crate) long: Duration,
}

impl CacheTtls {
    fn for_policy(&self, policy: CachePolicy) -> Option<Duration> {
        match policy {
            CachePolicy::Bypass => None,
            CachePolicy::Short => Some(self.short),
            CachePolicy::Long => Some(self.long),
        }
    }

    /// Past this age no policy accepts an entry.
    fn max(&self) -> Duration {
        self.short.max(self.long)
    }
}

/// Invalidation generation observed when a backend read started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReadTicket(u64);

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    stored_at: Instant,
    size: usize,
}

#[derive(Debug, Default)]
struct Tables {
    contents: HashMap<BlobPath, Entry<Option<Blob>>>,
    listings: HashMap<BlobPath, Entry<Vec<ChildEntry>>>,
    bytes: usize,
    generation: u64,
}

impl Tables {
    fn remove_content(&mut self, path: &BlobPath) {
        if let Some(entry) = self.contents.remove(path) {
            self.bytes -= entry.size;
        }
    }

    fn remove_listing(&mut self, folder: &BlobPath) {
        if let Some(entry) = self.listings.remove(folder) {
            self.bytes -= entry.size;
        }
    }

    fn retain_contents(&mut self, mut keep: impl FnMut(&BlobPath, &Entry<Option<Blob>>) -> bool) {
        let mut freed = 0;
        self.contents.retain(|path, entry| {
            let kept = keep(path, entry);
            if !kept {
                freed += entry.size;
            }
            kept
        });
        self.bytes -= freed;
    }

    fn retain_listings(&mut self, mut keep: impl FnMut(&BlobPath, &Entry<Vec<ChildEntry>>) -> bool) {
        let mut freed = 0;
        self.listings.retain(|folder, entry| {
            let kept = keep(folder, entry);
            if !kept {
                freed += entry.size;
            }
            kept
        });
        self.bytes -= freed;
    }

    /// Drops expired entries, then the oldest ones until `incoming` more bytes fit.
    fn make_room(&mut self, incoming: usize, max_bytes: usize, max_age: Duration, now: Instant) {
        if self.bytes + incoming <= max_bytes {
            return;
        }
        let fresh = |stored_at: Instant| now.saturating_duration_since(stored_at) < max_age;
        self.retain_contents(|_, entry| fresh(entry.stored_at));
        self.retain_listings(|_, entry| fresh(entry.stored_at));
        if self.bytes + incoming <= max_bytes {
            return;
        }

        let mut by_age: Vec<(Instant, bool, BlobPath)> = self
            .contents
            .iter()
            .map(|(path, entry)| (entry.stored_at, true, path.clone()))
            .chain(self.listings.iter().map(|(folder, entry)| (entry.stored_at, false, folder.clone())))
            .collect();
        by_age.sort_by_key(|(stored_at, _, _)| *stored_at);

        for (_, is_content, path) in by_age {
            if self.bytes + incoming <= max_bytes {
                break;
            }
            if is_content {
                self.remove_content(&path);
            } else {
                self.remove_listing(&path);
            }
        }
    }
}

fn content_size(path: &BlobPath, value: &Option<Blob>) -> usize {
    let payload = value.as_ref().map_or(0, |blob| {
        blob.bytes.len() + blob.content_type.as_ref().map_or(0, String::len)
    });
    ENTRY_OVERHEAD + path.as_str().len() + payload
}

fn listing_size(folder: &BlobPath, entries: &[ChildEntry]) -> usize {
    ENTRY_OVERHEAD
        + folder.as_str().len()
        + entries.iter().map(|entry| entry.name.len() + ENTRY_OVERHEAD).sum::<usize>()
}

/// In-process read cache bounded by a byte budget. Absence is cached like any other value.
///
/// A read only populates the cache if no invalidation happened while it was in flight, so a
/// write is never shadowed by the content read just before it.
#[derive(Debug)]
pub(crate) struct ReadCache {
    ttls: CacheTtls,
    max_bytes: usize,
    tables: Mutex<Tables>,
}

impl ReadCache {
    pub(crate) fn new(ttls: CacheTtls, max_bytes: usize) -> Self {
        Self { ttls, max_bytes, tables: Mutex::new(Tables::default()) }
    }

    pub(crate) fn begin_read(&self) -> ReadTicket {
        ReadTicket(self.lock().generation)
    }

    /// Outer `None` is a miss; inner `None` is cached absence.
    pub(crate) fn content(
        &self,
        path: &BlobPath,
        policy: CachePolicy,
        now: Instant,
    ) -> Option<Option<Blob>> {
        let ttl = self.ttls.for_policy(policy)?;
        let tables = self.lock();
        tables
            .contents
            .get(path)
            .filter(|entry| now.saturating_duration_since(entry.stored_at) < ttl)
            .map(|entry| entry.value.clone())
    }

    pub(crate) fn store_content(
        &self,
        ticket: ReadTicket,
        path: &BlobPath,
        policy: CachePolicy,
        value: Option<Blob>,
        now: Instant,
    ) {
        if policy == CachePolicy::Bypass {
            return;
        }
        let size = content_size(path, &value);
        if size > self.max_bytes {
            return;
        }

        let mut tables = self.lock();
        if tables.generation != ticket.0 {
            return;
        }
        tables.remove_content(path);
        tables.make_room(size, self.max_bytes, self.ttls.max(), now);
        tables.bytes += size;
        tables.contents.insert(path.clone(), Entry { value, stored_at: now, size });
    }

    pub(crate) fn listing(
        &self,
        folder: &BlobPath,
        policy: CachePolicy,
        now: Instant,
    ) -> Option<Vec<ChildEntry>> {
        let ttl = self.ttls.for_policy(policy)?;
        let tables = self.lock();
        tables
            .listings
            .get(folder)
            .filter(|entry| now.saturating_duration_since(entry.stored_at) < ttl)
            .map(|entry| entry.value.clone())
    }

    pub(crate) fn store_listing(
        &self,
        ticket: ReadTicket,
        folder: &BlobPath,
        policy: CachePolicy,
        value: Vec<ChildEntry>,
        now: Instant,
    ) {
        if policy == CachePolicy::Bypass {
            return;
        }
        let size = listing_size(folder, &value);
        if size > self.max_bytes {
            return;
        }

        let mut tables = self.lock();
        if tables.generation != ticket.0 {
            return;
        }
        tables.remove_listing(folder);
        tables.make_room(size, self.max_bytes, self.ttls.max(), now);
        tables.bytes += size;
        tables.listings.insert(folder.clone(), Entry { value, stored_at: now, size });
    }

    /// Forgets a written path and every listing that could include it.
    pub(crate) fn invalidate_write(&self, path: &BlobPath) {
        let mut tables = self.lock();
        tables.generation += 1;
        tables.remove_content(path);
        tables.retain_listings(|folder, _| !folder.contains(path));
    }

    /// Forgets a deleted path, everything under it and every listing that could include it.
    pub(crate) fn invalidate_tree(&self, path: &BlobPath) {
        let mut tables = self.lock();
        tables.generation += 1;
        tables.retain_contents(|key, _| !path.contains(key));
        tables.retain_listings(|folder, _| !path.contains(folder) && !folder.contains(path));
    }

    #[cfg(test)]
    pub(crate) fn entry_count(&self) -> usize {
        let tables = self.lock();
        tables.contents.len() + tables.listings.len()
    }

    #[cfg(test)]
    pub(crate) fn cached_bytes(&self) -> usize {
        self.lock().bytes
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
