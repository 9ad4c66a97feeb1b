//! Housekeeping passes run around each feed download.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::app::Result;
use crate::domain::{Item, ItemUpdate, Source};
use crate::store::{ItemStore, SourceStore};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Soft-delete unpinned items of `source` older than its `autoremove` days.
pub fn mark_auto_removals<S: ItemStore + ?Sized>(store: &S, source: &Source, now: i64) -> Result<usize> {
    if source.autoremove <= 0 {
        return Ok(0);
    }
    let cutoff = now - source.autoremove * DAY_MS;
    let expired = store.filter_items(&|item: &Item| {
        item.source_id == source.id && !item.deleted && !item.pinned && item.age_reference() < cutoff
    })?;

    for item in &expired {
        store.save_item(&item.id, &ItemUpdate::soft_delete(now))?;
    }
    if !expired.is_empty() {
        debug!(source_id = %source.id, count = expired.len(), "Auto-removed old items");
    }
    Ok(expired.len())
}

/// Destroy tombstones of `source_id` that left the feed. A tombstone is kept
/// while the feed still lists it, and for `retention_ms` after deletion.
pub fn purge_tombstones<S: ItemStore + ?Sized>(
    store: &S,
    source_id: &str,
    fetched: &HashSet<String>,
    retention_ms: i64,
    now: i64,
) -> Result<usize> {
    let stale = store.filter_items(&|item: &Item| {
        item.source_id == source_id
            && item.deleted
            && !fetched.contains(&item.id)
            && (item.deleted_at <= 0 || item.deleted_at < now - retention_ms)
    })?;

    for item in &stale {
        store.destroy_item(&item.id)?;
    }
    Ok(stale.len())
}

/// Destroy items whose source no longer exists.
pub fn sweep_orphans<S: SourceStore + ItemStore + ?Sized>(store: &S) -> Result<usize> {
    let ids: HashSet<String> = store.all_sources()?.into_iter().map(|s| s.id).collect();
    let orphans = store.filter_items(&|item: &Item| !ids.contains(&item.source_id))?;

    for item in &orphans {
        store.destroy_item(&item.id)?;
    }
    if !orphans.is_empty() {
        info!(count = orphans.len(), "Deleted items of missing sources");
    }
    Ok(orphans.len())
}

/// `(unread, all)` counts of the source's non-trashed items
pub fn count_items<S: ItemStore + ?Sized>(store: &S, source_id: &str) -> Result<(i64, i64)> {
    let items = store.items_of_source(source_id)?;
    let live = items.iter().filter(|item| !item.trashed);
    let (mut unread, mut all) = (0, 0);
    for item in live {
        all += 1;
        if item.unread {
            unread += 1;
        }
    }
    Ok((unread, all))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const NOW: i64 = 1_700_000_000_000;

    fn item(id: &str, source_id: &str) -> Item {
        let mut item = Item::new(id.to_string(), source_id);
        item.date_created = NOW;
        item
    }

    #[test]
    fn test_auto_removal_skips_pinned_and_recent() {
        let store = MemoryStore::new();
        let mut old = item("old", "s1");
        old.date_created = NOW - 10 * DAY_MS;
        let mut pinned = old.clone();
        pinned.id = "pinned".into();
        pinned.pinned = true;
        let mut dated = item("dated", "s1");
        dated.date_created = 0;
        dated.date = NOW - 10 * DAY_MS;
        for i in [old, pinned, dated, item("recent", "s1")] {
            store.create_item(&i).unwrap();
        }

        let mut source = Source::new("s1", "https://example.com/feed.xml");
        assert_eq!(mark_auto_removals(&store, &source, NOW).unwrap(), 0);

        source.autoremove = 7;
        assert_eq!(mark_auto_removals(&store, &source, NOW).unwrap(), 2);
        assert!(store.get_item("old").unwrap().unwrap().deleted);
        assert!(store.get_item("dated").unwrap().unwrap().deleted);
        assert!(!store.get_item("pinned").unwrap().unwrap().deleted);
        assert!(!store.get_item("recent").unwrap().unwrap().deleted);
    }

    #[test]
    fn test_purge_tombstones() {
        let store = MemoryStore::new();
        let mut listed = item("listed", "s1");
        listed.mark_as_deleted(NOW - 10 * DAY_MS);
        let mut expired = item("expired", "s1");
        expired.mark_as_deleted(NOW - 10 * DAY_MS);
        let mut fresh = item("fresh", "s1");
        fresh.mark_as_deleted(NOW - DAY_MS);
        let mut invalid = item("invalid", "s1");
        invalid.mark_as_deleted(0);
        for i in [listed, expired, fresh, invalid, item("live", "s1")] {
            store.create_item(&i).unwrap();
        }

        let fetched: HashSet<String> = ["listed".to_string()].into_iter().collect();
        let purged = purge_tombstones(&store, "s1", &fetched, 3 * DAY_MS, NOW).unwrap();
        assert_eq!(purged, 2);

        let mut left: Vec<String> = store
            .items_of_source("s1")
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        left.sort();
        assert_eq!(left, vec!["fresh", "listed", "live"]);
    }

    #[test]
    fn test_sweep_orphans() {
        let store = MemoryStore::with_sources([Source::new("s1", "https://example.com/feed.xml")]);
        store.create_item(&item("kept", "s1")).unwrap();
        store.create_item(&item("orphan", "gone")).unwrap();

        assert_eq!(sweep_orphans(&store).unwrap(), 1);
        assert!(store.get_item("orphan").unwrap().is_none());
        assert!(store.get_item("kept").unwrap().is_some());
    }

    #[test]
    fn test_count_items() {
        let store = MemoryStore::new();
        let mut read = item("read", "s1");
        read.unread = false;
        let mut trashed = item("trashed", "s1");
        trashed.trashed = true;
        for i in [read, trashed, item("unread", "s1")] {
            store.create_item(&i).unwrap();
        }
        assert_eq!(count_items(&store, "s1").unwrap(), (1, 2));
    }
}
