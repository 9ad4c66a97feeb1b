use std::sync::{Mutex, MutexGuard};

use crate::app::{Result, SmartRssError};
use crate::domain::{Item, ItemUpdate, Source, SourceUpdate};
use crate::store::{ItemStore, SourceStore};

/// Store kept entirely in memory, in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sources: Mutex<Vec<Source>>,
    items: Mutex<Vec<Item>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| SmartRssError::Other(format!("store lock poisoned: {}", e)))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(sources: impl IntoIterator<Item = Source>) -> Self {
        Self {
            sources: Mutex::new(sources.into_iter().collect()),
            items: Mutex::new(Vec::new()),
        }
    }
}

impl SourceStore for MemoryStore {
    fn find_source(&self, id: &str) -> Result<Option<Source>> {
        Ok(lock(&self.sources)?.iter().find(|s| s.id == id).cloned())
    }

    fn filter_sources(&self, predicate: &dyn Fn(&Source) -> bool) -> Result<Vec<Source>> {
        Ok(lock(&self.sources)?
            .iter()
            .filter(|s| predicate(s))
            .cloned()
            .collect())
    }

    fn all_sources(&self) -> Result<Vec<Source>> {
        Ok(lock(&self.sources)?.clone())
    }

    fn create_source(&self, source: &Source) -> Result<()> {
        let mut sources = lock(&self.sources)?;
        match sources.iter_mut().find(|s| s.id == source.id) {
            Some(existing) => *existing = source.clone(),
            None => sources.push(source.clone()),
        }
        Ok(())
    }

    fn save_source(&self, id: &str, update: &SourceUpdate) -> Result<()> {
        let mut sources = lock(&self.sources)?;
        let source = sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| SmartRssError::SourceNotFound(id.to_string()))?;
        update.apply(source);
        Ok(())
    }

    fn destroy_source(&self, id: &str) -> Result<()> {
        lock(&self.sources)?.retain(|s| s.id != id);
        Ok(())
    }
}

impl ItemStore for MemoryStore {
    fn get_item(&self, id: &str) -> Result<Option<Item>> {
        Ok(lock(&self.items)?.iter().find(|i| i.id == id).cloned())
    }

    fn filter_items(&self, predicate: &dyn Fn(&Item) -> bool) -> Result<Vec<Item>> {
        Ok(lock(&self.items)?
            .iter()
            .filter(|i| predicate(i))
            .cloned()
            .collect())
    }

    fn create_item(&self, item: &Item) -> Result<()> {
        let mut items = lock(&self.items)?;
        match items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => items.push(item.clone()),
        }
        Ok(())
    }

    fn save_item(&self, id: &str, update: &ItemUpdate) -> Result<()> {
        let mut items = lock(&self.items)?;
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| SmartRssError::Other(format!("item not found: {}", id)))?;
        update.apply(item);
        Ok(())
    }

    fn destroy_item(&self, id: &str) -> Result<()> {
        lock(&self.items)?.retain(|i| i.id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_crud() {
        let store = MemoryStore::new();
        store
            .create_source(&Source::new("s1", "https://example.com/feed.xml"))
            .unwrap();

        store
            .save_source(
                "s1",
                &SourceUpdate {
                    title: Some("Example".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(store.find_source("s1").unwrap().unwrap().title, "Example");
        assert!(store
            .find_source_by_url("https://example.com/feed.xml")
            .unwrap()
            .is_some());
        assert!(matches!(
            store.save_source("missing", &SourceUpdate::default()),
            Err(SmartRssError::SourceNotFound(_))
        ));

        store.destroy_source("s1").unwrap();
        assert!(store.all_sources().unwrap().is_empty());
    }

    #[test]
    fn test_create_item_is_upsert() {
        let store = MemoryStore::new();
        let mut item = Item::new("i1".into(), "s1");
        store.create_item(&item).unwrap();
        item.title = "changed".into();
        store.create_item(&item).unwrap();

        let items = store.items_of_source("s1").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "changed");
    }

    #[test]
    fn test_item_update_and_destroy() {
        let store = MemoryStore::new();
        store.create_item(&Item::new("i1".into(), "s1")).unwrap();
        store.save_item("i1", &ItemUpdate::content("<p>x</p>")).unwrap();
        assert_eq!(store.get_item("i1").unwrap().unwrap().content, "<p>x</p>");

        store.save_item("i1", &ItemUpdate::soft_delete(42)).unwrap();
        let tombstones = store.filter_items(&|i: &Item| i.is_tombstone()).unwrap();
        assert_eq!(tombstones.len(), 1);
        assert_eq!(tombstones[0].deleted_at, 42);

        store.destroy_item("i1").unwrap();
        assert!(store.get_item("i1").unwrap().is_none());
    }
}
