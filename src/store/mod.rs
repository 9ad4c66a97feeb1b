pub mod memory;
pub mod sqlite;

use crate::app::Result;
use crate::domain::{Item, ItemUpdate, Source, SourceUpdate};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub trait SourceStore: Send + Sync {
    fn find_source(&self, id: &str) -> Result<Option<Source>>;
    fn filter_sources(&self, predicate: &dyn Fn(&Source) -> bool) -> Result<Vec<Source>>;
    fn all_sources(&self) -> Result<Vec<Source>>;
    fn create_source(&self, source: &Source) -> Result<()>;
    /// Apply `update` to the stored source; unknown ids are an error
    fn save_source(&self, id: &str, update: &SourceUpdate) -> Result<()>;
    fn destroy_source(&self, id: &str) -> Result<()>;

    fn find_source_by_url(&self, url: &str) -> Result<Option<Source>> {
        Ok(self
            .filter_sources(&|source: &Source| source.url == url)?
            .into_iter()
            .next())
    }
}

pub trait ItemStore: Send + Sync {
    fn get_item(&self, id: &str) -> Result<Option<Item>>;
    fn filter_items(&self, predicate: &dyn Fn(&Item) -> bool) -> Result<Vec<Item>>;
    /// Insert `item`, replacing any stored item with the same id
    fn create_item(&self, item: &Item) -> Result<()>;
    fn save_item(&self, id: &str, update: &ItemUpdate) -> Result<()>;
    fn destroy_item(&self, id: &str) -> Result<()>;

    fn items_of_source(&self, source_id: &str) -> Result<Vec<Item>> {
        self.filter_items(&|item: &Item| item.source_id == source_id)
    }
}
