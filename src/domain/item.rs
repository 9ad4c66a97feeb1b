use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::normalizer::entities;

/// Content stored when neither the feed nor the article page yields anything
pub const EMPTY_CONTENT: &str = "&nbsp;";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub source_id: String,
    pub title: String,
    pub author: String,
    pub url: String,
    /// Publication time in epoch ms
    pub date: i64,
    pub date_created: i64,
    pub content: String,
    pub unread: bool,
    pub visited: bool,
    pub deleted: bool,
    pub trashed: bool,
    pub pinned: bool,
    /// Epoch ms when the item was soft-deleted, 0 if unknown
    pub deleted_at: i64,
}

impl Item {
    pub fn new(id: String, source_id: impl Into<String>) -> Self {
        Self {
            id,
            source_id: source_id.into(),
            title: String::new(),
            author: String::new(),
            url: String::new(),
            date: 0,
            date_created: Utc::now().timestamp_millis(),
            content: EMPTY_CONTENT.to_string(),
            unread: true,
            visited: false,
            deleted: false,
            trashed: false,
            pinned: false,
            deleted_at: 0,
        }
    }

    /// Deterministic id for an entry of `source_id`.
    ///
    /// `seed` is the guid or resolved link; without one the title and the
    /// parsed date (0 when unparsable) identify the entry.
    pub fn generate_id(source_id: &str, seed: Option<&str>, title: &str, date: i64) -> String {
        entities::entry_id(source_id, seed, title, date)
    }

    /// Turn the item into a tombstone that blocks re-creation on later fetches
    pub fn mark_as_deleted(&mut self, now_ms: i64) {
        self.trashed = true;
        self.deleted = true;
        self.visited = true;
        self.unread = false;
        self.pinned = false;
        self.date = 0;
        self.date_created = 0;
        self.url.clear();
        self.content.clear();
        self.author.clear();
        self.title.clear();
        self.deleted_at = now_ms;
    }

    /// Reference time for retention checks
    pub fn age_reference(&self) -> i64 {
        if self.date_created != 0 {
            self.date_created
        } else {
            self.date
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.deleted || self.trashed
    }
}

/// Partial update of an [`Item`]; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
    pub date: Option<i64>,
    pub date_created: Option<i64>,
    pub content: Option<String>,
    pub unread: Option<bool>,
    pub visited: Option<bool>,
    pub deleted: Option<bool>,
    pub trashed: Option<bool>,
    pub pinned: Option<bool>,
    pub deleted_at: Option<i64>,
}

impl ItemUpdate {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// The update performed by [`Item::mark_as_deleted`]
    pub fn soft_delete(now_ms: i64) -> Self {
        Self {
            title: Some(String::new()),
            author: Some(String::new()),
            url: Some(String::new()),
            date: Some(0),
            date_created: Some(0),
            content: Some(String::new()),
            unread: Some(false),
            visited: Some(true),
            deleted: Some(true),
            trashed: Some(true),
            pinned: Some(false),
            deleted_at: Some(now_ms),
        }
    }

    pub fn apply(&self, item: &mut Item) {
        if let Some(ref title) = self.title {
            item.title = title.clone();
        }
        if let Some(ref author) = self.author {
            item.author = author.clone();
        }
        if let Some(ref url) = self.url {
            item.url = url.clone();
        }
        if let Some(date) = self.date {
            item.date = date;
        }
        if let Some(date_created) = self.date_created {
            item.date_created = date_created;
        }
        if let Some(ref content) = self.content {
            item.content = content.clone();
        }
        if let Some(unread) = self.unread {
            item.unread = unread;
        }
        if let Some(visited) = self.visited {
            item.visited = visited;
        }
        if let Some(deleted) = self.deleted {
            item.deleted = deleted;
        }
        if let Some(trashed) = self.trashed {
            item.trashed = trashed;
        }
        if let Some(pinned) = self.pinned {
            item.pinned = pinned;
        }
        if let Some(deleted_at) = self.deleted_at {
            item.deleted_at = deleted_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generation_deterministic() {
        let id1 = Item::generate_id("src-1", Some("entry-123"), "Title", 0);
        let id2 = Item::generate_id("src-1", Some("entry-123"), "Other title", 5);
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_id_generation_different_inputs() {
        let id1 = Item::generate_id("src-1", Some("entry-123"), "", 0);
        let id2 = Item::generate_id("src-1", Some("entry-456"), "", 0);
        let id3 = Item::generate_id("src-2", Some("entry-123"), "", 0);
        assert_ne!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_id_without_seed_uses_title_and_date() {
        let id1 = Item::generate_id("src-1", None, "Hello", 1000);
        let id2 = Item::generate_id("src-1", None, "Hello", 2000);
        assert_ne!(id1, id2);
        assert_eq!(id1, Item::generate_id("src-1", Some(""), "Hello", 1000));
    }

    #[test]
    fn test_mark_as_deleted_blanks_item() {
        let mut item = Item::new("id".into(), "src");
        item.title = "Title".into();
        item.pinned = true;
        item.mark_as_deleted(42);

        assert!(item.deleted && item.trashed && item.visited);
        assert!(!item.unread && !item.pinned);
        assert!(item.title.is_empty() && item.content.is_empty());
        assert_eq!(item.date_created, 0);
        assert_eq!(item.deleted_at, 42);
    }

    #[test]
    fn test_soft_delete_update_matches_mark_as_deleted() {
        let mut a = Item::new("id".into(), "src");
        a.title = "T".into();
        let mut b = a.clone();

        a.mark_as_deleted(7);
        ItemUpdate::soft_delete(7).apply(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_age_reference_falls_back_to_date() {
        let mut item = Item::new("id".into(), "src");
        item.date_created = 0;
        item.date = 99;
        assert_eq!(item.age_reference(), 99);
    }
}
