use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, SmartRssError};
use crate::domain::{Credentials, FulltextMode, Item, ItemUpdate, Source, SourceUpdate};
use crate::store::{ItemStore, SourceStore};

const SOURCE_COLUMNS: &str = "id, title, url, base, update_every, last_update, last_attempt, \
     fulltext, fulltext_position, username, password, autoremove, folder_id, favicon, count, \
     count_all, has_new, last_update_failed";

const ITEM_COLUMNS: &str = "id, source_id, title, author, url, date, date_created, content, \
     unread, visited, deleted, trashed, pinned, deleted_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            SmartRssError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| SmartRssError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn source_from_row(row: &Row<'_>) -> rusqlite::Result<Source> {
        let username: Option<String> = row.get(9)?;
        let password: Option<String> = row.get(10)?;
        let credentials = match (username, password) {
            (None, None) => None,
            (username, password) => Some(Credentials::new(
                username.unwrap_or_default(),
                password.unwrap_or_default(),
            )),
        };

        Ok(Source {
            id: row.get(0)?,
            title: row.get(1)?,
            url: row.get(2)?,
            base: row.get(3)?,
            update_every: row.get(4)?,
            last_update: row.get(5)?,
            last_attempt: row.get(6)?,
            fulltext: FulltextMode::try_from(row.get::<_, u8>(7)?).unwrap_or_default(),
            fulltext_position: row.get(8)?,
            credentials,
            autoremove: row.get(11)?,
            folder_id: row.get(12)?,
            favicon: row.get(13)?,
            count: row.get(14)?,
            count_all: row.get(15)?,
            has_new: row.get(16)?,
            last_update_failed: row.get(17)?,
        })
    }

    fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
        Ok(Item {
            id: row.get(0)?,
            source_id: row.get(1)?,
            title: row.get(2)?,
            author: row.get(3)?,
            url: row.get(4)?,
            date: row.get(5)?,
            date_created: row.get(6)?,
            content: row.get(7)?,
            unread: row.get(8)?,
            visited: row.get(9)?,
            deleted: row.get(10)?,
            trashed: row.get(11)?,
            pinned: row.get(12)?,
            deleted_at: row.get(13)?,
        })
    }

    fn write_source(conn: &Connection, source: &Source) -> Result<()> {
        let (username, password) = match source.credentials {
            Some(ref c) => (Some(c.username.as_str()), Some(c.password.as_str())),
            None => (None, None),
        };
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO sources ({SOURCE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
            ),
            params![
                source.id,
                source.title,
                source.url,
                source.base,
                source.update_every,
                source.last_update,
                source.last_attempt,
                u8::from(source.fulltext),
                source.fulltext_position,
                username,
                password,
                source.autoremove,
                source.folder_id,
                source.favicon,
                source.count,
                source.count_all,
                source.has_new,
                source.last_update_failed,
            ],
        )?;
        Ok(())
    }

    fn write_item(conn: &Connection, item: &Item) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO items ({ITEM_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            params![
                item.id,
                item.source_id,
                item.title,
                item.author,
                item.url,
                item.date,
                item.date_created,
                item.content,
                item.unread,
                item.visited,
                item.deleted,
                item.trashed,
                item.pinned,
                item.deleted_at,
            ],
        )?;
        Ok(())
    }

    fn query_source(conn: &Connection, id: &str) -> Result<Option<Source>> {
        let source = conn
            .query_row(
                &format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = ?1"),
                params![id],
                Self::source_from_row,
            )
            .optional()?;
        Ok(source)
    }

    fn query_item(conn: &Connection, id: &str) -> Result<Option<Item>> {
        let item = conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"),
                params![id],
                Self::item_from_row,
            )
            .optional()?;
        Ok(item)
    }
}

impl SourceStore for SqliteStore {
    fn find_source(&self, id: &str) -> Result<Option<Source>> {
        let conn = self.conn()?;
        Self::query_source(&conn, id)
    }

    fn filter_sources(&self, predicate: &dyn Fn(&Source) -> bool) -> Result<Vec<Source>> {
        Ok(self
            .all_sources()?
            .into_iter()
            .filter(|source| predicate(source))
            .collect())
    }

    fn all_sources(&self) -> Result<Vec<Source>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SOURCE_COLUMNS} FROM sources ORDER BY title, url"
        ))?;

        let sources = stmt
            .query_map([], Self::source_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sources)
    }

    fn create_source(&self, source: &Source) -> Result<()> {
        let conn = self.conn()?;
        Self::write_source(&conn, source)
    }

    fn save_source(&self, id: &str, update: &SourceUpdate) -> Result<()> {
        let conn = self.conn()?;
        let mut source =
            Self::query_source(&conn, id)?.ok_or_else(|| SmartRssError::SourceNotFound(id.to_string()))?;
        update.apply(&mut source);
        Self::write_source(&conn, &source)
    }

    fn destroy_source(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM sources WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn find_source_by_url(&self, url: &str) -> Result<Option<Source>> {
        let conn = self.conn()?;
        let source = conn
            .query_row(
                &format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE url = ?1"),
                params![url],
                Self::source_from_row,
            )
            .optional()?;
        Ok(source)
    }
}

impl ItemStore for SqliteStore {
    fn get_item(&self, id: &str) -> Result<Option<Item>> {
        let conn = self.conn()?;
        Self::query_item(&conn, id)
    }

    fn filter_items(&self, predicate: &dyn Fn(&Item) -> bool) -> Result<Vec<Item>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items ORDER BY date DESC, id"
        ))?;

        let mut items = Vec::new();
        for item in stmt.query_map([], Self::item_from_row)? {
            let item = item?;
            if predicate(&item) {
                items.push(item);
            }
        }
        Ok(items)
    }

    fn create_item(&self, item: &Item) -> Result<()> {
        let conn = self.conn()?;
        Self::write_item(&conn, item)
    }

    fn save_item(&self, id: &str, update: &ItemUpdate) -> Result<()> {
        let conn = self.conn()?;
        let mut item = Self::query_item(&conn, id)?
            .ok_or_else(|| SmartRssError::Other(format!("item not found: {}", id)))?;
        update.apply(&mut item);
        Self::write_item(&conn, &item)
    }

    fn destroy_item(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM items WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn items_of_source(&self, source_id: &str) -> Result<Vec<Item>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE source_id = ?1 ORDER BY date DESC, id"
        ))?;

        let items = stmt
            .query_map(params![source_id], Self::item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }
}
