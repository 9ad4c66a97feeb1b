use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{Result, SmartRssError};
use crate::config::Config;
use crate::extractor::ContentExtractor;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::loader::Loader;
use crate::store::SqliteStore;

/// Wires the store, fetcher, extractor and loader together once.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<ContentExtractor>,
    pub loader: Arc<Loader<SqliteStore>>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match config.database_path {
            Some(ref p) => p.clone(),
            None => Self::default_db_path()?,
        };
        let store = Arc::new(SqliteStore::new(&db_path)?);
        Self::with_store(config, store)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::with_store(config, store)
    }

    fn with_store(config: Config, store: Arc<SqliteStore>) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher> =
            Arc::new(HttpFetcher::new(config.extractor.user_agent.as_deref())?);
        let extractor = Arc::new(ContentExtractor::new(config.extractor.clone()));
        let loader = Arc::new(Loader::new(
            store.clone(),
            fetcher.clone(),
            extractor.clone(),
            config.loader.clone(),
        ));

        Ok(Self {
            config,
            store,
            fetcher,
            extractor,
            loader,
        })
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| SmartRssError::Config("Could not find data directory".into()))?;
        let smartrss_dir = data_dir.join("smartrss");
        std::fs::create_dir_all(&smartrss_dir)?;
        Ok(smartrss_dir.join("smartrss.db"))
    }
}
