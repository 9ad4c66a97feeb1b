//! Feed download scheduling.
//!
//! The [`Loader`] keeps a LIFO queue of sources and drains it one source at a
//! time on a background task: fetch, parse, reconcile with the store, fetch
//! full-text articles in fixed-size chunks, persist. A run can be aborted at
//! any time; every await point races the abort signal and every checkpoint
//! compares the run generation, so an aborted run stops without writing the
//! batch it was working on.

pub mod events;
pub mod maintenance;
pub mod settings;

pub use events::{LoaderEvent, Progress};
pub use settings::LoaderSettings;

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{broadcast, watch, Notify};
use tracing::{debug, info, warn};

use crate::app::{Result, SmartRssError};
use crate::domain::{Item, ItemUpdate, Node, Source, SourceUpdate};
use crate::extractor::ContentExtractor;
use crate::fetcher::{FetchRequest, Fetcher};
use crate::normalizer::FeedParser;
use crate::store::{ItemStore, SourceStore};

/// Tolerance when checking whether a source is due
const SCHEDULE_SKEW_MS: i64 = 10_000;

const EVENT_CAPACITY: usize = 256;

const FAVICON_SERVICE: &str = "https://www.google.com/s2/favicons?domain=";

#[derive(Debug, Default)]
struct LoaderState {
    queue: Vec<Source>,
    /// Id of the source being downloaded
    current: Option<String>,
    loading: bool,
    progress: Progress,
    /// Whether the run created any item
    has_new: bool,
}

pub struct Loader<S> {
    store: Arc<S>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<ContentExtractor>,
    parser: FeedParser,
    settings: LoaderSettings,
    state: Mutex<LoaderState>,
    generation: AtomicU64,
    cancel: Notify,
    idle: watch::Sender<bool>,
    events: broadcast::Sender<LoaderEvent>,
}

impl<S> Loader<S>
where
    S: SourceStore + ItemStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<ContentExtractor>,
        settings: LoaderSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (idle, _) = watch::channel(true);
        Self {
            store,
            fetcher,
            extractor,
            parser: FeedParser::new(),
            settings,
            state: Mutex::new(LoaderState::default()),
            generation: AtomicU64::new(0),
            cancel: Notify::new(),
            idle,
            events,
        }
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoaderEvent> {
        self.events.subscribe()
    }

    pub fn progress(&self) -> Progress {
        self.lock().progress
    }

    /// Whether a run is active, or with `source_id` whether that source is
    /// the one being downloaded
    pub fn is_downloading(&self, source_id: Option<&str>) -> bool {
        let state = self.lock();
        match source_id {
            Some(id) => state.current.as_deref() == Some(id),
            None => state.loading,
        }
    }

    /// Queue the sources of `nodes` and start a run if none is active.
    ///
    /// Folders expand to their sources. Placeholders and disabled sources are
    /// skipped, as are, unless `force`, manual sources and sources that are
    /// not due yet. Returns how many sources were queued.
    pub fn download_feeds(self: &Arc<Self>, nodes: Vec<Node>, force: bool) -> Result<usize> {
        let now = Utc::now().timestamp_millis();
        let mut sources = Vec::new();
        for node in nodes {
            match node {
                Node::Source(source) => sources.push(source),
                Node::Folder(folder) => sources.extend(
                    self.store
                        .filter_sources(&|s: &Source| s.folder_id.as_deref() == Some(folder.id.as_str()))?,
                ),
            }
        }

        sources.retain(|source| {
            !source.is_placeholder()
                && !source.is_disabled()
                && (force || source.is_due(now, SCHEDULE_SKEW_MS))
        });

        let (added, start) = {
            let mut state = self.lock();
            let mut added = Vec::new();
            for source in sources {
                let queued = state.queue.iter().any(|s| s.id == source.id)
                    || added.iter().any(|s: &Source| s.id == source.id)
                    || state.current.as_deref() == Some(source.id.as_str());
                if !queued {
                    added.push(source);
                }
            }
            if added.is_empty() {
                return Ok(0);
            }

            state.progress.queued += added.len();
            state.queue.extend(added.iter().cloned());
            let start = !state.loading;
            state.loading = true;
            (added, start)
        };

        if self.settings.fetch_favicons {
            for source in added.iter().filter(|s| s.favicon.is_none()) {
                self.spawn_favicon_lookup(source);
            }
        }

        self.emit(self.progress().into());

        if start {
            let generation = self.generation.load(Ordering::SeqCst);
            self.idle.send_replace(false);
            info!(sources = added.len(), "Starting download run");
            let loader = Arc::clone(self);
            tokio::spawn(async move {
                let drain = tokio::spawn(Arc::clone(&loader).drain(generation));
                if let Err(e) = drain.await {
                    warn!(error = %e, "Download run died");
                    loader.reset_after_failure(generation);
                }
            });
        }

        Ok(added.len())
    }

    /// Queue every stored source
    pub fn download_all(self: &Arc<Self>, force: bool) -> Result<usize> {
        let nodes = self.store.all_sources()?.into_iter().map(Node::Source).collect();
        self.download_feeds(nodes, force)
    }

    /// Stop the current run: clear the queue, cancel in-flight requests and
    /// discard the work they were part of.
    pub fn abort_downloading(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cancel.notify_waiters();

        let has_new = {
            let mut state = self.lock();
            state.queue.clear();
            let has_new = state.has_new;
            *state = LoaderState::default();
            has_new
        };
        info!("Download run aborted");
        self.finish(has_new);
    }

    /// Wait until no run is active
    pub async fn wait_idle(&self) {
        let mut idle = self.idle.subscribe();
        let _ = idle.wait_for(|idle| *idle).await;
    }

    async fn drain(self: Arc<Self>, generation: u64) {
        loop {
            let next = {
                let mut state = self.lock();
                if !self.is_current(generation) {
                    return;
                }
                let next = state.queue.pop();
                state.current = next.as_ref().map(|s| s.id.clone());
                next
            };

            let Some(source) = next else {
                if let Err(e) = maintenance::sweep_orphans(&*self.store) {
                    warn!(error = %e, "Failed to delete orphaned items");
                }
                let has_new = {
                    let mut state = self.lock();
                    if !state.queue.is_empty() {
                        continue;
                    }
                    if self.generation.load(Ordering::SeqCst) != generation {
                        return;
                    }
                    let has_new = state.has_new;
                    *state = LoaderState::default();
                    has_new
                };
                info!(has_new, "Download run finished");
                self.finish(has_new);
                return;
            };

            let ok = match self.download_source(&source, generation).await {
                Ok(created) => {
                    info!(source_id = %source.id, created, "Source updated");
                    true
                }
                Err(e) if e.is_aborted() => return,
                Err(e) => {
                    warn!(source_id = %source.id, url = %source.url, error = %e, "Source update failed");
                    let update = SourceUpdate {
                        last_attempt: Some(Utc::now().timestamp_millis()),
                        last_update_failed: Some(true),
                        ..Default::default()
                    };
                    if let Err(e) = self.store.save_source(&source.id, &update) {
                        warn!(source_id = %source.id, error = %e, "Failed to record update failure");
                    }
                    false
                }
            };

            let progress = {
                let mut state = self.lock();
                if self.generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                state.current = None;
                state.progress.completed += 1;
                state.progress
            };
            self.emit(LoaderEvent::SourceUpdated {
                source_id: source.id.clone(),
                ok,
            });
            self.emit(LoaderEvent::ResetSchedule {
                source_id: source.id.clone(),
            });
            self.emit(progress.into());
        }
    }

    /// Download one source; returns how many items were created.
    async fn download_source(&self, source: &Source, generation: u64) -> Result<usize> {
        let now = Utc::now().timestamp_millis();
        maintenance::mark_auto_removals(&*self.store, source, now)?;

        let request = FetchRequest::new(source.url.clone(), self.settings.rss_timeout())
            .with_credentials(source.credentials.clone());
        let document = self
            .until_aborted(generation, self.fetcher.fetch(&request))
            .await?;
        self.checkpoint(generation)?;

        let parsed = self.parser.parse(source, &document.body)?;
        if !parsed.update.is_empty() {
            self.store.save_source(&source.id, &parsed.update)?;
        }
        let fetched: HashSet<String> = parsed.entries.iter().map(|e| e.id.clone()).collect();

        let (created, articles) = self.reconcile(source, parsed.entries)?;
        for item in &created {
            self.store.create_item(item)?;
        }
        let mut created_count = created.len();

        for chunk in articles.chunks(self.settings.parallelism()) {
            self.checkpoint(generation)?;
            let results = join_all(chunk.iter().cloned().map(|item| self.fulltext(source, item, generation))).await;
            self.checkpoint(generation)?;
            for item in &results {
                self.store.create_item(item)?;
            }
            created_count += results.len();
        }

        let purged = maintenance::purge_tombstones(
            &*self.store,
            &source.id,
            &fetched,
            self.settings.deleted_retention_ms(),
            now,
        )?;
        if purged > 0 {
            debug!(source_id = %source.id, purged, "Purged tombstones");
        }

        let (count, count_all) = maintenance::count_items(&*self.store, &source.id)?;
        let finished = Utc::now().timestamp_millis();
        let has_new = created_count > 0;
        self.store.save_source(
            &source.id,
            &SourceUpdate {
                count: Some(count),
                count_all: Some(count_all),
                last_update: Some(finished),
                last_attempt: Some(finished),
                has_new: Some(has_new || source.has_new),
                last_update_failed: Some(false),
                ..Default::default()
            },
        )?;

        if has_new {
            let mut state = self.lock();
            if self.is_current(generation) {
                state.has_new = true;
            }
        }
        Ok(created_count)
    }

    /// Split fresh entries into items to create as they are and items whose
    /// article page must be fetched first. Known live items get their
    /// content refreshed when full text is off; tombstones stay dead.
    fn reconcile(&self, source: &Source, entries: Vec<Item>) -> Result<(Vec<Item>, Vec<Item>)> {
        let fulltext = source.fulltext.is_enabled();
        let mut created = Vec::new();
        let mut articles = Vec::new();

        for entry in entries {
            match self.store.get_item(&entry.id)? {
                Some(existing) if existing.is_tombstone() => {}
                Some(existing) => {
                    if !fulltext && existing.content != entry.content {
                        self.store
                            .save_item(&existing.id, &ItemUpdate::content(entry.content))?;
                    }
                }
                None if fulltext && !entry.url.is_empty() => articles.push(entry),
                None => created.push(entry),
            }
        }
        Ok((created, articles))
    }

    /// Replace the summary of `item` with its extracted article, keeping the
    /// summary when the page can't be fetched or yields nothing.
    async fn fulltext(&self, source: &Source, mut item: Item, generation: u64) -> Item {
        let request = FetchRequest::new(item.url.clone(), self.settings.html_timeout());
        let page = match self
            .until_aborted(generation, self.fetcher.fetch(&request))
            .await
        {
            Ok(page) => page,
            Err(e) => {
                debug!(url = %item.url, error = %e, "Article fetch failed");
                return item;
            }
        };

        let extractor = Arc::clone(&self.extractor);
        let (source, url) = (source.clone(), item.url.clone());
        let extraction =
            tokio::task::spawn_blocking(move || extractor.extract(&page.text(), &source, &url));
        match extraction.await {
            Ok(Ok(extracted)) if !extracted.html.is_empty() => item.content = extracted.html,
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!(url = %item.url, error = %e, "Keeping feed summary"),
            Err(e) => warn!(url = %item.url, error = %e, "Extraction crashed, keeping feed summary"),
        }
        item
    }

    fn spawn_favicon_lookup(&self, source: &Source) {
        let Some(host) = url::Url::parse(&source.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
        else {
            return;
        };
        let favicon = format!("{}{}", FAVICON_SERVICE, host);
        let request = FetchRequest::new(favicon.clone(), self.settings.html_timeout());
        let fetcher = Arc::clone(&self.fetcher);
        let store = Arc::clone(&self.store);
        let source_id = source.id.clone();

        tokio::spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(document) if document.is_image() => {
                    let update = SourceUpdate {
                        favicon: Some(favicon),
                        ..Default::default()
                    };
                    if let Err(e) = store.save_source(&source_id, &update) {
                        debug!(source_id = %source_id, error = %e, "Failed to store favicon");
                    }
                }
                Ok(_) => debug!(source_id = %source_id, "Favicon lookup returned no image"),
                Err(e) => debug!(source_id = %source_id, error = %e, "Favicon lookup failed"),
            }
        });
    }

    /// Run `future` unless the run of `generation` is aborted first
    async fn until_aborted<T, F>(&self, generation: u64, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            result = future => result,
            _ = self.cancelled(generation) => Err(SmartRssError::Aborted),
        }
    }

    async fn cancelled(&self, generation: u64) {
        loop {
            let notified = self.cancel.notified();
            if !self.is_current(generation) {
                return;
            }
            notified.await;
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn checkpoint(&self, generation: u64) -> Result<()> {
        if self.is_current(generation) {
            Ok(())
        } else {
            Err(SmartRssError::Aborted)
        }
    }

    /// Return to idle when the drain task of `generation` ended without
    /// finishing its run.
    fn reset_after_failure(&self, generation: u64) {
        let has_new = {
            let mut state = self.lock();
            if !self.is_current(generation) {
                return;
            }
            let has_new = state.has_new;
            *state = LoaderState::default();
            has_new
        };
        self.finish(has_new);
    }

    fn finish(&self, has_new: bool) {
        self.emit(LoaderEvent::Finished {
            has_new,
            play_sound: has_new && self.settings.plays_sound(),
        });
        self.idle.send_replace(true);
    }

    fn emit(&self, event: LoaderEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
