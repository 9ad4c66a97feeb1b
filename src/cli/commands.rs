use tokio::sync::broadcast::error::TryRecvError;

use crate::app::{AppContext, Result, SmartRssError};
use crate::domain::{FulltextMode, Item, Node, Source};
use crate::fetcher::FetchRequest;
use crate::loader::LoaderEvent;
use crate::store::{ItemStore, SourceStore};

pub struct AddOptions {
    pub url: String,
    pub fulltext: FulltextMode,
    pub selector: Option<String>,
    pub update_every: i64,
    pub folder: Option<String>,
}

pub async fn add_source(ctx: &AppContext, options: AddOptions) -> Result<()> {
    if ctx.store.find_source_by_url(&options.url)?.is_some() {
        println!("Source already exists: {}", options.url);
        return Ok(());
    }

    let mut source = Source::with_url(options.url.clone());
    source.fulltext = options.fulltext;
    source.fulltext_position = options.selector.unwrap_or_default();
    source.update_every = options.update_every;
    source.folder_id = options.folder;
    ctx.store.create_source(&source)?;
    println!("Added source: {}", options.url);

    ctx.loader.download_feeds(vec![Node::Source(source.clone())], true)?;
    ctx.loader.wait_idle().await;

    let stored = ctx
        .store
        .find_source(&source.id)?
        .ok_or_else(|| SmartRssError::SourceNotFound(source.id.clone()))?;
    if stored.last_update_failed {
        eprintln!("Could not download {}", stored.url);
    } else {
        println!("Source title: {}", stored.display_title());
        println!("Fetched {} items", stored.count_all);
    }
    Ok(())
}

pub fn remove_source(ctx: &AppContext, url: &str) -> Result<()> {
    let source = ctx
        .store
        .find_source_by_url(url)?
        .ok_or_else(|| SmartRssError::SourceNotFound(url.to_string()))?;

    for item in ctx.store.items_of_source(&source.id)? {
        ctx.store.destroy_item(&item.id)?;
    }
    ctx.store.destroy_source(&source.id)?;
    println!("Removed source: {}", url);
    Ok(())
}

pub async fn update_sources(ctx: &AppContext, force: bool) -> Result<()> {
    let mut events = ctx.loader.subscribe();
    let queued = ctx.loader.download_all(force)?;
    if queued == 0 {
        println!("No sources to update");
        return Ok(());
    }

    println!("Updating {} sources...", queued);
    ctx.loader.wait_idle().await;

    let (mut updated, mut failed, mut has_new) = (0, 0, false);
    loop {
        match events.try_recv() {
            Ok(LoaderEvent::SourceUpdated { source_id, ok }) => {
                if ok {
                    updated += 1;
                } else {
                    failed += 1;
                    if let Ok(Some(source)) = ctx.store.find_source(&source_id) {
                        eprintln!("  Error updating {}", source.display_title());
                    }
                }
            }
            Ok(LoaderEvent::Finished { has_new: new, .. }) => has_new |= new,
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }

    println!(
        "Update complete: {} updated, {} failed{}",
        updated,
        failed,
        if has_new { ", new items available" } else { "" }
    );
    Ok(())
}

pub fn list_sources(ctx: &AppContext) -> Result<()> {
    let sources = ctx.store.all_sources()?;

    if sources.is_empty() {
        println!("No sources");
        return Ok(());
    }

    for source in sources {
        println!(
            "{} ({} unread / {}){}\n  {}",
            source.display_title(),
            source.count,
            source.count_all,
            if source.last_update_failed { " [failed]" } else { "" },
            source.url
        );
    }

    Ok(())
}

pub fn list_items(ctx: &AppContext) -> Result<()> {
    let items = ctx.store.filter_items(&|item: &Item| !item.trashed)?;

    if items.is_empty() {
        println!("No items");
        return Ok(());
    }

    for item in items {
        let read_marker = if item.unread { "●" } else { " " };
        let date = chrono::DateTime::from_timestamp_millis(item.date)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "          ".to_string());

        println!("{} {} {}", read_marker, date, item.title);
    }

    Ok(())
}

/// Fetch `url` and print what the extractor makes of it
pub async fn extract_page(
    ctx: &AppContext,
    url: &str,
    mode: FulltextMode,
    selector: Option<String>,
) -> Result<()> {
    let request = FetchRequest::new(url, ctx.loader.settings().html_timeout());
    let page = ctx.fetcher.fetch(&request).await?;

    let mut source = Source::new("extract", url);
    source.fulltext = mode;
    source.fulltext_position = selector.unwrap_or_default();

    let extracted = ctx.extractor.extract(&page.text(), &source, &page.final_url)?;
    println!("{}", extracted.html);
    if let Some(next) = extracted.next_page {
        eprintln!("Next page: {}", next);
    }
    Ok(())
}
