use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::catalog::{Catalog, ROMANCE_GENRE};
use crate::models::Title;
use crate::tmdb::Listing;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeedSnapshot {
    pub listing: String,
    pub items: Vec<Title>,
    /// Items matching the chosen category, or every item when none is chosen.
    pub filtered: Vec<Title>,
    pub category: Option<u32>,
    pub page: u32,
    pub total_pages: u32,
    pub has_more: bool,
    pub loading: bool,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct FeedState {
    items: Vec<Title>,
    category: Option<u32>,
    page: u32,
    total_pages: u32,
    has_more: bool,
    loading: bool,
    last_error: Option<String>,
    // Bumped by every reset so an older in-flight page is discarded.
    epoch: u64,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            category: None,
            page: 0,
            total_pages: 0,
            has_more: true,
            loading: false,
            last_error: None,
            epoch: 0,
        }
    }
}

pub fn matches_category(title: &Title, genre_id: u32) -> bool {
    title.has_genre(genre_id) && !title.has_genre(ROMANCE_GENRE)
}

/// Infinite-scroll feed over one filtered listing.
#[derive(Clone)]
pub struct BrowseFeed {
    catalog: Catalog,
    listing: Listing,
    state: Arc<Mutex<FeedState>>,
}

impl BrowseFeed {
    pub fn new(catalog: Catalog, listing: Listing) -> Self {
        Self {
            catalog,
            listing,
            state: Arc::new(Mutex::new(FeedState::default())),
        }
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        let state = self.state.lock().await;
        self.snapshot_of(&state)
    }

    fn snapshot_of(&self, state: &FeedState) -> FeedSnapshot {
        let filtered = match state.category {
            Some(genre) => state
                .items
                .iter()
                .filter(|t| matches_category(t, genre))
                .cloned()
                .collect(),
            None => state.items.clone(),
        };
        FeedSnapshot {
            listing: format!("{:?}", self.listing),
            items: state.items.clone(),
            filtered,
            category: state.category,
            page: state.page,
            total_pages: state.total_pages,
            has_more: state.has_more,
            loading: state.loading,
            last_error: state.last_error.clone(),
        }
    }

    /// Drops everything loaded so far and fetches page 1.
    pub async fn load_first(&self) -> FeedSnapshot {
        let epoch = {
            let mut state = self.state.lock().await;
            state.epoch += 1;
            state.items.clear();
            state.page = 0;
            state.total_pages = 0;
            state.has_more = true;
            state.loading = true;
            state.last_error = None;
            state.epoch
        };
        self.fetch(epoch, 1).await
    }

    /// Appends the next page. Does nothing while a load is running or once
    /// the last page is in.
    pub async fn load_more(&self) -> FeedSnapshot {
        let (epoch, next) = {
            let mut state = self.state.lock().await;
            if state.loading || !state.has_more {
                debug!(
                    loading = state.loading,
                    has_more = state.has_more,
                    "Skipping load_more"
                );
                return self.snapshot_of(&state);
            }
            state.loading = true;
            (state.epoch, state.page + 1)
        };
        self.fetch(epoch, next).await
    }

    async fn fetch(&self, epoch: u64, page: u32) -> FeedSnapshot {
        let result = self.catalog.list(self.listing, page).await;

        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            debug!(page, "Discarding page from a previous reset");
            return self.snapshot_of(&state);
        }
        state.loading = false;
        match result {
            Ok(fetched) => {
                state.page = page;
                state.total_pages = fetched.total_pages;
                state.has_more = page < fetched.total_pages;
                state.items.extend(fetched.results);
                state.last_error = None;
                debug!(
                    page,
                    total_pages = state.total_pages,
                    items = state.items.len(),
                    "Feed page loaded"
                );
            }
            Err(err) => {
                warn!(page, error = %err, "Feed page failed");
                state.last_error = Some(err.to_string());
            }
        }
        self.snapshot_of(&state)
    }

    /// Chooses the category shown in `filtered`. `None` shows everything.
    pub async fn set_category(&self, genre_id: Option<u32>) -> FeedSnapshot {
        let mut state = self.state.lock().await;
        state.category = genre_id;
        self.snapshot_of(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DRAMA_GENRE;
    use crate::models::TitleWire;

    #[test]
    fn category_excludes_romance() {
        let action = TitleWire {
            id: 1,
            genre_ids: Some(vec![28, DRAMA_GENRE]),
            ..Default::default()
        }
        .into_title(None);
        let romantic_action = TitleWire {
            id: 2,
            genre_ids: Some(vec![28, ROMANCE_GENRE]),
            ..Default::default()
        }
        .into_title(None);

        assert!(matches_category(&action, 28));
        assert!(!matches_category(&romantic_action, 28));
        assert!(!matches_category(&action, 35));
    }
}
