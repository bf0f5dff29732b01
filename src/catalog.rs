use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::{ContentKind, Genre, Page, Title, TitleDetail};
use crate::tmdb::{Listing, TmdbApi};

pub const DRAMA_GENRE: u32 = 18;
pub const ROMANCE_GENRE: u32 = 10749;

/// Curated picks for the home page carousel.
pub const FEATURED_TITLES: &[(&str, ContentKind)] = &[
    ("American Psycho", ContentKind::Movie),
    ("Fight Club", ContentKind::Movie),
    ("500 Days of Summer", ContentKind::Movie),
    ("The Notebook", ContentKind::Movie),
    ("Avengers: Endgame", ContentKind::Movie),
    ("Spider-Man: No Way Home", ContentKind::Movie),
    ("Dunkirk", ContentKind::Movie),
    ("The Matrix", ContentKind::Movie),
    ("Inception", ContentKind::Movie),
    ("The Dark Knight", ContentKind::Movie),
    ("Interstellar", ContentKind::Movie),
    ("Toy Story", ContentKind::Movie),
    ("Frozen", ContentKind::Movie),
    ("Moana", ContentKind::Movie),
    ("Friends", ContentKind::Tv),
    ("Stranger Things", ContentKind::Tv),
    ("The Office", ContentKind::Tv),
    ("Lost", ContentKind::Tv),
    ("The Crown", ContentKind::Tv),
    ("The Mandalorian", ContentKind::Tv),
    ("The Simpsons", ContentKind::Tv),
    ("Avatar: The Last Airbender", ContentKind::Tv),
    ("Gravity Falls", ContentKind::Tv),
    ("The Big Bang Theory", ContentKind::Tv),
    ("Modern Family", ContentKind::Tv),
];

/// Titles tagged with both drama and romance are hidden from listings.
pub fn is_excluded(title: &Title) -> bool {
    title.has_genre(DRAMA_GENRE) && title.has_genre(ROMANCE_GENRE)
}

pub fn filter_page(mut page: Page<Title>) -> Page<Title> {
    page.results.retain(|t| !is_excluded(t));
    page
}

/// Converts a catalog failure into an empty page, which is how every consumer
/// of listings treats an unavailable upstream.
pub fn page_or_empty(result: AppResult<Page<Title>>, page: u32) -> Page<Title> {
    match result {
        Ok(p) => p,
        Err(err) => {
            warn!(page, error = %err, "Catalog page unavailable, showing nothing");
            Page::empty(page)
        }
    }
}

/// Filtering facade over the raw catalog client.
#[derive(Clone)]
pub struct Catalog {
    api: Arc<dyn TmdbApi>,
}

impl Catalog {
    pub fn new(api: Arc<dyn TmdbApi>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &Arc<dyn TmdbApi> {
        &self.api
    }

    pub async fn list(&self, listing: Listing, page: u32) -> AppResult<Page<Title>> {
        let page = page.max(1);
        let raw = self
            .api
            .list(listing, page)
            .await
            .map_err(AppError::upstream)?;
        debug!(?listing, page, results = raw.results.len(), "Listing fetched");
        Ok(filter_page(raw))
    }

    /// Raw search; results are never filtered.
    pub async fn search(
        &self,
        kind: ContentKind,
        query: &str,
        page: u32,
    ) -> AppResult<Page<Title>> {
        let query = query.trim();
        let page = page.max(1);
        if query.is_empty() {
            return Ok(Page::empty(page));
        }
        self.api
            .search(kind, query, page)
            .await
            .map_err(AppError::upstream)
    }

    pub async fn discover_by_genres(
        &self,
        kind: ContentKind,
        genre_ids: &[u32],
    ) -> AppResult<Page<Title>> {
        if genre_ids.is_empty() {
            return Ok(Page::empty(1));
        }
        let raw = self
            .api
            .discover_by_genres(kind, genre_ids)
            .await
            .map_err(AppError::upstream)?;
        Ok(filter_page(raw))
    }

    pub async fn detail(&self, title: &Title) -> AppResult<TitleDetail> {
        let result = match title.kind {
            ContentKind::Movie => self.api.movie_detail(title.id).await,
            ContentKind::Tv => self.api.tv_detail(title.id).await,
        };
        result.map_err(AppError::upstream)
    }

    /// Movie genres offered as browse categories. Romance is never offered.
    pub async fn genres(&self) -> AppResult<Vec<Genre>> {
        let mut genres = self.api.movie_genres().await.map_err(AppError::upstream)?;
        genres.retain(|g| g.id != ROMANCE_GENRE);
        Ok(genres)
    }

    /// Resolves a curated list of names to catalog titles, one search each,
    /// keeping the first hit. Misses and failures drop out.
    pub async fn featured(&self, entries: &[(&str, ContentKind)]) -> Vec<Title> {
        let lookups = entries.iter().map(|(name, kind)| async move {
            match self.search(*kind, name, 1).await {
                Ok(page) => page.results.into_iter().next().map(|mut t| {
                    t.kind = *kind;
                    t
                }),
                Err(err) => {
                    warn!(name = %name, error = %err, "Featured lookup failed");
                    None
                }
            }
        });
        join_all(lookups).await.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TitleWire;

    fn title(id: u32, genres: &[u32]) -> Title {
        TitleWire {
            id,
            title: Some(format!("t{id}")),
            genre_ids: Some(genres.to_vec()),
            ..Default::default()
        }
        .into_title(None)
    }

    #[test]
    fn drops_only_drama_romance_combination() {
        let page = Page {
            page: 1,
            results: vec![
                title(1, &[DRAMA_GENRE]),
                title(2, &[DRAMA_GENRE, ROMANCE_GENRE]),
                title(3, &[ROMANCE_GENRE, 35]),
                title(4, &[35, ROMANCE_GENRE, 80, DRAMA_GENRE]),
            ],
            total_pages: 3,
            total_results: 60,
        };
        let filtered = filter_page(page);
        let ids: Vec<u32> = filtered.results.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(filtered.total_pages, 3);
    }

    #[test]
    fn failures_become_empty_pages() {
        let page = page_or_empty(Err(AppError::UpstreamUnavailable("down".into())), 4);
        assert_eq!(page.page, 4);
        assert!(page.results.is_empty());
        assert_eq!(page.total_pages, 0);
    }
}
