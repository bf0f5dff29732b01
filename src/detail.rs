//! Detail view state machine.
//!
//! Each selection gets a new generation. Background loads carry the generation
//! they were started for and are dropped if it no longer matches; their tasks
//! are also aborted outright on reselect or close.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::{AppError, AppResult};
use crate::models::{ContentKind, InteractionKind, Season, Session, Title, TitleDetail};
use crate::recommend::Recommender;
use crate::tmdb::{select_trailer, trailer_embed_url, Listing};

pub const MAX_SIMILAR: usize = 8;
pub const MAX_SUGGESTIONS: usize = 8;
const SIMILAR_GENRES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailPhase {
    #[default]
    Closed,
    Loading,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trailer {
    pub key: String,
    pub name: String,
    pub embed_url: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DetailView {
    pub phase: DetailPhase,
    pub generation: u64,
    pub title: Option<Title>,
    pub detail: Option<TitleDetail>,
    pub trailer: Option<Trailer>,
    pub trailer_loading: bool,
    pub seasons: Vec<Season>,
    pub selected_season: Option<Season>,
    pub seasons_loading: bool,
    pub similar: Vec<Title>,
    pub similar_loading: bool,
    pub suggestions: Vec<Title>,
    pub suggestions_loading: bool,
}

impl DetailView {
    fn closed(generation: u64) -> Self {
        Self {
            generation,
            ..Default::default()
        }
    }

    fn loading(generation: u64, title: Title) -> Self {
        Self {
            phase: DetailPhase::Loading,
            generation,
            title: Some(title),
            ..Default::default()
        }
    }

    pub fn is_settled(&self) -> bool {
        !(self.trailer_loading
            || self.seasons_loading
            || self.similar_loading
            || self.suggestions_loading)
    }
}

#[derive(Default)]
struct DetailState {
    generation: u64,
    view: DetailView,
    tasks: Vec<JoinHandle<()>>,
}

impl DetailState {
    fn advance(&mut self) -> u64 {
        self.generation += 1;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.generation
    }
}

#[derive(Clone)]
pub struct DetailController {
    catalog: Catalog,
    recommender: Arc<Recommender>,
    state: Arc<Mutex<DetailState>>,
}

impl DetailController {
    pub fn new(catalog: Catalog, recommender: Arc<Recommender>) -> Self {
        Self {
            catalog,
            recommender,
            state: Arc::new(Mutex::new(DetailState::default())),
        }
    }

    pub async fn snapshot(&self) -> DetailView {
        self.state.lock().await.view.clone()
    }

    pub async fn close(&self) -> DetailView {
        let mut state = self.state.lock().await;
        let generation = state.advance();
        state.view = DetailView::closed(generation);
        debug!(generation, "Detail closed");
        state.view.clone()
    }

    pub async fn select(&self, title: Title, session: Option<Session>) -> AppResult<DetailView> {
        let generation = {
            let mut state = self.state.lock().await;
            let generation = state.advance();
            state.view = DetailView::loading(generation, title.clone());
            generation
        };
        info!(generation, title_id = title.id, kind = ?title.kind, "Detail selected");

        let click = async {
            if let Err(err) = self
                .recommender
                .record_interaction(session.as_ref(), &title, InteractionKind::Click)
                .await
            {
                debug!(title_id = title.id, error = %err, "Click not recorded");
            }
        };
        let ((), fetched) = tokio::join!(click, self.catalog.detail(&title));

        let mut state = self.state.lock().await;
        if state.generation != generation {
            debug!(generation, current = state.generation, "Detail fetch superseded");
            return Err(AppError::Superseded);
        }
        let detail = match fetched {
            Ok(detail) => detail,
            Err(err) => {
                warn!(title_id = title.id, error = %err, "Detail fetch failed");
                state.view = DetailView::closed(generation);
                return Err(err);
            }
        };

        let is_tv = title.kind == ContentKind::Tv;
        let view = &mut state.view;
        view.phase = DetailPhase::Ready;
        view.detail = Some(detail.clone());
        view.trailer_loading = true;
        view.seasons_loading = is_tv;
        view.similar_loading = true;
        view.suggestions_loading = true;

        let mut tasks = vec![
            tokio::spawn(self.clone().load_trailer(generation, title.clone())),
            tokio::spawn(self.clone().load_similar(generation, detail)),
            tokio::spawn(self.clone().load_suggestions(generation, title.clone(), session)),
        ];
        if is_tv {
            tasks.push(tokio::spawn(self.clone().load_seasons(generation, title)));
        }
        state.tasks = tasks;
        Ok(state.view.clone())
    }

    /// Picks one of the loaded seasons of the TV title on display.
    pub async fn select_season(&self, season_number: u32) -> AppResult<DetailView> {
        let mut state = self.state.lock().await;
        let view = &mut state.view;
        if view.phase != DetailPhase::Ready {
            return Err(AppError::NotFound("no title is open".into()));
        }
        let season = view
            .seasons
            .iter()
            .find(|s| s.season_number == season_number)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("season {season_number}")))?;
        view.selected_season = Some(season);
        Ok(view.clone())
    }

    /// Applies `update` only if `generation` is still the open selection.
    async fn apply(&self, generation: u64, update: impl FnOnce(&mut DetailView)) -> bool {
        let mut state = self.state.lock().await;
        if state.generation != generation || state.view.phase != DetailPhase::Ready {
            debug!(generation, current = state.generation, "Dropping stale detail result");
            return false;
        }
        update(&mut state.view);
        true
    }

    async fn load_trailer(self, generation: u64, title: Title) {
        let trailer = match self.catalog.api().videos(title.kind, title.id).await {
            Ok(videos) => select_trailer(&videos).map(|v| Trailer {
                key: v.key.clone(),
                name: v.name.clone(),
                embed_url: trailer_embed_url(&v.key),
            }),
            Err(err) => {
                warn!(title_id = title.id, error = %format!("{:#}", err), "Trailer lookup failed");
                None
            }
        };
        self.apply(generation, |view| {
            view.trailer = trailer;
            view.trailer_loading = false;
        })
        .await;
    }

    async fn load_seasons(self, generation: u64, title: Title) {
        let seasons = match self.catalog.api().tv_seasons(title.id).await {
            Ok(seasons) => seasons,
            Err(err) => {
                warn!(title_id = title.id, error = %format!("{:#}", err), "Season list failed");
                Vec::new()
            }
        };
        self.apply(generation, |view| {
            view.selected_season = seasons.first().cloned();
            view.seasons = seasons;
            view.seasons_loading = false;
        })
        .await;
    }

    async fn load_similar(self, generation: u64, detail: TitleDetail) {
        let similar = self.similar_titles(&detail).await;
        self.apply(generation, |view| {
            view.similar = similar;
            view.similar_loading = false;
        })
        .await;
    }

    async fn similar_titles(&self, detail: &TitleDetail) -> Vec<Title> {
        let own = &detail.title;
        let genres: Vec<u32> = detail
            .genres
            .iter()
            .map(|g| g.id)
            .take(SIMILAR_GENRES)
            .collect();

        if !genres.is_empty() {
            match self.catalog.discover_by_genres(own.kind, &genres).await {
                Ok(page) => {
                    let found = excluding(page.results, own.id, MAX_SIMILAR);
                    if !found.is_empty() {
                        return found;
                    }
                }
                Err(err) => {
                    warn!(title_id = own.id, error = %err, "Similar-by-genre lookup failed")
                }
            }
        }
        // Empty or failed discovery falls back to the catalog's own similar list.
        excluding(detail.similar.clone(), own.id, MAX_SIMILAR)
    }

    async fn load_suggestions(self, generation: u64, title: Title, session: Option<Session>) {
        let suggestions = self.suggested_titles(&title, session.as_ref()).await;
        self.apply(generation, |view| {
            view.suggestions = suggestions;
            view.suggestions_loading = false;
        })
        .await;
    }

    async fn suggested_titles(&self, title: &Title, session: Option<&Session>) -> Vec<Title> {
        match self.recommender.recommend(session).await {
            Ok(recs) => {
                let picks = excluding(recs.titles, title.id, MAX_SUGGESTIONS);
                if !picks.is_empty() {
                    return picks;
                }
            }
            Err(err) => debug!(title_id = title.id, error = %err, "No personalised suggestions"),
        }

        match self.catalog.list(Listing::PopularMovies, 1).await {
            Ok(page) => excluding(page.results, title.id, MAX_SUGGESTIONS),
            Err(err) => {
                warn!(error = %err, "Popular fallback failed");
                Vec::new()
            }
        }
    }
}

fn excluding(titles: Vec<Title>, id: u32, cap: usize) -> Vec<Title> {
    titles.into_iter().filter(|t| t.id != id).take(cap).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TitleWire;

    fn title(id: u32) -> Title {
        TitleWire {
            id,
            title: Some(format!("t{id}")),
            ..Default::default()
        }
        .into_title(None)
    }

    #[test]
    fn excluding_drops_current_and_caps() {
        let titles: Vec<Title> = (1..=12).map(title).collect();
        let ids: Vec<u32> = excluding(titles, 3, MAX_SIMILAR)
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 4, 5, 6, 7, 8, 9]);
    }

    #[tokio::test]
    async fn advancing_aborts_outstanding_tasks() {
        let mut state = DetailState::default();
        let handle = tokio::spawn(std::future::pending::<()>());
        state.tasks.push(handle);
        assert_eq!(state.advance(), 1);
        assert!(state.tasks.is_empty());
    }

    #[test]
    fn settled_only_when_every_slot_is_done() {
        let mut view = DetailView::loading(1, title(1));
        assert!(view.is_settled());
        view.similar_loading = true;
        assert!(!view.is_settled());
    }
}
