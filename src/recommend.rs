use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::{AppError, AppResult};
use crate::models::{ContentKind, Interaction, InteractionKind, NewInteraction, Session, Title};
use crate::store::StoreApi;

pub const TOP_GENRE_COUNT: usize = 3;
pub const MAX_RECOMMENDATIONS: usize = 6;

/// How the ranked genres are turned into titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenreStrategy {
    /// Ranks genres but proposes no titles. Matches the shipped behaviour
    /// until product decides on a genre query.
    #[default]
    Disabled,
    /// Popular titles carrying all of the top genres.
    Discover,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendations {
    pub genres: Vec<u32>,
    pub titles: Vec<Title>,
    pub strategy: GenreStrategy,
}

/// Occurrences of each genre id across the interaction log.
pub fn genre_frequency(interactions: &[Interaction]) -> BTreeMap<u32, usize> {
    let mut frequency = BTreeMap::new();
    for genre in interactions.iter().flat_map(|i| i.genre_ids.iter()) {
        *frequency.entry(*genre).or_insert(0) += 1;
    }
    frequency
}

/// Most frequent genres first. Ties keep ascending genre id order.
pub fn top_genres(frequency: &BTreeMap<u32, usize>, count: usize) -> Vec<u32> {
    let mut ranked: Vec<(u32, usize)> = frequency.iter().map(|(g, n)| (*g, *n)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.into_iter().take(count).map(|(g, _)| g).collect()
}

pub struct Recommender {
    store: Arc<dyn StoreApi>,
    catalog: Catalog,
    strategy: GenreStrategy,
}

impl Recommender {
    pub fn new(store: Arc<dyn StoreApi>, catalog: Catalog, strategy: GenreStrategy) -> Self {
        Self {
            store,
            catalog,
            strategy,
        }
    }

    pub fn strategy(&self) -> GenreStrategy {
        self.strategy
    }

    pub async fn record_interaction(
        &self,
        session: Option<&Session>,
        title: &Title,
        kind: InteractionKind,
    ) -> AppResult<Interaction> {
        let session =
            session.ok_or_else(|| AppError::NotAuthenticated("User not logged in".into()))?;

        let record = NewInteraction {
            user_id: session.user_id().to_string(),
            title_id: title.id,
            title_name: title.name.clone(),
            kind,
            recorded_at: Utc::now(),
            genre_ids: title.genre_ids.clone(),
            content_kind: title.kind,
        };
        let saved = self
            .store
            .create_interaction(&record)
            .await
            .map_err(AppError::persistence)?;
        debug!(
            user_id = session.user_id(),
            title_id = title.id,
            ?kind,
            "Interaction recorded"
        );
        Ok(saved)
    }

    pub async fn recommend(&self, session: Option<&Session>) -> AppResult<Recommendations> {
        let session = session.ok_or_else(|| {
            AppError::NotAuthenticated("Log in to get recommendations".into())
        })?;
        let interactions = self
            .store
            .list_interactions(session.user_id())
            .await
            .map_err(AppError::persistence)?;
        if interactions.is_empty() {
            return Err(AppError::NoHistory);
        }

        let genres = top_genres(&genre_frequency(&interactions), TOP_GENRE_COUNT);
        let titles = match self.strategy {
            GenreStrategy::Disabled => Vec::new(),
            GenreStrategy::Discover => match self
                .catalog
                .discover_by_genres(ContentKind::Movie, &genres)
                .await
            {
                Ok(mut page) => {
                    page.results.truncate(MAX_RECOMMENDATIONS);
                    page.results
                }
                // Ranked genres are still returned when the catalog is down.
                Err(err) => {
                    warn!(?genres, error = %err, "Genre discovery failed, no titles proposed");
                    Vec::new()
                }
            },
        };
        info!(
            user_id = session.user_id(),
            interactions = interactions.len(),
            ?genres,
            titles = titles.len(),
            "Recommendations computed"
        );

        Ok(Recommendations {
            genres,
            titles,
            strategy: self.strategy,
        })
    }

    /// Deletes every interaction of the user, returning how many went away.
    /// Stops at the first failed delete.
    pub async fn clear_interactions(&self, session: Option<&Session>) -> AppResult<usize> {
        let session =
            session.ok_or_else(|| AppError::NotAuthenticated("User not logged in".into()))?;
        let interactions = self
            .store
            .list_interactions(session.user_id())
            .await
            .map_err(AppError::persistence)?;

        let mut removed = 0;
        for interaction in &interactions {
            if let Err(err) = self.store.delete_interaction(&interaction.id).await {
                warn!(
                    interaction_id = %interaction.id,
                    error = %format!("{:#}", err),
                    "Failed to delete interaction"
                );
                return Err(AppError::persistence(err));
            }
            removed += 1;
        }
        info!(user_id = session.user_id(), removed, "Interactions cleared");
        Ok(removed)
    }
}
