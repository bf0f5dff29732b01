use crate::auth::{Auth, LoginRequest, LogoutReport, RegisterRequest};
use crate::browse::{BrowseFeed, FeedSnapshot};
use crate::catalog::{page_or_empty, Catalog, FEATURED_TITLES};
use crate::config::Config;
use crate::detail::{DetailController, DetailView};
use crate::error::{AppError, AppResult};
use crate::ledger::{CancelReceipt, Ledger, PurchaseReceipt};
use crate::models::{
    ContentKind, Genre, Interaction, InteractionKind, Page, Purchase, Season, Session, Title,
    TitleId, User,
};
use crate::recommend::{GenreStrategy, Recommendations, Recommender};
use crate::session::SessionStore;
use crate::store::{RestStore, StoreApi};
use crate::tmdb::{Listing, TmdbApi, TmdbClient};
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{info, warn};

const MAX_BODY_BYTES: usize = 256 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub sessions: Arc<SessionStore>,
    pub ledger: Arc<Ledger>,
    pub recommender: Arc<Recommender>,
    pub detail: DetailController,
    pub browse: BrowseFeed,
    pub auth: Arc<Auth>,
}

impl AppState {
    pub fn new(
        tmdb: Arc<dyn TmdbApi>,
        store: Arc<dyn StoreApi>,
        sessions: Arc<SessionStore>,
        strategy: GenreStrategy,
    ) -> Self {
        let catalog = Catalog::new(tmdb);
        let ledger = Arc::new(Ledger::new(store.clone()));
        let recommender = Arc::new(Recommender::new(store.clone(), catalog.clone(), strategy));
        let detail = DetailController::new(catalog.clone(), recommender.clone());
        let browse = BrowseFeed::new(catalog.clone(), Listing::PopularMovies);
        let auth = Arc::new(Auth::new(store, sessions.clone(), ledger.clone()));
        Self {
            catalog,
            sessions,
            ledger,
            recommender,
            detail,
            browse,
            auth,
        }
    }

    fn session(&self) -> Option<Session> {
        self.sessions.current()
    }
}

pub async fn run_server(config: Config) -> Result<()> {
    let tmdb: Arc<dyn TmdbApi> = Arc::new(TmdbClient::new(
        config.tmdb_api_key.clone(),
        config.tmdb_base_url.clone(),
        config.language.clone(),
        config.http_timeout,
    )?);
    let store: Arc<dyn StoreApi> =
        Arc::new(RestStore::new(config.store_url.clone(), config.http_timeout)?);
    let sessions = Arc::new(SessionStore::load(config.session_file.clone()).await);

    let state = AppState::new(tmdb, store, sessions, config.genre_strategy);
    if let Some(session) = state.session() {
        if let Err(err) = state.ledger.reload(&session).await {
            warn!(error = %err, "Purchases unavailable at startup");
        }
    }

    let app = build_router(state);

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/catalog/popular", get(popular_movies))
        .route("/catalog/top-rated", get(top_rated_movies))
        .route("/catalog/trending", get(trending_movies))
        .route("/catalog/tv/popular", get(popular_tv))
        .route("/catalog/tv/top-rated", get(top_rated_tv))
        .route("/catalog/search", get(search))
        .route("/catalog/genres", get(genres))
        .route("/catalog/featured", get(featured))
        .route("/browse", get(browse_snapshot).post(browse_first))
        .route("/browse/more", post(browse_more))
        .route("/browse/genre", post(browse_genre))
        .route("/detail", get(detail_snapshot).delete(detail_close))
        .route("/detail/select", post(detail_select))
        .route("/detail/season", post(detail_season))
        .route("/purchases", get(list_purchases).post(purchase_movie))
        .route("/purchases/season", post(purchase_season))
        .route("/purchases/status", get(purchase_status))
        .route("/purchases/:id", axum::routing::delete(cancel_purchase))
        .route("/interactions", post(record_interaction).delete(clear_interactions))
        .route("/recommendations", get(recommendations))
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    query: String,
    kind: Option<ContentKind>,
    page: Option<u32>,
}

async fn listing(state: &AppState, listing: Listing, query: PageQuery) -> Json<Page<Title>> {
    let page = query.page.unwrap_or(1).max(1);
    Json(page_or_empty(state.catalog.list(listing, page).await, page))
}

async fn popular_movies(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Json<Page<Title>> {
    listing(&state, Listing::PopularMovies, q).await
}

async fn top_rated_movies(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Json<Page<Title>> {
    listing(&state, Listing::TopRatedMovies, q).await
}

async fn trending_movies(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Json<Page<Title>> {
    listing(&state, Listing::TrendingMovies, q).await
}

async fn popular_tv(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Json<Page<Title>> {
    listing(&state, Listing::PopularTv, q).await
}

async fn top_rated_tv(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Json<Page<Title>> {
    listing(&state, Listing::TopRatedTv, q).await
}

async fn search(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Json<Page<Title>> {
    let page = q.page.unwrap_or(1).max(1);
    let kind = q.kind.unwrap_or_default();
    Json(page_or_empty(
        state.catalog.search(kind, &q.query, page).await,
        page,
    ))
}

async fn genres(State(state): State<AppState>) -> Json<Vec<Genre>> {
    match state.catalog.genres().await {
        Ok(genres) => Json(genres),
        Err(err) => {
            warn!(error = %err, "Genre list unavailable");
            Json(Vec::new())
        }
    }
}

async fn featured(State(state): State<AppState>) -> Json<Vec<Title>> {
    Json(state.catalog.featured(FEATURED_TITLES).await)
}

#[derive(Debug, Deserialize)]
struct GenreBody {
    genre_id: Option<u32>,
}

async fn browse_snapshot(State(state): State<AppState>) -> Json<FeedSnapshot> {
    Json(state.browse.snapshot().await)
}

async fn browse_first(State(state): State<AppState>) -> Json<FeedSnapshot> {
    Json(state.browse.load_first().await)
}

async fn browse_more(State(state): State<AppState>) -> Json<FeedSnapshot> {
    Json(state.browse.load_more().await)
}

async fn browse_genre(
    State(state): State<AppState>,
    Json(body): Json<GenreBody>,
) -> Json<FeedSnapshot> {
    Json(state.browse.set_category(body.genre_id).await)
}

#[derive(Debug, Deserialize)]
struct SeasonBody {
    season_number: u32,
}

async fn detail_snapshot(State(state): State<AppState>) -> Json<DetailView> {
    Json(state.detail.snapshot().await)
}

async fn detail_close(State(state): State<AppState>) -> Json<DetailView> {
    Json(state.detail.close().await)
}

async fn detail_select(
    State(state): State<AppState>,
    Json(title): Json<Title>,
) -> AppResult<Json<DetailView>> {
    let session = state.session();
    Ok(Json(state.detail.select(title, session).await?))
}

async fn detail_season(
    State(state): State<AppState>,
    Json(body): Json<SeasonBody>,
) -> AppResult<Json<DetailView>> {
    Ok(Json(state.detail.select_season(body.season_number).await?))
}

#[derive(Debug, Deserialize)]
struct SeasonPurchaseBody {
    title: Title,
    season: Season,
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    title_id: TitleId,
}

#[derive(Debug, Serialize)]
struct PurchaseStatusResponse {
    title_id: TitleId,
    purchased: bool,
    purchase: Option<Purchase>,
    seasons: Vec<u32>,
}

async fn list_purchases(State(state): State<AppState>) -> AppResult<Json<Vec<Purchase>>> {
    let session = state
        .session()
        .ok_or_else(|| AppError::NotAuthenticated("Log in to see your purchases".into()))?;
    state.ledger.reload(&session).await?;
    Ok(Json(state.ledger.purchases().await))
}

async fn purchase_movie(
    State(state): State<AppState>,
    Json(title): Json<Title>,
) -> AppResult<Json<PurchaseReceipt>> {
    let session = state.session();
    Ok(Json(state.ledger.purchase(session.as_ref(), &title).await?))
}

async fn purchase_season(
    State(state): State<AppState>,
    Json(body): Json<SeasonPurchaseBody>,
) -> AppResult<Json<PurchaseReceipt>> {
    let session = state.session();
    Ok(Json(
        state
            .ledger
            .purchase_season(session.as_ref(), &body.title, &body.season)
            .await?,
    ))
}

async fn purchase_status(
    State(state): State<AppState>,
    Query(q): Query<StatusQuery>,
) -> Json<PurchaseStatusResponse> {
    Json(PurchaseStatusResponse {
        title_id: q.title_id,
        purchased: state.ledger.is_purchased(q.title_id).await,
        purchase: state.ledger.find_by_title(q.title_id).await,
        seasons: state.ledger.purchased_seasons(q.title_id).await,
    })
}

async fn cancel_purchase(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<CancelReceipt>> {
    let session = state.session();
    Ok(Json(state.ledger.cancel(session.as_ref(), &id).await?))
}

#[derive(Debug, Deserialize)]
struct InteractionBody {
    title: Title,
    #[serde(default)]
    kind: InteractionKind,
}

async fn record_interaction(
    State(state): State<AppState>,
    Json(body): Json<InteractionBody>,
) -> AppResult<Json<Interaction>> {
    let session = state.session();
    Ok(Json(
        state
            .recommender
            .record_interaction(session.as_ref(), &body.title, body.kind)
            .await?,
    ))
}

async fn clear_interactions(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let session = state.session();
    let removed = state.recommender.clear_interactions(session.as_ref()).await?;
    Ok(Json(json!({ "removed": removed })))
}

async fn recommendations(State(state): State<AppState>) -> AppResult<Json<Recommendations>> {
    let session = state.session();
    Ok(Json(state.recommender.recommend(session.as_ref()).await?))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<Session>> {
    Ok(Json(state.auth.login(&body).await?))
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<Json<Session>> {
    Ok(Json(state.auth.register(&body).await?))
}

async fn logout(State(state): State<AppState>) -> Json<LogoutReport> {
    state.detail.close().await;
    Json(state.auth.logout().await)
}

async fn me(State(state): State<AppState>) -> AppResult<Json<User>> {
    state
        .auth
        .current()
        .map(|s| Json(s.user))
        .ok_or_else(|| AppError::NotAuthenticated("Not logged in".into()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
