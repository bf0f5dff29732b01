#![allow(dead_code)]

use anyhow::anyhow;
use chrono::Utc;
use labtv::models::{
    ContentKind, Genre, Interaction, NewInteraction, NewPurchase, NewUserRecord, Page, Purchase,
    Season, Session, SubscriptionTier, Title, TitleDetail, TitleId, User, UserRecord, Video,
};
use labtv::store::StoreApi;
use labtv::tmdb::{Listing, TmdbApi};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn title(id: TitleId, name: &str, kind: ContentKind, genres: &[u32]) -> Title {
    let mut raw = json!({
        "id": id,
        "genre_ids": genres,
        "vote_average": 7.5,
        "popularity": 50.0,
        "media_type": kind.as_path(),
    });
    match kind {
        ContentKind::Movie => raw["title"] = json!(name),
        ContentKind::Tv => {
            raw["name"] = json!(name);
            raw["first_air_date"] = json!("2020-01-01");
        }
    }
    serde_json::from_value(raw).unwrap()
}

pub fn movie(id: TitleId, genres: &[u32]) -> Title {
    title(id, &format!("Movie {id}"), ContentKind::Movie, genres)
}

pub fn show(id: TitleId, genres: &[u32]) -> Title {
    title(id, &format!("Show {id}"), ContentKind::Tv, genres)
}

pub fn detail_for(title: &Title, genres: &[(u32, &str)], similar: Vec<Title>) -> TitleDetail {
    TitleDetail {
        title: title.clone(),
        genres: genres
            .iter()
            .map(|(id, name)| Genre {
                id: *id,
                name: name.to_string(),
            })
            .collect(),
        tagline: None,
        runtime: Some(120),
        status: Some("Released".into()),
        cast: Vec::new(),
        directors: vec!["Someone".into()],
        similar,
        created_by: Vec::new(),
        number_of_seasons: None,
        number_of_episodes: None,
        last_air_date: None,
        seasons: Vec::new(),
    }
}

pub fn season(number: u32, episodes: u32, vote_average: f64) -> Season {
    Season {
        id: 1000 + number,
        name: format!("Season {number}"),
        season_number: number,
        episode_count: episodes,
        vote_average,
        ..Default::default()
    }
}

pub fn trailer(key: &str) -> Video {
    Video {
        key: key.to_string(),
        name: format!("Trailer {key}"),
        site: "YouTube".into(),
        video_type: "Trailer".into(),
        official: true,
    }
}

pub fn page_of(page: u32, total_pages: u32, results: Vec<Title>) -> Page<Title> {
    Page {
        page,
        total_results: results.len() as u32,
        results,
        total_pages,
    }
}

pub fn session(user_id: &str) -> Session {
    let now = Utc::now();
    Session {
        user: User {
            id: user_id.to_string(),
            first_name: "Test".into(),
            last_name: "User".into(),
            email: format!("{user_id}@example.com"),
            tier: SubscriptionTier::Standard,
            subscribed_at: now,
            created_at: now,
            updated_at: now,
        },
        token: format!("token-{user_id}"),
        issued_at: now,
    }
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if check().await {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met before deadline");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[derive(Default)]
pub struct FakeTmdb {
    pub listing_pages: Mutex<HashMap<u32, Page<Title>>>,
    pub failing_pages: Mutex<HashSet<u32>>,
    pub search_results: Mutex<Vec<Title>>,
    pub search_by_query: Mutex<HashMap<String, Vec<Title>>>,
    pub failing_queries: Mutex<HashSet<String>>,
    pub discover_results: Mutex<Vec<Title>>,
    pub fail_discover: AtomicBool,
    pub details: Mutex<HashMap<(ContentKind, TitleId), TitleDetail>>,
    pub detail_delay: Mutex<HashMap<TitleId, Duration>>,
    pub videos: Mutex<HashMap<TitleId, Vec<Video>>>,
    pub video_delay: Mutex<HashMap<TitleId, Duration>>,
    pub seasons: Mutex<HashMap<TitleId, Vec<Season>>>,
    pub genres: Mutex<Vec<Genre>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeTmdb {
    pub fn with_detail(self, detail: TitleDetail) -> Self {
        self.details
            .lock()
            .unwrap()
            .insert((detail.title.kind, detail.title.id), detail);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn pause(map: &Mutex<HashMap<TitleId, Duration>>, id: TitleId) {
        let delay = map.lock().unwrap().get(&id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn detail(&self, kind: ContentKind, id: TitleId) -> anyhow::Result<TitleDetail> {
        self.details
            .lock()
            .unwrap()
            .get(&(kind, id))
            .cloned()
            .ok_or_else(|| anyhow!("no {} detail for {}", kind.as_path(), id))
    }
}

#[async_trait::async_trait]
impl TmdbApi for FakeTmdb {
    async fn list(&self, listing: Listing, page: u32) -> anyhow::Result<Page<Title>> {
        self.log(format!("list {:?} {}", listing, page));
        if self.failing_pages.lock().unwrap().contains(&page) {
            return Err(anyhow!("page {} unavailable", page));
        }
        Ok(self
            .listing_pages
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .unwrap_or_else(|| Page::empty(page)))
    }

    async fn search(
        &self,
        kind: ContentKind,
        query: &str,
        page: u32,
    ) -> anyhow::Result<Page<Title>> {
        self.log(format!("search {} {} {}", kind.as_path(), query, page));
        if self.failing_queries.lock().unwrap().contains(query) {
            return Err(anyhow!("search for {} unavailable", query));
        }
        let results = self
            .search_by_query
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_else(|| self.search_results.lock().unwrap().clone());
        Ok(page_of(page, 1, results))
    }

    async fn discover_by_genres(
        &self,
        kind: ContentKind,
        genre_ids: &[u32],
    ) -> anyhow::Result<Page<Title>> {
        self.log(format!("discover {} {:?}", kind.as_path(), genre_ids));
        if self.fail_discover.load(Ordering::SeqCst) {
            return Err(anyhow!("discover unavailable"));
        }
        let results = self.discover_results.lock().unwrap().clone();
        Ok(page_of(1, 1, results))
    }

    async fn movie_detail(&self, id: TitleId) -> anyhow::Result<TitleDetail> {
        self.log(format!("movie_detail {}", id));
        Self::pause(&self.detail_delay, id).await;
        self.detail(ContentKind::Movie, id)
    }

    async fn tv_detail(&self, id: TitleId) -> anyhow::Result<TitleDetail> {
        self.log(format!("tv_detail {}", id));
        Self::pause(&self.detail_delay, id).await;
        self.detail(ContentKind::Tv, id)
    }

    async fn tv_seasons(&self, id: TitleId) -> anyhow::Result<Vec<Season>> {
        self.log(format!("tv_seasons {}", id));
        Ok(self
            .seasons
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn videos(&self, kind: ContentKind, id: TitleId) -> anyhow::Result<Vec<Video>> {
        self.log(format!("videos {} {}", kind.as_path(), id));
        Self::pause(&self.video_delay, id).await;
        Ok(self
            .videos
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn movie_genres(&self) -> anyhow::Result<Vec<Genre>> {
        Ok(self.genres.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct FakeStore {
    next_id: AtomicU64,
    pub users: Mutex<Vec<UserRecord>>,
    pub purchases: Mutex<Vec<Purchase>>,
    pub interactions: Mutex<Vec<Interaction>>,
    pub fail_writes: AtomicBool,
    pub fail_reads: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub purchase_delay: Mutex<Option<Duration>>,
}

impl FakeStore {
    fn id(&self) -> String {
        (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn check(&self, flag: &AtomicBool, op: &str) -> anyhow::Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(anyhow!("{} failed: store unavailable", op));
        }
        Ok(())
    }

    pub fn seed_purchase(&self, purchase: Purchase) {
        self.purchases.lock().unwrap().push(purchase);
    }

    pub fn purchase_count(&self) -> usize {
        self.purchases.lock().unwrap().len()
    }

    pub fn interaction_count(&self) -> usize {
        self.interactions.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl StoreApi for FakeStore {
    async fn create_user(&self, user: &NewUserRecord) -> anyhow::Result<UserRecord> {
        self.check(&self.fail_writes, "create user")?;
        let record = UserRecord {
            id: self.id(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            password_salt: user.password_salt.clone(),
            role: user.role.clone(),
        };
        self.users.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn find_users_by_email(&self, email: &str) -> anyhow::Result<Vec<UserRecord>> {
        self.check(&self.fail_reads, "find users")?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.email == email)
            .cloned()
            .collect())
    }

    async fn delete_user(&self, id: &str) -> anyhow::Result<()> {
        self.check(&self.fail_deletes, "delete user")?;
        self.users.lock().unwrap().retain(|u| u.id != id);
        Ok(())
    }

    async fn create_purchase(&self, purchase: &NewPurchase) -> anyhow::Result<Purchase> {
        let delay = *self.purchase_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check(&self.fail_writes, "create purchase")?;
        let record = Purchase {
            id: self.id(),
            user_id: purchase.user_id.clone(),
            title_id: purchase.title_id,
            title_name: purchase.title_name.clone(),
            purchased_at: purchase.purchased_at,
            price: purchase.price,
            status: purchase.status,
            kind: purchase.kind,
            season_number: purchase.season_number,
            season_name: purchase.season_name.clone(),
        };
        self.purchases.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn list_purchases(&self, user_id: &str) -> anyhow::Result<Vec<Purchase>> {
        self.check(&self.fail_reads, "list purchases")?;
        Ok(self
            .purchases
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_purchase(&self, id: &str) -> anyhow::Result<()> {
        self.check(&self.fail_deletes, "delete purchase")?;
        self.purchases.lock().unwrap().retain(|p| p.id != id);
        Ok(())
    }

    async fn create_interaction(
        &self,
        interaction: &NewInteraction,
    ) -> anyhow::Result<Interaction> {
        self.check(&self.fail_writes, "create interaction")?;
        let record = Interaction {
            id: self.id(),
            user_id: interaction.user_id.clone(),
            title_id: interaction.title_id,
            title_name: interaction.title_name.clone(),
            kind: interaction.kind,
            recorded_at: interaction.recorded_at,
            genre_ids: interaction.genre_ids.clone(),
            content_kind: interaction.content_kind,
        };
        self.interactions.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn list_interactions(&self, user_id: &str) -> anyhow::Result<Vec<Interaction>> {
        self.check(&self.fail_reads, "list interactions")?;
        Ok(self
            .interactions
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_interaction(&self, id: &str) -> anyhow::Result<()> {
        self.check(&self.fail_deletes, "delete interaction")?;
        self.interactions.lock().unwrap().retain(|i| i.id != id);
        Ok(())
    }
}
