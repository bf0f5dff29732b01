use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Catalog identifier of a movie or TV show.
pub type TitleId = u32;

/// Identifier assigned by the remote store. The mock backend hands out either
/// numbers or strings, so both are normalized to a string.
pub type RecordId = String;

pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Movie,
    Tv,
}

impl ContentKind {
    /// Decides the kind of a raw catalog record. A non-empty first-air-date wins
    /// over an explicit tag, which wins over the endpoint the record came from.
    pub fn classify(
        first_air_date: Option<&str>,
        tag: Option<&str>,
        hint: Option<ContentKind>,
    ) -> Self {
        if first_air_date.is_some_and(|d| !d.trim().is_empty()) {
            return ContentKind::Tv;
        }
        match tag.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            Some("tv") => return ContentKind::Tv,
            Some("movie") => return ContentKind::Movie,
            _ => {}
        }
        hint.unwrap_or_default()
    }

    pub fn as_path(&self) -> &'static str {
        match self {
            ContentKind::Movie => "movie",
            ContentKind::Tv => "tv",
        }
    }
}

/// A movie or TV show as listed by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "TitleWire")]
pub struct Title {
    pub id: TitleId,
    pub kind: ContentKind,
    pub name: String,
    pub original_name: Option<String>,
    pub overview: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: Option<String>,
    pub first_air_date: Option<String>,
    pub vote_average: f64,
    pub vote_count: u32,
    pub genre_ids: Vec<u32>,
    pub popularity: f64,
    pub original_language: Option<String>,
}

impl Title {
    pub fn has_genre(&self, genre_id: u32) -> bool {
        self.genre_ids.contains(&genre_id)
    }
}

/// Raw shape shared by catalog responses and titles posted back by the UI.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TitleWire {
    pub id: TitleId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<u32>,
    #[serde(default)]
    pub genre_ids: Option<Vec<u32>>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default, alias = "content_type", alias = "kind")]
    pub media_type: Option<String>,
}

impl TitleWire {
    pub(crate) fn into_title(self, hint: Option<ContentKind>) -> Title {
        let first_air_date = non_empty(self.first_air_date);
        let kind = ContentKind::classify(
            first_air_date.as_deref(),
            self.media_type.as_deref(),
            hint,
        );
        let name = non_empty(self.title)
            .or_else(|| non_empty(self.name))
            .unwrap_or_else(|| UNTITLED.to_string());

        Title {
            id: self.id,
            kind,
            name,
            original_name: non_empty(self.original_title).or_else(|| non_empty(self.original_name)),
            overview: self.overview.unwrap_or_default(),
            poster_path: non_empty(self.poster_path),
            backdrop_path: non_empty(self.backdrop_path),
            release_date: non_empty(self.release_date),
            first_air_date,
            vote_average: self.vote_average.unwrap_or(0.0),
            vote_count: self.vote_count.unwrap_or(0),
            genre_ids: self.genre_ids.unwrap_or_default(),
            popularity: self.popularity.unwrap_or(0.0),
            original_language: non_empty(self.original_language),
        }
    }
}

impl From<TitleWire> for Title {
    fn from(wire: TitleWire) -> Self {
        wire.into_title(None)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Genre {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CastMember {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Creator {
    pub id: u32,
    pub name: String,
}

/// Full record behind the detail view.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TitleDetail {
    #[serde(flatten)]
    pub title: Title,
    pub genres: Vec<Genre>,
    pub tagline: Option<String>,
    pub runtime: Option<u32>,
    pub status: Option<String>,
    pub cast: Vec<CastMember>,
    pub directors: Vec<String>,
    /// Similar titles as provided by the catalog itself.
    pub similar: Vec<Title>,
    pub created_by: Vec<Creator>,
    pub number_of_seasons: Option<u32>,
    pub number_of_episodes: Option<u32>,
    pub last_air_date: Option<String>,
    pub seasons: Vec<Season>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Season {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub season_number: u32,
    #[serde(default)]
    pub air_date: Option<String>,
    #[serde(default)]
    pub episode_count: u32,
    #[serde(default)]
    pub vote_average: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Video {
    pub key: String,
    #[serde(default)]
    pub name: String,
    pub site: String,
    #[serde(rename = "type")]
    pub video_type: String,
    #[serde(default)]
    pub official: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u32,
}

impl<T> Page<T> {
    pub fn empty(page: u32) -> Self {
        Self {
            page,
            results: Vec::new(),
            total_pages: 0,
            total_results: 0,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            page: self.page,
            results: self.results.into_iter().map(f).collect(),
            total_pages: self.total_pages,
            total_results: self.total_results,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    #[default]
    Completed,
    Pending,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseKind {
    #[default]
    Movie,
    Season,
}

/// A confirmed purchase as stored remotely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    #[serde(deserialize_with = "de_record_id")]
    pub id: RecordId,
    #[serde(default, deserialize_with = "de_record_id")]
    pub user_id: RecordId,
    #[serde(rename = "movieId")]
    pub title_id: TitleId,
    #[serde(rename = "movieTitle")]
    pub title_name: String,
    #[serde(rename = "purchaseDate")]
    pub purchased_at: DateTime<Utc>,
    pub price: f64,
    #[serde(default)]
    pub status: PurchaseStatus,
    #[serde(rename = "type", default)]
    pub kind: PurchaseKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_name: Option<String>,
}

/// Purchase payload before the store assigns an id.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewPurchase {
    pub user_id: RecordId,
    #[serde(rename = "movieId")]
    pub title_id: TitleId,
    #[serde(rename = "movieTitle")]
    pub title_name: String,
    #[serde(rename = "purchaseDate")]
    pub purchased_at: DateTime<Utc>,
    pub price: f64,
    pub status: PurchaseStatus,
    #[serde(rename = "type")]
    pub kind: PurchaseKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SubscriptionTier {
    #[default]
    #[serde(rename = "Free Trial")]
    FreeTrial,
    Standard,
    Premium,
}

/// The authenticated user as seen by the client. Carries no credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: RecordId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub tier: SubscriptionTier,
    pub subscribed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub user: User,
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

/// User record in the remote store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(deserialize_with = "de_record_id")]
    pub id: RecordId,
    #[serde(rename = "nome", default)]
    pub first_name: String,
    #[serde(rename = "cognome", default)]
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub password_hash: String,
    #[serde(default)]
    pub password_salt: String,
    #[serde(rename = "ruolo", default)]
    pub role: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewUserRecord {
    #[serde(rename = "nome")]
    pub first_name: String,
    #[serde(rename = "cognome")]
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    #[serde(rename = "ruolo")]
    pub role: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    #[default]
    Click,
    View,
    Purchase,
}

/// One logged user action against a title.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    #[serde(deserialize_with = "de_record_id")]
    pub id: RecordId,
    #[serde(rename = "clickedBy", deserialize_with = "de_record_id")]
    pub user_id: RecordId,
    #[serde(rename = "movieId")]
    pub title_id: TitleId,
    #[serde(rename = "title", default)]
    pub title_name: String,
    #[serde(rename = "interactionType", default)]
    pub kind: InteractionKind,
    #[serde(rename = "clickedAt")]
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
    #[serde(rename = "type", default)]
    pub content_kind: ContentKind,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewInteraction {
    #[serde(rename = "clickedBy")]
    pub user_id: RecordId,
    #[serde(rename = "movieId")]
    pub title_id: TitleId,
    #[serde(rename = "title")]
    pub title_name: String,
    #[serde(rename = "interactionType")]
    pub kind: InteractionKind,
    #[serde(rename = "clickedAt")]
    pub recorded_at: DateTime<Utc>,
    pub genre_ids: Vec<u32>,
    #[serde(rename = "type")]
    pub content_kind: ContentKind,
}

pub(crate) fn de_record_id<'de, D>(deserializer: D) -> Result<RecordId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}
