use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::models::{
    CastMember, ContentKind, Creator, Genre, Page, Season, Title, TitleDetail, TitleId, TitleWire,
    Video,
};

const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
const VIDEO_LANGUAGE: &str = "en-US";
const MAX_CAST: usize = 15;

/// Named paginated listings offered by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    PopularMovies,
    TopRatedMovies,
    TrendingMovies,
    PopularTv,
    TopRatedTv,
}

impl Listing {
    pub fn kind(&self) -> ContentKind {
        match self {
            Listing::PopularMovies | Listing::TopRatedMovies | Listing::TrendingMovies => {
                ContentKind::Movie
            }
            Listing::PopularTv | Listing::TopRatedTv => ContentKind::Tv,
        }
    }

    fn path_and_params(&self) -> (&'static str, &'static str) {
        match self {
            Listing::PopularMovies => ("/discover/movie", "&sort_by=popularity.desc"),
            Listing::TopRatedMovies => ("/movie/top_rated", ""),
            Listing::TrendingMovies => ("/trending/movie/week", ""),
            Listing::PopularTv => (
                "/discover/tv",
                "&sort_by=popularity.desc&vote_count.gte=50",
            ),
            Listing::TopRatedTv => (
                "/discover/tv",
                "&sort_by=vote_average.desc&vote_count.gte=100",
            ),
        }
    }
}

#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn list(&self, listing: Listing, page: u32) -> Result<Page<Title>>;
    async fn search(&self, kind: ContentKind, query: &str, page: u32) -> Result<Page<Title>>;
    async fn discover_by_genres(&self, kind: ContentKind, genre_ids: &[u32])
        -> Result<Page<Title>>;
    async fn movie_detail(&self, id: TitleId) -> Result<TitleDetail>;
    async fn tv_detail(&self, id: TitleId) -> Result<TitleDetail>;
    async fn tv_seasons(&self, id: TitleId) -> Result<Vec<Season>>;
    async fn videos(&self, kind: ContentKind, id: TitleId) -> Result<Vec<Video>>;
    async fn movie_genres(&self) -> Result<Vec<Genre>>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    base_url: String,
    language: String,
}

impl TmdbClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        language: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let user_agent = format!("labtv/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            language: language.into(),
        })
    }

    fn url(&self, path: &str, language: &str, extra: &str) -> String {
        format!(
            "{}{path}?api_key={}&language={}{extra}",
            self.base_url,
            self.api_key,
            urlencoding::encode(language)
        )
    }

    async fn fetch_page(&self, url: &str, hint: ContentKind) -> Result<Page<Title>> {
        let page: Page<TitleWire> = self.get_json(url).await?;
        Ok(page.map(|w| w.into_title(Some(hint))))
    }

    async fn fetch_detail(&self, kind: ContentKind, id: TitleId) -> Result<TitleDetail> {
        let url = self.url(
            &format!("/{}/{id}", kind.as_path()),
            &self.language,
            "&append_to_response=credits,similar",
        );
        let detail: DetailResponse = self.get_json(&url).await?;
        Ok(detail.into_detail(kind))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        debug!(path = %redact(url), "TMDB request");
        let res = self
            .client
            .get(url)
            .send()
            .await
            .context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!("{} -> {} {}", redact(url), status, text));
        }
        let parsed: T = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(parsed)
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn list(&self, listing: Listing, page: u32) -> Result<Page<Title>> {
        let (path, params) = listing.path_and_params();
        let url = self.url(path, &self.language, &format!("&page={}{params}", page.max(1)));
        self.fetch_page(&url, listing.kind()).await
    }

    async fn search(&self, kind: ContentKind, query: &str, page: u32) -> Result<Page<Title>> {
        let url = self.url(
            &format!("/search/{}", kind.as_path()),
            &self.language,
            &format!("&query={}&page={}", urlencoding::encode(query), page.max(1)),
        );
        self.fetch_page(&url, kind).await
    }

    async fn discover_by_genres(
        &self,
        kind: ContentKind,
        genre_ids: &[u32],
    ) -> Result<Page<Title>> {
        let joined = genre_ids
            .iter()
            .map(|g| g.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let url = self.url(
            &format!("/discover/{}", kind.as_path()),
            &self.language,
            &format!(
                "&sort_by=popularity.desc&with_genres={}&page=1",
                urlencoding::encode(&joined)
            ),
        );
        self.fetch_page(&url, kind).await
    }

    async fn movie_detail(&self, id: TitleId) -> Result<TitleDetail> {
        self.fetch_detail(ContentKind::Movie, id).await
    }

    async fn tv_detail(&self, id: TitleId) -> Result<TitleDetail> {
        self.fetch_detail(ContentKind::Tv, id).await
    }

    async fn tv_seasons(&self, id: TitleId) -> Result<Vec<Season>> {
        #[derive(Deserialize)]
        struct SeasonsResponse {
            #[serde(default)]
            seasons: Vec<Season>,
        }

        let url = self.url(&format!("/tv/{id}"), &self.language, "");
        let data: SeasonsResponse = self.get_json(&url).await?;
        Ok(data.seasons)
    }

    async fn videos(&self, kind: ContentKind, id: TitleId) -> Result<Vec<Video>> {
        #[derive(Deserialize)]
        struct VideoResponse {
            #[serde(default)]
            results: Vec<Video>,
        }

        let url = self.url(
            &format!("/{}/{id}/videos", kind.as_path()),
            VIDEO_LANGUAGE,
            "",
        );
        let data: VideoResponse = self.get_json(&url).await?;
        Ok(data.results)
    }

    async fn movie_genres(&self) -> Result<Vec<Genre>> {
        #[derive(Deserialize)]
        struct GenreResponse {
            #[serde(default)]
            genres: Vec<Genre>,
        }

        let url = self.url("/genre/movie/list", &self.language, "");
        let data: GenreResponse = self.get_json(&url).await?;
        Ok(data.genres)
    }
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    #[serde(flatten)]
    base: TitleWire,
    #[serde(default)]
    genres: Vec<Genre>,
    #[serde(default)]
    tagline: Option<String>,
    #[serde(default)]
    runtime: Option<u32>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    credits: Option<Credits>,
    #[serde(default)]
    similar: Option<Page<TitleWire>>,
    #[serde(default)]
    created_by: Vec<Creator>,
    #[serde(default)]
    number_of_seasons: Option<u32>,
    #[serde(default)]
    number_of_episodes: Option<u32>,
    #[serde(default)]
    last_air_date: Option<String>,
    #[serde(default)]
    seasons: Vec<Season>,
}

#[derive(Debug, Default, Deserialize)]
struct Credits {
    #[serde(default)]
    cast: Vec<CastMember>,
    #[serde(default)]
    crew: Vec<CrewMember>,
}

#[derive(Debug, Deserialize)]
struct CrewMember {
    job: Option<String>,
    name: String,
}

impl DetailResponse {
    fn into_detail(self, kind: ContentKind) -> TitleDetail {
        let credits = self.credits.unwrap_or_default();
        let directors = match kind {
            ContentKind::Tv => self.created_by.iter().map(|c| c.name.clone()).collect(),
            ContentKind::Movie => credits
                .crew
                .into_iter()
                .filter(|c| matches!(c.job.as_deref(), Some("Director")))
                .map(|c| c.name)
                .collect(),
        };
        let similar = self
            .similar
            .map(|p| {
                p.results
                    .into_iter()
                    .map(|w| w.into_title(Some(kind)))
                    .collect()
            })
            .unwrap_or_default();

        // Detail payloads carry `genres` instead of `genre_ids`.
        let mut base = self.base;
        if base.genre_ids.as_ref().map_or(true, |g| g.is_empty()) {
            base.genre_ids = Some(self.genres.iter().map(|g| g.id).collect());
        }
        // The endpoint decides the kind here, whatever the payload says.
        base.media_type = Some(kind.as_path().to_string());
        let mut title = base.into_title(Some(kind));
        title.kind = kind;

        TitleDetail {
            title,
            genres: self.genres,
            tagline: self.tagline.filter(|t| !t.is_empty()),
            runtime: self.runtime,
            status: self.status,
            cast: credits.cast.into_iter().take(MAX_CAST).collect(),
            directors,
            similar,
            created_by: self.created_by,
            number_of_seasons: self.number_of_seasons,
            number_of_episodes: self.number_of_episodes,
            last_air_date: self.last_air_date.filter(|d| !d.is_empty()),
            seasons: self.seasons,
        }
    }
}

/// First official YouTube trailer, if any.
pub fn select_trailer(videos: &[Video]) -> Option<&Video> {
    videos.iter().find(|v| {
        v.video_type == "Trailer" && v.official && v.site.eq_ignore_ascii_case("YouTube")
    })
}

pub fn trailer_embed_url(key: &str) -> String {
    format!(
        "https://www.youtube-nocookie.com/embed/{key}?rel=0&modestbranding=1&playsinline=1&autoplay=0&controls=1&fs=1"
    )
}

pub fn poster_url(path: Option<&str>) -> Option<String> {
    image_url(path, "w500")
}

pub fn backdrop_url(path: Option<&str>) -> Option<String> {
    image_url(path, "original")
}

pub fn image_url(path: Option<&str>, size: &str) -> Option<String> {
    path.filter(|p| !p.is_empty())
        .map(|p| format!("{IMAGE_BASE}/{size}{p}"))
}

fn redact(url: &str) -> String {
    match url.find("api_key=") {
        Some(start) => {
            let rest = &url[start..];
            let end = rest.find('&').map(|i| start + i).unwrap_or(url.len());
            format!("{}api_key=***{}", &url[..start], &url[end..])
        }
        None => url.to_string(),
    }
}
