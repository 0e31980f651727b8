use serde_json::Value;
use tracing::debug;

use crate::config::RemoteConfig;
use crate::models::{
    BrowseItem, BrowseList, EpisodesResponse, ItemType, ReleaseFeedResponse, ReleaseRow,
    SearchGroup, SearchResponse, SearchResultList,
};
use crate::transport::FetchRequest;
use crate::utils::catalog_text;
use crate::RemoteError;

pub const SEARCH_HOST: &str = "unogsng.p.rapidapi.com";
pub const FEED_HOST: &str = "unogs-unogs-v1.p.rapidapi.com";
pub const USER_PLAYLISTS_ID: &str = "user";
pub const RECENT_PLAYLIST_ID: &str = "adb_recent";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    #[default]
    All,
    Movies,
    Shows,
}

impl SearchScope {
    /// Read a free-form scope such as `"movies"`, `"shows"` or `"movies,shows"`.
    pub fn from_param(param: &str) -> Self {
        match (param.contains("movies"), param.contains("shows")) {
            (true, false) => SearchScope::Movies,
            (false, true) => SearchScope::Shows,
            _ => SearchScope::All,
        }
    }

    fn type_param(self) -> Option<&'static str> {
        match self {
            SearchScope::All => None,
            SearchScope::Movies => Some("movies"),
            SearchScope::Shows => Some("series"),
        }
    }
}

/// Where a playlist's items come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistSource {
    /// Device history, resolved by the scrape pipeline
    History,
    /// `/search` filtered by genre list and content type
    Search {
        genres: Option<&'static str>,
        content_type: &'static str,
    },
    /// `/api.cgi` feed, `q=get:<feed>:<country>`
    Feed { feed: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSpec {
    pub id: String,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub image: &'static str,
    pub source: PlaylistSource,
}

/// Resolve a playlist id. Unknown ids search series with no genre filter.
pub fn playlist_spec(id: &str) -> PlaylistSpec {
    let (title, subtitle, image, source) = match id {
        RECENT_PLAYLIST_ID => (
            "Recently Viewed",
            "",
            "qrc:/images/netflix_recent.png",
            PlaylistSource::History,
        ),
        "sch_comedy" => (
            "Latest Comedy",
            "Latest comedy releases",
            "qrc:/images/netflix_comedy.png",
            PlaylistSource::Search {
                genres: Some("1009,1402,2700,3903,4426,4906"),
                content_type: "series",
            },
        ),
        "sch_standup" => (
            "Latest Stand-up",
            "Latest stand-up releases",
            "qrc:/images/netflix_standup.png",
            PlaylistSource::Search {
                genres: Some("10778"),
                content_type: "series",
            },
        ),
        "sch_drama" => (
            "Latest Drama",
            "Latest drama releases",
            "qrc:/images/netflix_drama.png",
            PlaylistSource::Search {
                genres: Some("5763,2748,3179,3682,3916,3947"),
                content_type: "series",
            },
        ),
        "sch_action" => (
            "Latest Action",
            "Latest action releases",
            "qrc:/images/netflix_action.png",
            PlaylistSource::Search {
                genres: Some("899,1568,1492,1694,3327,3916"),
                content_type: "series",
            },
        ),
        "sch_movies" => (
            "Latest Movies",
            "Latest movies",
            "qrc:/images/netflix_movies.png",
            PlaylistSource::Search {
                genres: None,
                content_type: "movie",
            },
        ),
        "cgi_release" => (
            "Latest Releases",
            "Latest releases",
            "qrc:/images/netflix_releases.png",
            PlaylistSource::Feed { feed: "new14" },
        ),
        "cgi_season" => (
            "New Seasons",
            "Latest new seasons added",
            "qrc:/images/netflix_seasons.png",
            PlaylistSource::Feed { feed: "seasons14" },
        ),
        "cgi_last" => (
            "Last Chance",
            "Last chance to watch",
            "qrc:/images/netflix_lastchance.png",
            PlaylistSource::Feed { feed: "exp" },
        ),
        _ => (
            "",
            "",
            "",
            PlaylistSource::Search {
                genres: Some(""),
                content_type: "series",
            },
        ),
    };
    PlaylistSpec {
        id: id.to_string(),
        title,
        subtitle,
        image,
        source,
    }
}

const USER_PLAYLISTS: [(&str, &str, &str, &str); 9] = [
    ("adb_recent", "Recently Viewed", "Recently viewed shows", "qrc:/images/netflix_recent.png"),
    ("cgi_release", "New Releases", "New Releases in your country", "qrc:/images/netflix_releases.png"),
    ("cgi_season", "New Seasons", "New Releases in your country", "qrc:/images/netflix_seasons.png"),
    ("cgi_last", "Last Chance", "Last chance to view these shows", "qrc:/images/netflix_lastchance.png"),
    ("sch_comedy", "Recent Comedy", "Recent comedy releases", "qrc:/images/netflix_comedy.png"),
    ("sch_standup", "Recent Stand-up", "Recent stand-up releases", "qrc:/images/netflix_standup.png"),
    ("sch_drama", "Recent Drama", "Recent drama releases", "qrc:/images/netflix_drama.png"),
    ("sch_action", "Recent Thriller", "Recent thriller releases", "qrc:/images/netflix_thriller.png"),
    ("sch_movies", "Recent Movies", "Recent movie releases", "qrc:/images/netflix_movies.png"),
];

/// The static menu of predefined playlists. No network call.
pub fn user_playlists() -> BrowseList {
    let mut list = BrowseList::new(
        "na",
        "User Playlists",
        "Pre-defined user playlists",
        ItemType::Playlist,
        "",
    );
    for (id, title, subtitle, image) in USER_PLAYLISTS {
        list.push(BrowseItem::new(id, title, subtitle, ItemType::Playlist, image));
    }
    list
}

/// Builds authenticated catalog requests for one configured region.
#[derive(Debug, Clone)]
pub struct CatalogApi {
    token: String,
    country_code: String,
    country_id: String,
}

impl CatalogApi {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            token: config.api_token.clone(),
            country_code: config.netflix_country_code.clone(),
            country_id: config.country_id(),
        }
    }

    pub fn country_id(&self) -> &str {
        &self.country_id
    }

    fn request(&self, host: &str, path: &str, params: &[(&str, &str)]) -> Result<FetchRequest, RemoteError> {
        let query = serde_urlencoded::to_string(params)?;
        let url = format!("https://{}{}?{}", host, path, query);
        let rapidapi_host = reqwest::Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(ToString::to_string))
            .unwrap_or_else(|| host.to_string());
        debug!(url = %url, "Built catalog request");
        Ok(FetchRequest::new(url)
            .header("Accept", "application/json")
            .header("x-rapidapi-host", rapidapi_host)
            .header("x-rapidapi-key", self.token.clone())
            .header("useQueryString", "true"))
    }

    pub fn search_request(&self, query: &str, scope: SearchScope) -> Result<FetchRequest, RemoteError> {
        let mut params: Vec<(&str, &str)> = vec![("query", query)];
        if let Some(kind) = scope.type_param() {
            params.push(("type", kind));
        }
        params.extend([
            ("country_andorunique", "and"),
            ("countrylist", self.country_id.as_str()),
            ("orderby", "date"),
            ("limit", "30"),
        ]);
        self.request(SEARCH_HOST, "/search", &params)
    }

    pub fn episodes_request(&self, title_id: &str) -> Result<FetchRequest, RemoteError> {
        self.request(SEARCH_HOST, "/episodes", &[("netflixid", title_id)])
    }

    /// Request for a catalog-backed playlist; `None` for history.
    pub fn playlist_request(&self, spec: &PlaylistSpec) -> Result<Option<FetchRequest>, RemoteError> {
        match &spec.source {
            PlaylistSource::History => Ok(None),
            PlaylistSource::Search {
                genres,
                content_type,
            } => {
                let mut params: Vec<(&str, &str)> = vec![
                    ("country_andorunique", "and"),
                    ("countrylist", self.country_id.as_str()),
                ];
                if let Some(genres) = genres {
                    params.push(("genrelist", *genres));
                }
                params.extend([("type", *content_type), ("orderby", "date"), ("limit", "30")]);
                self.request(SEARCH_HOST, "/search", &params).map(Some)
            }
            PlaylistSource::Feed { feed } => {
                let q = format!("get:{}:{}", feed, self.country_code);
                self.request(
                    FEED_HOST,
                    "/api.cgi",
                    &[("q", q.as_str()), ("p", "1"), ("t", "ns"), ("st", "adv")],
                )
                .map(Some)
            }
        }
    }
}

/// Group `/search` results into movies and shows.
pub fn search_results(document: Value) -> Result<SearchResultList, RemoteError> {
    let response: SearchResponse = serde_json::from_value(document)?;
    let mut movies = Vec::new();
    let mut shows = Vec::new();
    for title in response.results {
        let Some(kind) = ItemType::from_vtype(&title.vtype) else {
            continue;
        };
        let item = BrowseItem::new(
            title.nfid,
            catalog_text::title_with_year(&title.title, &title.year),
            catalog_text::subtitle(&title.synopsis),
            kind,
            title.img,
        );
        match kind {
            ItemType::Movie => movies.push(item),
            _ => shows.push(item),
        }
    }
    Ok(SearchResultList {
        groups: vec![
            SearchGroup {
                category: "movies".to_string(),
                items: movies,
            },
            SearchGroup {
                category: "shows".to_string(),
                items: shows,
            },
        ],
    })
}

/// Flatten every season of an `/episodes` response into one list.
pub fn album_list(document: Value) -> Result<BrowseList, RemoteError> {
    let response: EpisodesResponse = serde_json::from_value(document)?;
    let first = response.data.iter().flat_map(|s| s.episodes.iter()).next();
    let mut album = BrowseList::new(
        first.map(|e| e.epid.clone()).unwrap_or_default(),
        "",
        "",
        ItemType::Episode,
        first.map(|e| e.img.clone()).unwrap_or_default(),
    );
    for episode in response.data.iter().flat_map(|s| s.episodes.iter()) {
        album.push(BrowseItem::new(
            episode.epid.clone(),
            format!(
                "{}{}",
                catalog_text::episode_prefix(episode.seasnum, episode.epnum),
                catalog_text::unescape(&episode.title)
            ),
            catalog_text::subtitle(&episode.synopsis),
            ItemType::Episode,
            episode.img.clone(),
        ));
    }
    Ok(album)
}

/// Build a playlist from either a `/search` or an `/api.cgi` response.
pub fn playlist_list(spec: &PlaylistSpec, document: Value) -> Result<BrowseList, RemoteError> {
    let mut list = BrowseList::new(
        spec.id.clone(),
        spec.title,
        spec.subtitle,
        ItemType::Episode,
        spec.image,
    )
    .with_header_commands(&[]);

    match spec.source {
        PlaylistSource::Feed { .. } => {
            let feed: ReleaseFeedResponse = serde_json::from_value(document)?;
            for row in feed.items.iter().map(|r| ReleaseRow::from_row(r)) {
                list.push(BrowseItem::new(
                    format!("title/{}", row.id),
                    catalog_text::title_with_year(&row.title, &row.year),
                    catalog_text::subtitle(&row.synopsis),
                    ItemType::Episode,
                    row.image,
                ));
            }
        }
        _ => {
            let response: SearchResponse = serde_json::from_value(document)?;
            for title in response.results {
                list.push(BrowseItem::new(
                    title.nfid,
                    catalog_text::title_with_year(&title.title, &title.year),
                    catalog_text::subtitle(&title.synopsis),
                    ItemType::from_vtype(&title.vtype).unwrap_or(ItemType::Episode),
                    title.img,
                ));
            }
        }
    }
    Ok(list)
}
