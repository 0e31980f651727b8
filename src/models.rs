use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::collections::BTreeSet;

use crate::utils::parsing::{lenient_string, lenient_u32};

// --- Presentation models pushed to the sink ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    Movie,
    Show,
    Episode,
    Playlist,
    Device,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Movie => "movie",
            ItemType::Show => "show",
            ItemType::Episode => "episode",
            ItemType::Playlist => "playlist",
            ItemType::Device => "device",
        }
    }

    /// Map the catalog's `vtype` field. Unknown kinds yield `None`.
    pub fn from_vtype(vtype: &str) -> Option<Self> {
        match vtype {
            "series" => Some(ItemType::Show),
            "movie" => Some(ItemType::Movie),
            _ => None,
        }
    }
}

/// Commands a presentation layer may offer for an item.
pub fn commands(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseItem {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub item_type: ItemType,
    pub image_url: String,
    pub allowed_commands: BTreeSet<String>,
}

impl BrowseItem {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        subtitle: impl Into<String>,
        item_type: ItemType,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subtitle: subtitle.into(),
            item_type,
            image_url: image_url.into(),
            allowed_commands: commands(&["PLAY"]),
        }
    }

    pub fn with_commands(mut self, names: &[&str]) -> Self {
        self.allowed_commands = commands(names);
        self
    }
}

/// A header field that accepts exactly one value. Later writes are refused
/// and reported through the return value of [`SetOnce::set`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOnce<T>(OnceCell<T>);

impl<T> SetOnce<T> {
    pub fn new() -> Self {
        Self(OnceCell::new())
    }

    pub fn with(value: T) -> Self {
        Self(OnceCell::with_value(value))
    }

    /// Store `value` if nothing is stored yet. Returns true if it was stored.
    pub fn set(&self, value: T) -> bool {
        self.0.set(value).is_ok()
    }

    pub fn get(&self) -> Option<&T> {
        self.0.get()
    }

    pub fn is_set(&self) -> bool {
        self.0.get().is_some()
    }
}

/// Ordered list of browsable items. The header fields describe the list as a
/// whole; `title` and `image_url` are set-once so the first writer wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseList {
    pub id: String,
    pub title: SetOnce<String>,
    pub subtitle: String,
    pub item_type: ItemType,
    pub image_url: SetOnce<String>,
    pub allowed_commands: BTreeSet<String>,
    pub items: Vec<BrowseItem>,
}

impl BrowseList {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        subtitle: impl Into<String>,
        item_type: ItemType,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: SetOnce::with(title.into()),
            subtitle: subtitle.into(),
            item_type,
            image_url: SetOnce::with(image_url.into()),
            allowed_commands: commands(&["PLAY"]),
            items: Vec::new(),
        }
    }

    /// A list whose title and image are filled in later by the first response.
    pub fn with_open_header(
        id: impl Into<String>,
        subtitle: impl Into<String>,
        item_type: ItemType,
    ) -> Self {
        Self {
            id: id.into(),
            title: SetOnce::new(),
            subtitle: subtitle.into(),
            item_type,
            image_url: SetOnce::new(),
            allowed_commands: commands(&["PLAY"]),
            items: Vec::new(),
        }
    }

    pub fn with_header_commands(mut self, names: &[&str]) -> Self {
        self.allowed_commands = commands(names);
        self
    }

    pub fn title(&self) -> &str {
        self.title.get().map(String::as_str).unwrap_or("")
    }

    pub fn image_url(&self) -> &str {
        self.image_url.get().map(String::as_str).unwrap_or("")
    }

    pub fn push(&mut self, item: BrowseItem) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchGroup {
    pub category: String,
    pub items: Vec<BrowseItem>,
}

/// Search results grouped by category (movies, shows).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchResultList {
    pub groups: Vec<SearchGroup>,
}

impl SearchResultList {
    pub fn group(&self, category: &str) -> Option<&SearchGroup> {
        self.groups.iter().find(|g| g.category == category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Speaker {
    pub id: String,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub allowed_commands: BTreeSet<String>,
}

/// Configured devices with the active one marked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerList {
    pub id: String,
    pub name: String,
    pub description: String,
    pub speakers: Vec<Speaker>,
}

impl SpeakerList {
    pub fn build(addresses: &[String], active: Option<&str>) -> Self {
        let speakers = addresses
            .iter()
            .map(|address| {
                let is_active = active == Some(address.as_str());
                Speaker {
                    id: address.clone(),
                    name: address.clone(),
                    description: if is_active {
                        "Active connection".to_string()
                    } else {
                        "Not connected".to_string()
                    },
                    active: is_active,
                    allowed_commands: if is_active {
                        BTreeSet::new()
                    } else {
                        commands(&["CONNECT"])
                    },
                }
            })
            .collect();
        Self {
            id: "root".to_string(),
            name: "Devices".to_string(),
            description: "User-defined devices".to_string(),
            speakers,
        }
    }

    pub fn active(&self) -> Option<&Speaker> {
        self.speakers.iter().find(|s| s.active)
    }
}

/// What the polling tick reports while the app is in front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub source: String,
    pub focused_window: String,
    /// True when the tick refreshed title/artwork after a possible show change.
    pub show_refreshed: bool,
}

// --- Catalog API payloads ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<CatalogTitle>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogTitle {
    #[serde(deserialize_with = "lenient_string")]
    pub nfid: String,
    #[serde(deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub year: String,
    #[serde(deserialize_with = "lenient_string")]
    pub synopsis: String,
    #[serde(deserialize_with = "lenient_string")]
    pub vtype: String,
    #[serde(deserialize_with = "lenient_string")]
    pub img: String,
}

/// `/episodes` answers with a bare array, normalised under `data`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EpisodesResponse {
    #[serde(default)]
    pub data: Vec<Season>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Season {
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Episode {
    #[serde(deserialize_with = "lenient_string")]
    pub epid: String,
    #[serde(deserialize_with = "lenient_u32")]
    pub seasnum: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub epnum: u32,
    #[serde(deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub synopsis: String,
    #[serde(deserialize_with = "lenient_string")]
    pub img: String,
}

/// `/api.cgi` feed: each row is positional (id, title, image, synopsis, ..., year).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseFeedResponse {
    #[serde(default, rename = "ITEMS")]
    pub items: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRow {
    pub id: String,
    pub title: String,
    pub image: String,
    pub synopsis: String,
    pub year: String,
}

impl ReleaseRow {
    pub fn from_row(row: &[serde_json::Value]) -> Self {
        let cell = |idx: usize| -> String {
            match row.get(idx) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            }
        };
        Self {
            id: cell(0),
            title: cell(1),
            image: cell(2),
            synopsis: cell(3),
            year: cell(7),
        }
    }
}

/// Metadata block embedded in a title's landing page (`@` already stripped).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LandingMetadata {
    #[serde(rename = "type", deserialize_with = "lenient_string")]
    pub kind: String,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(deserialize_with = "lenient_string")]
    pub image: String,
    #[serde(deserialize_with = "lenient_string")]
    pub url: String,
}

impl LandingMetadata {
    pub fn item_type(&self) -> ItemType {
        if self.kind == "TVSeries" {
            ItemType::Show
        } else {
            ItemType::Movie
        }
    }

    /// `title/<id>` taken from the canonical url, if present.
    pub fn title_path(&self) -> Option<String> {
        self.url
            .find("title/")
            .map(|idx| self.url[idx..].trim_end_matches('/').to_string())
    }
}
