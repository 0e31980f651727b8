mod adb;
pub use adb::AdbClient;
pub mod catalog;
pub use catalog::{CatalogApi, PlaylistSource, PlaylistSpec, SearchScope};
mod client;
pub use client::{handshake_succeeded, FireTvClient};
mod codec;
pub use codec::{AdbCodec, AdbReply};
mod commands;
pub use commands::{deep_link, get_command_name, view_intent_command, KeyCode, RemoteCommand};
mod config;
pub use config::{parse_address_list, CountryTable, RemoteConfig, FALLBACK_COUNTRY_ID};
pub mod correlator;
pub use correlator::{PendingResponse, ResponseCorrelator, ResponseFamily, ResponseRouter};
mod error;
pub use error::RemoteError;
mod events;
pub use events::RemoteEvent;
mod models;
pub use models::{
    commands as command_set, BrowseItem, BrowseList, CatalogTitle, Episode, EpisodesResponse,
    ItemType, LandingMetadata, NowPlaying, ReleaseFeedResponse, ReleaseRow, SearchGroup,
    SearchResponse, SearchResultList, Season, SetOnce, Speaker, SpeakerList,
};
pub mod scrape;
pub use scrape::{HistoryEntry, HistoryQueue, HistoryStep, ScrapePipeline};
mod settings;
pub use settings::{Settings, SETTINGS};
mod state;
pub use state::{ConnectionState, Session};
mod transport;
pub use transport::{DeviceChannel, FetchRequest, HttpFetcher, ReqwestFetcher};
mod utils;
pub use utils::{catalog_text, extract_metadata, parsing};
