use crate::models::{BrowseList, NowPlaying, SearchResultList, SpeakerList};
use crate::state::ConnectionState;

// Everything the client pushes to the presentation sink
#[derive(Debug, Clone)]
pub enum RemoteEvent {
    BrowseList(BrowseList),
    SearchResults(SearchResultList),
    SpeakerList(SpeakerList),
    NowPlaying(NowPlaying),
    PlayerCleared,
    ConnectionChanged(ConnectionState),
    Notification { error: bool, message: String },
}

impl RemoteEvent {
    // Get the name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            RemoteEvent::BrowseList(_) => "browseList",
            RemoteEvent::SearchResults(_) => "searchResults",
            RemoteEvent::SpeakerList(_) => "speakerList",
            RemoteEvent::NowPlaying(_) => "nowPlaying",
            RemoteEvent::PlayerCleared => "playerCleared",
            RemoteEvent::ConnectionChanged(_) => "connectionChanged",
            RemoteEvent::Notification { .. } => "notification",
        }
    }

    /// If this event carries a browse list, returns it
    pub fn browse_list(&self) -> Option<&BrowseList> {
        match self {
            RemoteEvent::BrowseList(list) => Some(list),
            _ => None,
        }
    }
}
