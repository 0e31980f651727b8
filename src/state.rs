use crate::config::RemoteConfig;

/// Reachability of the device over the command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
        }
    }
}

/// Per-integration session. Only the connection state machine flips
/// `connected` and `device_address`.
#[derive(Debug, Clone)]
pub struct Session {
    pub device_address: Option<String>,
    pub candidate_addresses: Vec<String>,
    pub connected: bool,
    pub api_token: String,
    pub api_region: String,
    /// Set by NEXT/PREVIOUS, consumed by the polling tick.
    pub show_changed: bool,
}

impl Session {
    pub(crate) fn new(config: &RemoteConfig) -> Self {
        Self {
            device_address: None,
            candidate_addresses: config.firetv_address_list.clone(),
            connected: false,
            api_token: config.api_token.clone(),
            api_region: config.netflix_country_code.clone(),
            show_changed: true,
        }
    }

    /// The remembered address, or the first configured candidate.
    pub(crate) fn target_address(&self) -> Option<String> {
        self.device_address
            .clone()
            .or_else(|| self.candidate_addresses.first().cloned())
    }
}
