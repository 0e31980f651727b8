use futures::FutureExt;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch, Mutex as AsyncMutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};

use crate::adb::AdbClient;
use crate::catalog::{
    self, CatalogApi, PlaylistSource, SearchScope, RECENT_PLAYLIST_ID, USER_PLAYLISTS_ID,
};
use crate::commands::{view_intent_command, KeyCode, RemoteCommand};
use crate::config::RemoteConfig;
use crate::correlator::{ResponseFamily, ResponseRouter};
use crate::events::RemoteEvent;
use crate::models::{BrowseList, NowPlaying, SearchResultList, SpeakerList};
use crate::scrape::{HistoryQueue, HistoryStep, ScrapePipeline, HISTORY_DUMP_COMMAND};
use crate::settings::{Settings, SETTINGS};
use crate::state::{ConnectionState, Session};
use crate::transport::{DeviceChannel, FetchRequest, HttpFetcher, ReqwestFetcher};
use crate::RemoteError;

/// Substrings in a connect reply that mean the handshake failed.
const HANDSHAKE_FAILURE_MARKERS: [&str; 2] = ["fail", "unable to connect"];
const CONNECT_FAILED_NOTICE: &str = "Cannot connect to device. Ensure ADB Debugging is enabled.";
const FOCUS_COMMAND: &str = "dumpsys window windows | grep mCurrentFocus";
const POWER_COMMAND: &str = "dumpsys power | grep 'Display Power'";
const LAUNCH_COMMAND: &str = "am start -n com.netflix.ninja/com.netflix.ninja.MainActivity";
const APP_FOCUS_HINT: &str = "netflix";
const SOURCE_NAME: &str = "Fire TV";

const SUPPORTED_FEATURES: [&str; 25] = [
    "SOURCE",
    "APP_NAME",
    "VOLUME",
    "VOLUME_UP",
    "VOLUME_DOWN",
    "VOLUME_SET",
    "MUTE",
    "MUTE_SET",
    "MEDIA_TYPE",
    "MEDIA_TITLE",
    "MEDIA_ARTIST",
    "MEDIA_ALBUM",
    "MEDIA_DURATION",
    "MEDIA_POSITION",
    "MEDIA_IMAGE",
    "PLAY",
    "PAUSE",
    "STOP",
    "PREVIOUS",
    "NEXT",
    "SEEK",
    "SHUFFLE",
    "SEARCH",
    "SPEAKER_CONTROL",
    "LIST",
];

/// True when a connect reply carries none of the failure markers.
pub fn handshake_succeeded(reply: &str) -> bool {
    let reply = reply.to_ascii_lowercase();
    !HANDSHAKE_FAILURE_MARKERS.iter().any(|m| reply.contains(m))
}

/// Everything the polling task needs, cloned out of the client.
struct PollingContext {
    device: Arc<dyn DeviceChannel>,
    session: Arc<RwLock<Session>>,
    event_sender: broadcast::Sender<RemoteEvent>,
    shutdown_notify: Arc<Notify>,
    interval: std::time::Duration,
}

/// Drives Netflix on a Fire TV: owns the device session, maps remote
/// commands to device actions or catalog fetches, and pushes the resulting
/// presentation models to subscribers of [`FireTvClient::event_receiver`].
///
/// # Logging
///
/// This library uses the `tracing` crate for logging. To see logs, install a
/// subscriber in your application:
/// ```no_run
/// use tracing::Level;
/// use tracing_subscriber::FmtSubscriber;
///
/// let subscriber = FmtSubscriber::builder()
///     .with_max_level(Level::DEBUG)
///     .finish();
/// tracing::subscriber::set_global_default(subscriber)
///     .expect("Failed to set tracing subscriber");
/// ```
pub struct FireTvClient {
    config: Arc<RemoteConfig>,
    settings: Settings,
    catalog: CatalogApi,
    device: Arc<dyn DeviceChannel>,
    http: Arc<dyn HttpFetcher>,
    session: Arc<RwLock<Session>>,
    event_sender: broadcast::Sender<RemoteEvent>,
    connection_state_tx: Arc<watch::Sender<ConnectionState>>,
    connection_state_rx: watch::Receiver<ConnectionState>,
    responses: ResponseRouter,
    // Serialises history runs so two pipelines never interleave
    history_lock: Arc<AsyncMutex<()>>,
    polling_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    shutdown_notify: Arc<Notify>,
}

impl FireTvClient {
    /// Create a client talking to the configured ADB server and the public
    /// catalog hosts.
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let device = Arc::new(AdbClient::new(&config.adb_server_address));
        let http = Arc::new(ReqwestFetcher::new(None)?);
        Ok(Self::with_transports(config, device, http, SETTINGS.clone()))
    }

    /// Create a client over caller-supplied transports.
    pub fn with_transports(
        config: RemoteConfig,
        device: Arc<dyn DeviceChannel>,
        http: Arc<dyn HttpFetcher>,
        settings: Settings,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(settings.event_buffer_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let session = Session::new(&config);
        let catalog = CatalogApi::new(&config);
        Self {
            config: Arc::new(config),
            settings,
            catalog,
            device,
            http,
            session: Arc::new(RwLock::new(session)),
            event_sender: event_tx,
            connection_state_tx: Arc::new(state_tx),
            connection_state_rx: state_rx,
            responses: ResponseRouter::new(),
            history_lock: Arc::new(AsyncMutex::new(())),
            polling_task: Arc::new(Mutex::new(None)),
            shutdown_notify: Arc::new(Notify::new()),
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.config.entity_id
    }

    pub fn supported_features() -> &'static [&'static str] {
        &SUPPORTED_FEATURES
    }

    pub fn event_receiver(&self) -> broadcast::Receiver<RemoteEvent> {
        self.event_sender.subscribe()
    }

    /// Get the current connection state.
    pub fn current_state(&self) -> ConnectionState {
        *self.connection_state_rx.borrow()
    }

    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.connection_state_rx.clone()
    }

    /// Snapshot of the session.
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.session.read().await.connected
    }

    /// Correlation tables for catalog and landing-page responses.
    pub fn responses(&self) -> &ResponseRouter {
        &self.responses
    }

    fn emit(&self, event: RemoteEvent) {
        trace!(event = event.event_type(), "Pushing event");
        let _ = self.event_sender.send(event);
    }

    fn set_state(&self, state: ConnectionState) {
        let changed = self.connection_state_tx.send_if_modified(|prev| {
            if *prev != state {
                *prev = state;
                true
            } else {
                false
            }
        });
        if changed {
            debug!(state = state.as_str(), "Connection state changed");
            self.emit(RemoteEvent::ConnectionChanged(state));
        }
    }

    // --- Connection state machine ---

    /// Connect to the remembered device, or the first configured one.
    pub async fn connect(&self) -> Result<(), RemoteError> {
        let address = {
            let mut session = self.session.write().await;
            if session.device_address.is_none() {
                session.device_address = session.target_address();
            }
            session.device_address.clone()
        };

        if !self.config.has_credential() {
            warn!("No api key provided, staying disconnected");
            return Err(RemoteError::MissingCredential);
        }
        let address = address.ok_or_else(|| {
            RemoteError::InvalidConfig("no device address configured".to_string())
        })?;

        if self.is_connected().await {
            trace!(%address, "Already connected");
            return Ok(());
        }
        info!(%address, "Connecting to device");
        self.connect_to(&address).await
    }

    /// Run the handshake against `address` and update the session.
    async fn connect_to(&self, address: &str) -> Result<(), RemoteError> {
        self.set_state(ConnectionState::Connecting);
        match self.handshake(address).await {
            Ok(()) => {
                {
                    let mut session = self.session.write().await;
                    session.connected = true;
                    session.device_address = Some(address.to_string());
                }
                self.set_state(ConnectionState::Connected);
                self.start_polling();
                info!(address, "Connected to device");
                Ok(())
            }
            Err(e) => {
                self.session.write().await.connected = false;
                self.set_state(ConnectionState::Disconnected);
                error!(error = %e, "Device handshake failed");
                self.emit(RemoteEvent::Notification {
                    error: true,
                    message: CONNECT_FAILED_NOTICE.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn handshake(&self, address: &str) -> Result<(), RemoteError> {
        // The server cannot target one device per call, so start from a clean slate
        match self.device.host_disconnect(None).await {
            Ok(reply) => debug!(reply = %reply.trim(), "Disconnect-all response"),
            Err(e) => debug!(error = %e, "Disconnect-all failed (ignored)"),
        }

        let reason = match self.device.host_connect(address).await {
            Ok(reply) if handshake_succeeded(&reply) => {
                debug!(reply = %reply.trim(), "Connect response");
                return Ok(());
            }
            Ok(reply) => reply.trim().to_string(),
            Err(e) => e.to_string(),
        };

        // Best-effort cleanup of the half-open connection
        if let Err(e) = self.device.host_disconnect(Some(address)).await {
            debug!(error = %e, "Cleanup disconnect failed (ignored)");
        }
        Err(RemoteError::ConnectionFailed {
            address: address.to_string(),
            reason,
        })
    }

    /// Mark the device unreachable and stop polling.
    pub async fn disconnect(&self) -> Result<(), RemoteError> {
        info!("Disconnecting from device");
        self.session.write().await.connected = false;
        self.set_state(ConnectionState::Disconnected);
        self.stop_polling().await
    }

    pub async fn enter_standby(&self) -> Result<(), RemoteError> {
        self.disconnect().await
    }

    pub async fn leave_standby(&self) -> Result<(), RemoteError> {
        self.connect().await
    }

    /// Reconnect if needed. Returns false when the device stays unreachable.
    async fn ensure_connected(&self) -> bool {
        if self.is_connected().await {
            return true;
        }
        warn!("Not connected to device, reconnecting");
        self.connect().await.is_ok()
    }

    async fn run_shell(&self, command: &str) -> Result<String, RemoteError> {
        if !self.ensure_connected().await {
            return Err(RemoteError::NotConnected);
        }
        debug!(command, "Sending device command");
        self.device.shell(command).await
    }

    pub async fn send_key(&self, key: KeyCode) -> Result<(), RemoteError> {
        self.run_shell(&key.shell_command()).await.map(|_| ())
    }

    // --- Command dispatcher ---

    /// Execute `command` for `target`. Commands for another entity are
    /// ignored; commands that cannot reach the device are dropped. Failures
    /// are logged, never returned.
    pub async fn dispatch(&self, target: &str, command: RemoteCommand) {
        if target != self.config.entity_id {
            trace!(target, "Ignoring command for another entity");
            return;
        }
        if !self.ensure_connected().await {
            warn!(command = command.name(), "Device unreachable, dropping command");
            return;
        }
        debug!(command = command.name(), "Dispatching command");
        if let Err(e) = self.execute(command.clone()).await {
            error!(error = %e, command = command.name(), "Command failed");
        }
    }

    async fn execute(&self, command: RemoteCommand) -> Result<(), RemoteError> {
        if let Some(key) = command.key_code() {
            self.send_key(key).await?;
            if command.changes_show() {
                self.session.write().await.show_changed = true;
            }
            return Ok(());
        }

        match command {
            RemoteCommand::PlayItem(id) => self.play_item(&id).await,
            RemoteCommand::Search(query) => self.search(&query, SearchScope::All).await.map(|_| ()),
            RemoteCommand::GetAlbum(id) => self.get_album(&id).await.map(|_| ()),
            RemoteCommand::GetPlaylist(id) if id == USER_PLAYLISTS_ID => {
                self.get_user_playlists();
                Ok(())
            }
            RemoteCommand::GetPlaylist(id) => self.get_playlist(&id).await.map(|_| ()),
            RemoteCommand::ChangeSpeaker(address) => self.change_device(&address).await,
            RemoteCommand::GetSpeakers => {
                self.get_devices().await;
                Ok(())
            }
            other => {
                // Key commands are handled above
                debug!(command = other.name(), "No action for command");
                Ok(())
            }
        }
    }

    /// Open a catalog item on the device. An empty id just presses play.
    pub async fn play_item(&self, item_id: &str) -> Result<(), RemoteError> {
        if item_id.trim().is_empty() {
            return self.send_key(KeyCode::MediaPlay).await;
        }
        let output = self.run_shell(&view_intent_command(item_id)).await?;
        debug!(output = %output.trim(), "View intent sent");
        Ok(())
    }

    /// Wake the display and bring the app to the front. Returns whether the
    /// app has focus afterwards.
    pub async fn open_app(&self) -> Result<bool, RemoteError> {
        let power = self.run_shell(POWER_COMMAND).await?;
        if power.contains("state=OFF") {
            info!("Display is off, waking device");
            self.send_key(KeyCode::Home).await?;
        }
        if !self.app_in_focus().await? {
            self.run_shell(LAUNCH_COMMAND).await?;
        }
        self.app_in_focus().await
    }

    async fn app_in_focus(&self) -> Result<bool, RemoteError> {
        let focus = self.run_shell(FOCUS_COMMAND).await?;
        Ok(focus.to_ascii_lowercase().contains(APP_FOCUS_HINT))
    }

    /// Switch to another configured device and refresh the device list.
    pub async fn change_device(&self, address: &str) -> Result<(), RemoteError> {
        let current = self.session.read().await.device_address.clone();
        if current.as_deref() == Some(address) {
            debug!(address, "Already on requested device");
            return Ok(());
        }
        let result = self.connect_to(address).await;
        self.get_devices().await;
        result
    }

    /// Push the configured devices with the active one marked.
    pub async fn get_devices(&self) -> SpeakerList {
        let (addresses, active) = {
            let session = self.session.read().await;
            (
                session.candidate_addresses.clone(),
                session.device_address.clone(),
            )
        };
        let devices = SpeakerList::build(&addresses, active.as_deref());
        self.emit(RemoteEvent::SpeakerList(devices.clone()));
        devices
    }

    // --- Catalog fetches ---

    /// Issue a GET whose response is reported to the router, like any other
    /// completed network call.
    fn issue_get(&self, family: ResponseFamily, request: FetchRequest) {
        let http = self.http.clone();
        let responses = self.responses.clone();
        tokio::spawn(async move {
            let url = request.url.clone();
            match http.get(request).await {
                Ok(body) => {
                    responses.on_response(family, &url, body);
                }
                Err(e) => {
                    error!(error = %e, url = %url, "GET failed");
                    responses.on_failure(family, &url);
                }
            }
        });
    }

    async fn fetch_catalog(&self, request: FetchRequest) -> Result<serde_json::Value, RemoteError> {
        let pending = self.responses.catalog.register(&request.url);
        self.issue_get(ResponseFamily::Catalog, request);
        pending.wait(self.settings.response_timeout).await
    }

    async fn fetch_page(&self, url: &str) -> Result<String, RemoteError> {
        let pending = self.responses.pages.register(url);
        self.issue_get(ResponseFamily::Page, FetchRequest::new(url));
        pending.wait(self.settings.response_timeout).await
    }

    pub async fn search(&self, query: &str, scope: SearchScope) -> Result<SearchResultList, RemoteError> {
        info!(query, ?scope, "Searching catalog");
        let request = self.catalog.search_request(query, scope)?;
        let document = self.fetch_catalog(request).await?;
        let results = catalog::search_results(document)?;
        self.emit(RemoteEvent::SearchResults(results.clone()));
        Ok(results)
    }

    pub async fn get_album(&self, title_id: &str) -> Result<BrowseList, RemoteError> {
        info!(title_id, "Fetching episodes");
        let request = self.catalog.episodes_request(title_id)?;
        let document = self.fetch_catalog(request).await?;
        let album = catalog::album_list(document)?;
        self.emit(RemoteEvent::BrowseList(album.clone()));
        Ok(album)
    }

    /// Push the static user-playlist menu.
    pub fn get_user_playlists(&self) -> BrowseList {
        let list = catalog::user_playlists();
        self.emit(RemoteEvent::BrowseList(list.clone()));
        list
    }

    pub async fn get_playlist(&self, playlist_id: &str) -> Result<BrowseList, RemoteError> {
        info!(playlist_id, "Fetching playlist");
        let spec = catalog::playlist_spec(playlist_id);
        if spec.source == PlaylistSource::History {
            return self.get_recent().await;
        }
        let request = self
            .catalog
            .playlist_request(&spec)?
            .ok_or_else(|| RemoteError::InvalidResponse("playlist has no catalog request".to_string()))?;
        let document = self.fetch_catalog(request).await?;
        let list = catalog::playlist_list(&spec, document)?;
        self.emit(RemoteEvent::BrowseList(list.clone()));
        Ok(list)
    }

    // --- History scrape pipeline ---

    /// Resolve the device's viewing history one entry at a time, pushing the
    /// growing list after every resolved entry.
    pub async fn get_recent(&self) -> Result<BrowseList, RemoteError> {
        let _guard = self.history_lock.lock().await;
        let dump = self.run_shell(HISTORY_DUMP_COMMAND).await?;
        let queue = HistoryQueue::parse(&dump);
        info!(entries = queue.len(), "Resolving viewing history");

        let header = catalog::playlist_spec(RECENT_PLAYLIST_ID);
        let mut pipeline = ScrapePipeline::new(queue, &self.settings.landing_page_base)
            .with_title(header.title);
        loop {
            match pipeline.next_step() {
                HistoryStep::Done => break,
                HistoryStep::Skip(_) => continue,
                HistoryStep::Fetch { title_id, url, .. } => {
                    let page = match self.fetch_page(&url).await {
                        Ok(page) => page,
                        Err(e) => {
                            warn!(error = %e, %url, "Skipping history entry");
                            continue;
                        }
                    };
                    match pipeline.apply_page(&title_id, &page) {
                        Ok(list) => self.emit(RemoteEvent::BrowseList(list.clone())),
                        Err(e) => warn!(error = %e, %url, "Skipping history entry with bad metadata"),
                    }
                }
            }
        }

        debug!(
            fetched = pipeline.fetched(),
            skipped = pipeline.skipped(),
            "History pipeline finished"
        );
        pipeline.finish_header(header.image);
        let list = pipeline.into_list();
        if list.is_empty() {
            self.emit(RemoteEvent::BrowseList(list.clone()));
        }
        Ok(list)
    }

    // --- Now-playing polling ---

    fn start_polling(&self) {
        let mut guard = self
            .polling_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        // Drop any stale shutdown permit from a previous stop
        while self.shutdown_notify.notified().now_or_never().is_some() {}

        let ctx = PollingContext {
            device: self.device.clone(),
            session: self.session.clone(),
            event_sender: self.event_sender.clone(),
            shutdown_notify: self.shutdown_notify.clone(),
            interval: self.settings.polling_interval,
        };
        *guard = Some(tokio::spawn(Self::poll_loop(ctx)));
        debug!("Polling task started");
    }

    async fn stop_polling(&self) -> Result<(), RemoteError> {
        let handle = self
            .polling_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            self.shutdown_notify.notify_one();
            handle.await?;
            debug!("Polling task stopped");
        }
        Ok(())
    }

    async fn poll_loop(ctx: PollingContext) {
        loop {
            tokio::select! {
                biased;
                _ = ctx.shutdown_notify.notified() => break,
                _ = sleep(ctx.interval) => {}
            }
            if !ctx.session.read().await.connected {
                break;
            }
            Self::poll_once(&ctx).await;
        }
    }

    async fn poll_once(ctx: &PollingContext) {
        let focus = match ctx.device.shell(FOCUS_COMMAND).await {
            Ok(focus) => focus,
            Err(e) if e.is_transport() => {
                warn!(error = %e, "Polling the device failed");
                return;
            }
            Err(e) => {
                error!(error = %e, "Unexpected polling failure");
                return;
            }
        };
        let event = if focus.to_ascii_lowercase().contains(APP_FOCUS_HINT) {
            let show_refreshed = std::mem::take(&mut ctx.session.write().await.show_changed);
            RemoteEvent::NowPlaying(NowPlaying {
                source: SOURCE_NAME.to_string(),
                focused_window: focus.trim().to_string(),
                show_refreshed,
            })
        } else {
            trace!("App not in front, clearing player");
            RemoteEvent::PlayerCleared
        };
        let _ = ctx.event_sender.send(event);
    }
}

impl std::fmt::Debug for FireTvClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FireTvClient")
            .field("entity_id", &self.config.entity_id)
            .field("state", &self.current_state())
            .finish()
    }
}

// Teardown: pending registrations are released and polling stops
impl Drop for FireTvClient {
    fn drop(&mut self) {
        self.responses.clear();
        if let Ok(mut guard) = self.polling_task.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}
