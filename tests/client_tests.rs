use async_trait::async_trait;
use mockall::mock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

use firetv_remote_rs::scrape::HISTORY_DUMP_COMMAND;
use firetv_remote_rs::{
    handshake_succeeded, ConnectionState, DeviceChannel, FetchRequest, FireTvClient,
    HttpFetcher, ItemType, RemoteCommand, RemoteConfig, RemoteError, RemoteEvent, SearchScope,
    Settings,
};

const ENTITY: &str = "netflix.main";
const FOCUS_COMMAND: &str = "dumpsys window windows | grep mCurrentFocus";

mock! {
    pub Http {}

    #[async_trait]
    impl HttpFetcher for Http {
        async fn get(&self, request: FetchRequest) -> Result<String, RemoteError>;
    }
}

/// Records every request and answers shell commands from a table.
#[derive(Default)]
struct FakeDevice {
    connect_reply: String,
    shell_replies: Mutex<HashMap<String, String>>,
    log: Mutex<Vec<String>>,
}

impl FakeDevice {
    fn reachable() -> Arc<Self> {
        Arc::new(Self {
            connect_reply: "connected to 192.168.1.20:5555".to_string(),
            ..Default::default()
        })
    }

    fn refusing() -> Arc<Self> {
        Arc::new(Self {
            connect_reply: "failed to connect to '192.168.1.20:5555': Connection refused"
                .to_string(),
            ..Default::default()
        })
    }

    fn reply(&self, command: &str, output: &str) {
        self.shell_replies
            .lock()
            .unwrap()
            .insert(command.to_string(), output.to_string());
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn shell_log(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|l| l.strip_prefix("shell:").map(ToString::to_string))
            .collect()
    }
}

#[async_trait]
impl DeviceChannel for FakeDevice {
    async fn host_disconnect(&self, address: Option<&str>) -> Result<String, RemoteError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("disconnect:{}", address.unwrap_or("*")));
        Ok(String::new())
    }

    async fn host_connect(&self, address: &str) -> Result<String, RemoteError> {
        self.log.lock().unwrap().push(format!("connect:{}", address));
        Ok(self.connect_reply.clone())
    }

    async fn shell(&self, command: &str) -> Result<String, RemoteError> {
        self.log.lock().unwrap().push(format!("shell:{}", command));
        Ok(self
            .shell_replies
            .lock()
            .unwrap()
            .get(command)
            .cloned()
            .unwrap_or_default())
    }
}

/// HTTP fetcher that never answers within any sane deadline.
struct SilentHttp;

#[async_trait]
impl HttpFetcher for SilentHttp {
    async fn get(&self, _request: FetchRequest) -> Result<String, RemoteError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
    }
}

fn config(token: &str) -> RemoteConfig {
    RemoteConfig::new(
        ENTITY,
        "127.0.0.1:5037",
        "192.168.1.20:5555, 192.168.1.21:5555",
        token,
        "NL",
    )
}

fn settings() -> Settings {
    Settings {
        response_timeout: Duration::from_secs(5),
        // Long enough that polling stays quiet unless a test advances time
        polling_interval: Duration::from_secs(3600),
        ..Settings::default()
    }
}

fn client_with(device: Arc<FakeDevice>, http: impl HttpFetcher + 'static) -> FireTvClient {
    FireTvClient::with_transports(config("secret"), device, Arc::new(http), settings())
}

fn idle_http() -> MockHttp {
    let mut http = MockHttp::new();
    http.expect_get().never();
    http
}

async fn next_browse_list(rx: &mut broadcast::Receiver<RemoteEvent>) -> firetv_remote_rs::BrowseList {
    loop {
        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        if let RemoteEvent::BrowseList(list) = event {
            return list;
        }
    }
}

#[test]
fn test_handshake_classification() {
    assert!(handshake_succeeded("connected to 192.168.1.20:5555"));
    assert!(handshake_succeeded("already connected to 192.168.1.20:5555"));
    assert!(!handshake_succeeded("failed to connect to 192.168.1.20:5555"));
    assert!(!handshake_succeeded("FAILED: no route"));
    assert!(!handshake_succeeded("unable to connect to 192.168.1.20:5555"));
}

#[test]
fn test_supported_features() {
    let features = FireTvClient::supported_features();
    assert!(features.contains(&"SEARCH"));
    assert!(features.contains(&"SPEAKER_CONTROL"));
    assert!(features.contains(&"MEDIA_IMAGE"));
    assert_eq!(features.len(), 25);
    assert_eq!(features.last(), Some(&"LIST"));
}

#[tokio::test]
async fn test_connect_requires_credential() {
    let device = FakeDevice::reachable();
    let client = FireTvClient::with_transports(
        config(""),
        device.clone(),
        Arc::new(idle_http()),
        settings(),
    );

    let result = client.connect().await;
    assert!(matches!(result, Err(RemoteError::MissingCredential)));
    assert_eq!(client.current_state(), ConnectionState::Disconnected);
    assert!(device.log().is_empty());

    // The first candidate is remembered even though nothing connected
    let session = client.session().await;
    assert_eq!(session.device_address.as_deref(), Some("192.168.1.20:5555"));
    assert!(!session.connected);
}

#[tokio::test]
async fn test_connect_runs_handshake() {
    let device = FakeDevice::reachable();
    let client = client_with(device.clone(), idle_http());
    let mut rx = client.event_receiver();

    client.connect().await.unwrap();

    assert_eq!(client.current_state(), ConnectionState::Connected);
    assert!(client.is_connected().await);
    assert_eq!(
        device.log(),
        vec!["disconnect:*".to_string(), "connect:192.168.1.20:5555".to_string()]
    );
    assert!(matches!(
        rx.recv().await.unwrap(),
        RemoteEvent::ConnectionChanged(ConnectionState::Connecting)
    ));
    assert!(matches!(
        rx.recv().await.unwrap(),
        RemoteEvent::ConnectionChanged(ConnectionState::Connected)
    ));

    // Second connect is a no-op
    client.connect().await.unwrap();
    assert_eq!(device.log().len(), 2);
}

#[tokio::test]
async fn test_failed_handshake_cleans_up_and_notifies() {
    let device = FakeDevice::refusing();
    let client = client_with(device.clone(), idle_http());
    let mut rx = client.event_receiver();

    let result = client.connect().await;
    match result {
        Err(RemoteError::ConnectionFailed { address, reason }) => {
            assert_eq!(address, "192.168.1.20:5555");
            assert!(reason.contains("failed to connect"));
        }
        other => panic!("Expected ConnectionFailed, got {:?}", other),
    }
    assert_eq!(client.current_state(), ConnectionState::Disconnected);
    assert_eq!(
        device.log(),
        vec![
            "disconnect:*".to_string(),
            "connect:192.168.1.20:5555".to_string(),
            "disconnect:192.168.1.20:5555".to_string(),
        ]
    );

    let mut notified = false;
    while let Ok(event) = rx.try_recv() {
        if let RemoteEvent::Notification { error, message } = event {
            assert!(error);
            assert!(message.contains("ADB Debugging"));
            notified = true;
        }
    }
    assert!(notified);
}

#[tokio::test]
async fn test_dispatch_ignores_other_targets() {
    let device = FakeDevice::reachable();
    let client = client_with(device.clone(), idle_http());

    client.dispatch("other.entity", RemoteCommand::Play).await;

    assert!(device.log().is_empty());
    assert_eq!(client.current_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_dispatch_drops_command_when_unreachable() {
    let device = FakeDevice::refusing();
    let client = client_with(device.clone(), idle_http());

    client.dispatch(ENTITY, RemoteCommand::Pause).await;

    assert!(device.shell_log().is_empty());
}

#[tokio::test]
async fn test_dispatch_sends_key_events() {
    let device = FakeDevice::reachable();
    let client = client_with(device.clone(), idle_http());

    client.dispatch(ENTITY, RemoteCommand::Play).await;
    client.dispatch(ENTITY, RemoteCommand::CursorOk).await;
    client.dispatch(ENTITY, RemoteCommand::Back).await;
    client.dispatch(ENTITY, RemoteCommand::Mute).await;
    client.dispatch(ENTITY, RemoteCommand::PlayItem(String::new())).await;

    assert_eq!(
        device.shell_log(),
        vec![
            "input keyevent 126",
            "input keyevent 23",
            "input keyevent 4",
            "input keyevent 164",
            "input keyevent 126",
        ]
    );
}

#[tokio::test]
async fn test_play_item_opens_deep_link() {
    let device = FakeDevice::reachable();
    let client = client_with(device.clone(), idle_http());

    client
        .dispatch(ENTITY, RemoteCommand::PlayItem("title/80100172".to_string()))
        .await;

    assert_eq!(
        device.shell_log(),
        vec!["am start -a android.intent.action.VIEW -d http://www.netflix.com/title/80100172"]
    );
}

#[tokio::test]
async fn test_search_groups_results() {
    let device = FakeDevice::reachable();
    let mut http = MockHttp::new();
    http.expect_get()
        .withf(|req| {
            req.url.starts_with("https://unogsng.p.rapidapi.com/search?query=dark")
                && req.url.contains("countrylist=67")
                && req
                    .headers
                    .iter()
                    .any(|(k, v)| k == "x-rapidapi-key" && v == "secret")
                && req
                    .headers
                    .iter()
                    .any(|(k, v)| k == "x-rapidapi-host" && v == "unogsng.p.rapidapi.com")
        })
        .times(1)
        .returning(|_| {
            Ok(r#"{"results":[
                {"nfid":80100172,"title":"Dark","year":2017,"synopsis":"A missing child sets four families on a frantic hunt for answers.","vtype":"series","img":"https://img/dark.jpg"},
                {"nfid":81,"title":"Dark Places","year":"2015","synopsis":"Short","vtype":"movie","img":"https://img/places.jpg"},
                {"nfid":82,"title":"Unknown","vtype":"podcast"}
            ]}"#
            .to_string())
        });
    let client = client_with(device, http);
    let mut rx = client.event_receiver();

    let results = client.search("dark", SearchScope::All).await.unwrap();

    let shows = results.group("shows").unwrap();
    assert_eq!(shows.items.len(), 1);
    assert_eq!(shows.items[0].id, "80100172");
    assert_eq!(shows.items[0].title, "Dark (2017)");
    assert_eq!(shows.items[0].subtitle.chars().count(), 50);
    assert_eq!(shows.items[0].item_type, ItemType::Show);

    let movies = results.group("movies").unwrap();
    assert_eq!(movies.items.len(), 1);
    assert_eq!(movies.items[0].title, "Dark Places (2015)");

    let mut pushed = false;
    while let Ok(event) = rx.try_recv() {
        pushed |= matches!(event, RemoteEvent::SearchResults(_));
    }
    assert!(pushed);
}

#[tokio::test]
async fn test_get_album_flattens_seasons() {
    let device = FakeDevice::reachable();
    let mut http = MockHttp::new();
    http.expect_get()
        .withf(|req| req.url == "https://unogsng.p.rapidapi.com/episodes?netflixid=80100172")
        .times(1)
        .returning(|_| {
            Ok(r#"[
                {"season":1,"episodes":[
                    {"epid":80100173,"seasnum":1,"epnum":1,"title":"Secrets","synopsis":"It&#39;s 2019","img":"https://img/e1.jpg"},
                    {"epid":80100174,"seasnum":1,"epnum":2,"title":"Lies","synopsis":"","img":"https://img/e2.jpg"}
                ]},
                {"season":2,"episodes":[
                    {"epid":80100199,"seasnum":"2","epnum":"10","title":"Don&#39;t","synopsis":"","img":""}
                ]}
            ]"#
            .to_string())
        });
    let client = client_with(device, http);

    let album = client.get_album("80100172").await.unwrap();

    assert_eq!(album.id, "80100173");
    assert_eq!(album.image_url(), "https://img/e1.jpg");
    assert_eq!(album.len(), 3);
    assert_eq!(album.items[0].title, "S01E01: Secrets");
    assert_eq!(album.items[0].subtitle, "It's 2019");
    assert_eq!(album.items[2].title, "S02E10: Don't");
    assert_eq!(album.items[2].item_type, ItemType::Episode);
}

#[tokio::test]
async fn test_release_feed_playlist() {
    let device = FakeDevice::reachable();
    let mut http = MockHttp::new();
    http.expect_get()
        .withf(|req| {
            req.url.starts_with("https://unogs-unogs-v1.p.rapidapi.com/api.cgi?")
                && req.url.contains("q=get%3Anew14%3ANL")
        })
        .times(1)
        .returning(|_| {
            Ok(r#"{"COUNT":"1","ITEMS":[["81001","New Show","https://img/n.jpg","Fresh",null,"series","8.1","2020"]]}"#
                .to_string())
        });
    let client = client_with(device, http);

    let list = client.get_playlist("cgi_release").await.unwrap();

    assert_eq!(list.id, "cgi_release");
    assert_eq!(list.title(), "Latest Releases");
    assert!(list.allowed_commands.is_empty());
    assert_eq!(list.items[0].id, "title/81001");
    assert_eq!(list.items[0].title, "New Show (2020)");
}

#[tokio::test]
async fn test_user_playlists_menu() {
    let device = FakeDevice::reachable();
    let client = client_with(device, idle_http());
    let mut rx = client.event_receiver();

    client
        .dispatch(ENTITY, RemoteCommand::GetPlaylist("user".to_string()))
        .await;

    let list = next_browse_list(&mut rx).await;
    assert_eq!(list.title(), "User Playlists");
    assert_eq!(list.len(), 9);
    assert_eq!(list.items[0].id, "adb_recent");
    assert!(list.items.iter().all(|i| i.item_type == ItemType::Playlist));
}

#[tokio::test]
async fn test_history_fetches_only_valid_entries() {
    let device = FakeDevice::reachable();
    device.reply(
        HISTORY_DUMP_COMMAND,
        "netflix://title/601 flg x, netflix://title/-1 flg y",
    );
    let mut http = MockHttp::new();
    http.expect_get()
        .withf(|req| req.url == "https://www.netflix.com/nl-en/title/601")
        .times(1)
        .returning(|_| {
            Ok(r#"<html><script type="application/ld+json">{"@type":"TVSeries","url":"https://www.netflix.com/nl-en/title/601","name":"Dark","description":"Time travel","image":"https://img/601.jpg"}</script></html>"#
                .to_string())
        });
    let client = client_with(device.clone(), http);
    let mut rx = client.event_receiver();

    client
        .dispatch(ENTITY, RemoteCommand::GetPlaylist("adb_recent".to_string()))
        .await;

    let list = next_browse_list(&mut rx).await;
    assert_eq!(list.len(), 1);
    assert_eq!(list.title(), "Recently Viewed");
    assert_eq!(list.image_url(), "https://img/601.jpg");
    assert_eq!(list.items[0].id, "title/601");
    assert_eq!(list.items[0].item_type, ItemType::Show);
    assert!(device.shell_log().contains(&HISTORY_DUMP_COMMAND.to_string()));
}

fn titled_page(id: &str, name: &str) -> String {
    format!(
        r#"<html><script type="application/ld+json">{{"@type":"Movie","url":"https://www.netflix.com/nl-en/title/{id}","name":"{name}","description":"","image":"https://img/{id}.jpg"}}</script></html>"#
    )
}

#[tokio::test]
async fn test_history_lists_entries_in_fetch_order() {
    let device = FakeDevice::reachable();
    // Device output repeats lines and prefixes each reference
    device.reply(
        HISTORY_DUMP_COMMAND,
        "      Intent { dat=netflix://title/10 flg=0x10 }\n\
               Intent { dat=netflix://title/20 flg=0x10 }\n\
               Intent { dat=netflix://title/20 flg=0x10 }\n\
               Intent { dat=netflix://title/-1 flg=0x10 }\n\
               Intent { dat=netflix://title/30 flg=0x10 }\n",
    );
    let fetched = Arc::new(Mutex::new(Vec::new()));
    let seen = fetched.clone();
    let mut http = MockHttp::new();
    http.expect_get().times(3).returning(move |req| {
        let id = req.url.rsplit('/').next().unwrap_or_default().to_string();
        seen.lock().unwrap().push(id.clone());
        Ok(titled_page(&id, &format!("Show {}", id)))
    });
    let client = client_with(device, http);
    let mut rx = client.event_receiver();

    let list = client.get_recent().await.unwrap();

    assert_eq!(*fetched.lock().unwrap(), vec!["30", "20", "10"]);
    let titles: Vec<&str> = list.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Show 30", "Show 20", "Show 10"]);
    assert_eq!(list.items[0].id, "title/30");
    assert_eq!(list.title(), "Recently Viewed");
    // First resolved page supplies the header image
    assert_eq!(list.image_url(), "https://img/30.jpg");

    // One push per resolved entry, each growing by one
    let mut sizes = Vec::new();
    while sizes.len() < 3 {
        sizes.push(next_browse_list(&mut rx).await.len());
    }
    assert_eq!(sizes, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_genre_playlist_from_search() {
    let device = FakeDevice::reachable();
    let mut http = MockHttp::new();
    http.expect_get()
        .withf(|req| {
            req.url.starts_with("https://unogsng.p.rapidapi.com/search?")
                && req.url.contains("genrelist=1009%2C1402%2C2700%2C3903%2C4426%2C4906")
                && req.url.contains("type=series")
                && req.url.contains("countrylist=67")
        })
        .times(1)
        .returning(|_| {
            Ok(r#"{"results":[
                {"nfid":900,"title":"Big Mouth","year":2017,"synopsis":"Teens","vtype":"series","img":"https://img/900.jpg"},
                {"nfid":901,"title":"It&#39;s Funny","year":"","synopsis":"","vtype":"movie","img":""}
            ]}"#
            .to_string())
        });
    let client = client_with(device, http);
    let mut rx = client.event_receiver();

    client
        .dispatch(ENTITY, RemoteCommand::GetPlaylist("sch_comedy".to_string()))
        .await;

    let list = next_browse_list(&mut rx).await;
    assert_eq!(list.id, "sch_comedy");
    assert_eq!(list.title(), "Latest Comedy");
    assert_eq!(list.subtitle, "Latest comedy releases");
    assert_eq!(list.image_url(), "qrc:/images/netflix_comedy.png");
    assert!(list.allowed_commands.is_empty());
    assert_eq!(list.len(), 2);
    assert_eq!(list.items[0].id, "900");
    assert_eq!(list.items[0].title, "Big Mouth (2017)");
    assert_eq!(list.items[0].item_type, ItemType::Show);
    assert_eq!(list.items[1].title, "It's Funny");
    assert_eq!(list.items[1].item_type, ItemType::Movie);
}

#[tokio::test]
async fn test_history_skips_failed_fetches() {
    let device = FakeDevice::reachable();
    device.reply(HISTORY_DUMP_COMMAND, "netflix://title/1 flg, netflix://title/2 flg");
    let mut http = MockHttp::new();
    http.expect_get()
        .withf(|req| req.url.ends_with("title/2"))
        .times(1)
        .returning(|_| Err(RemoteError::InvalidResponse("boom".to_string())));
    http.expect_get()
        .withf(|req| req.url.ends_with("title/1"))
        .times(1)
        .returning(|_| Ok("<html>no metadata</html>".to_string()));
    let client = client_with(device, http);

    let list = client.get_recent().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list.items[0].id, "title/1");
}

#[tokio::test]
async fn test_empty_history_still_pushes_list() {
    let device = FakeDevice::reachable();
    device.reply(HISTORY_DUMP_COMMAND, "netflix://title/-1 flg");
    let client = client_with(device, idle_http());
    let mut rx = client.event_receiver();

    let list = client.get_recent().await.unwrap();
    assert!(list.is_empty());
    assert_eq!(next_browse_list(&mut rx).await.id, "adb_recent");
}

#[tokio::test]
async fn test_transport_failure_abandons_request() {
    let device = FakeDevice::reachable();
    let mut http = MockHttp::new();
    http.expect_get()
        .returning(|_| Err(RemoteError::InvalidResponse("offline".to_string())));
    let client = client_with(device, http);

    let result = client.search("dark", SearchScope::Movies).await;
    assert!(matches!(result, Err(RemoteError::ResponseAbandoned(_))));
    assert_eq!(client.responses().catalog.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_silent_catalog_times_out() {
    let device = FakeDevice::reachable();
    let client = client_with(device, SilentHttp);

    let result = client.get_album("1").await;
    assert!(matches!(result, Err(RemoteError::ResponseTimeout(_))));
    assert_eq!(client.responses().catalog.pending_count(), 0);
}

#[tokio::test]
async fn test_device_list_marks_active() {
    let device = FakeDevice::reachable();
    let client = client_with(device.clone(), idle_http());
    client.connect().await.unwrap();

    let devices = client.get_devices().await;
    assert_eq!(devices.speakers.len(), 2);
    assert_eq!(devices.active().unwrap().id, "192.168.1.20:5555");
    assert_eq!(devices.speakers[1].description, "Not connected");
    assert!(devices.speakers[1].allowed_commands.contains("CONNECT"));

    client
        .dispatch(ENTITY, RemoteCommand::ChangeSpeaker("192.168.1.21:5555".to_string()))
        .await;
    let devices = client.get_devices().await;
    assert_eq!(devices.active().unwrap().id, "192.168.1.21:5555");
    assert!(device.log().contains(&"connect:192.168.1.21:5555".to_string()));
}

#[tokio::test]
async fn test_disconnect_and_standby() {
    let device = FakeDevice::reachable();
    let client = client_with(device, idle_http());
    client.connect().await.unwrap();

    client.enter_standby().await.unwrap();
    assert_eq!(client.current_state(), ConnectionState::Disconnected);
    assert!(!client.is_connected().await);

    client.leave_standby().await.unwrap();
    assert_eq!(client.current_state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_open_app_launches_when_not_focused() {
    let device = FakeDevice::reachable();
    device.reply(
        "dumpsys power | grep 'Display Power'",
        "Display Power: state=OFF",
    );
    let client = client_with(device.clone(), idle_http());

    let focused = client.open_app().await.unwrap();
    assert!(!focused);

    let shell = device.shell_log();
    assert!(shell.contains(&"input keyevent 3".to_string()));
    assert!(shell.contains(
        &"am start -n com.netflix.ninja/com.netflix.ninja.MainActivity".to_string()
    ));
}

#[tokio::test(start_paused = true)]
async fn test_polling_reports_now_playing() {
    let device = FakeDevice::reachable();
    device.reply(
        FOCUS_COMMAND,
        "  mCurrentFocus=Window{1f2 u0 com.netflix.ninja/com.netflix.ninja.MainActivity}",
    );
    let client = FireTvClient::with_transports(
        config("secret"),
        device.clone(),
        Arc::new(idle_http()),
        Settings {
            polling_interval: Duration::from_millis(4000),
            ..Settings::default()
        },
    );
    let mut rx = client.event_receiver();
    client.connect().await.unwrap();

    let mut now_playing = Vec::new();
    while now_playing.len() < 2 {
        match rx.recv().await.unwrap() {
            RemoteEvent::NowPlaying(np) => now_playing.push(np),
            _ => continue,
        }
    }
    assert_eq!(now_playing[0].source, "Fire TV");
    // Set at session start, consumed by the first tick
    assert!(now_playing[0].show_refreshed);
    assert!(!now_playing[1].show_refreshed);

    client.dispatch(ENTITY, RemoteCommand::Next).await;
    loop {
        if let RemoteEvent::NowPlaying(np) = rx.recv().await.unwrap() {
            assert!(np.show_refreshed);
            break;
        }
    }

    device.reply(FOCUS_COMMAND, "mCurrentFocus=Window{3 u0 com.amazon.tv.launcher}");
    loop {
        match rx.recv().await.unwrap() {
            RemoteEvent::PlayerCleared => break,
            _ => continue,
        }
    }
    client.disconnect().await.unwrap();
}
