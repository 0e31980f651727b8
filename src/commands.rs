// Remote-control commands accepted by the dispatcher

/// Android key codes sent with `input keyevent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Home = 3,
    Back = 4,
    DpadUp = 19,
    DpadDown = 20,
    DpadLeft = 21,
    DpadRight = 22,
    DpadCenter = 23,
    VolumeUp = 24,
    VolumeDown = 25,
    MediaStop = 86,
    MediaNext = 87,
    MediaPrevious = 88,
    MediaPlay = 126,
    MediaPause = 127,
    Mute = 164,
}

impl KeyCode {
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Shell command that injects this key on the device.
    pub fn shell_command(self) -> String {
        format!("input keyevent {}", self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    Play,
    /// Play a catalog item; an empty id behaves like `Play`.
    PlayItem(String),
    Pause,
    Stop,
    Next,
    Previous,
    CursorUp,
    CursorDown,
    CursorLeft,
    CursorRight,
    CursorOk,
    Home,
    Back,
    VolumeUp,
    VolumeDown,
    Mute,
    Search(String),
    GetAlbum(String),
    GetPlaylist(String),
    ChangeSpeaker(String),
    GetSpeakers,
}

impl RemoteCommand {
    pub fn name(&self) -> &'static str {
        get_command_name(self)
    }

    /// The fixed key event behind this command, if it is a plain key press.
    pub fn key_code(&self) -> Option<KeyCode> {
        match self {
            RemoteCommand::Play => Some(KeyCode::MediaPlay),
            RemoteCommand::PlayItem(id) if id.trim().is_empty() => Some(KeyCode::MediaPlay),
            RemoteCommand::Pause => Some(KeyCode::MediaPause),
            RemoteCommand::Stop => Some(KeyCode::MediaStop),
            RemoteCommand::Next => Some(KeyCode::MediaNext),
            RemoteCommand::Previous => Some(KeyCode::MediaPrevious),
            RemoteCommand::CursorUp => Some(KeyCode::DpadUp),
            RemoteCommand::CursorDown => Some(KeyCode::DpadDown),
            RemoteCommand::CursorLeft => Some(KeyCode::DpadLeft),
            RemoteCommand::CursorRight => Some(KeyCode::DpadRight),
            RemoteCommand::CursorOk => Some(KeyCode::DpadCenter),
            RemoteCommand::Home => Some(KeyCode::Home),
            RemoteCommand::Back => Some(KeyCode::Back),
            RemoteCommand::VolumeUp => Some(KeyCode::VolumeUp),
            RemoteCommand::VolumeDown => Some(KeyCode::VolumeDown),
            RemoteCommand::Mute => Some(KeyCode::Mute),
            _ => None,
        }
    }

    /// NEXT and PREVIOUS may move playback to a different show.
    pub fn changes_show(&self) -> bool {
        matches!(self, RemoteCommand::Next | RemoteCommand::Previous)
    }
}

// Helper function to get the command name for a RemoteCommand
pub fn get_command_name(command: &RemoteCommand) -> &'static str {
    match command {
        RemoteCommand::Play => "PLAY",
        RemoteCommand::PlayItem(_) => "PLAY_ITEM",
        RemoteCommand::Pause => "PAUSE",
        RemoteCommand::Stop => "STOP",
        RemoteCommand::Next => "NEXT",
        RemoteCommand::Previous => "PREVIOUS",
        RemoteCommand::CursorUp => "CURSOR_UP",
        RemoteCommand::CursorDown => "CURSOR_DOWN",
        RemoteCommand::CursorLeft => "CURSOR_LEFT",
        RemoteCommand::CursorRight => "CURSOR_RIGHT",
        RemoteCommand::CursorOk => "CURSOR_OK",
        RemoteCommand::Home => "HOME",
        RemoteCommand::Back => "BACK",
        RemoteCommand::VolumeUp => "VOLUME_UP",
        RemoteCommand::VolumeDown => "VOLUME_DOWN",
        RemoteCommand::Mute => "MUTE",
        RemoteCommand::Search(_) => "SEARCH",
        RemoteCommand::GetAlbum(_) => "GET_ALBUM",
        RemoteCommand::GetPlaylist(_) => "GET_PLAYLIST",
        RemoteCommand::ChangeSpeaker(_) => "CHANGE_SPEAKER",
        RemoteCommand::GetSpeakers => "GET_SPEAKERS",
    }
}

/// Deep link opened on the device for a catalog id such as `601` or `title/601`.
pub fn deep_link(item_id: &str) -> String {
    let id = item_id.trim().trim_start_matches('/');
    if id.starts_with("title/") || id.starts_with("watch/") {
        format!("http://www.netflix.com/{}", id)
    } else {
        format!("http://www.netflix.com/title/{}", id)
    }
}

/// Shell command that asks the device to open `item_id` in the app.
pub fn view_intent_command(item_id: &str) -> String {
    format!(
        "am start -a android.intent.action.VIEW -d {}",
        deep_link(item_id)
    )
}
