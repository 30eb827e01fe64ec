/// The client's current high-level state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Action {
    Idle = 0,
    Afk = 1,
    Playing = 2,
    Editing = 3,
    Modding = 4,
    Multiplayer = 5,
    Watching = 6,
    Unknown = 7,
    Testing = 8,
    Submitting = 9,
    Paused = 10,
    Lobby = 11,
    Multiplaying = 12,
    OsuDirect = 13,
}

impl Action {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Afk,
            2 => Self::Playing,
            3 => Self::Editing,
            4 => Self::Modding,
            5 => Self::Multiplayer,
            6 => Self::Watching,
            8 => Self::Testing,
            9 => Self::Submitting,
            10 => Self::Paused,
            11 => Self::Lobby,
            12 => Self::Multiplaying,
            13 => Self::OsuDirect,
            _ => Self::Unknown,
        }
    }

    pub fn val(self) -> u8 {
        self as u8
    }
}

/// The scope of presence updates a client wants to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum PresenceFilter {
    None = 0,
    All = 1,
    Friends = 2,
}

impl PresenceFilter {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::None),
            1 => Some(Self::All),
            2 => Some(Self::Friends),
            _ => None,
        }
    }
}
