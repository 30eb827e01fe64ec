//! Client → server packet ids and the handful of composite
//! payload shapes worth naming instead of reading inline in the router.

use super::PayloadReader;
use crate::error::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ClientPacketId {
    ChangeAction = 0,
    PublicMessage = 1,
    Logout = 2,
    StatsUpdateReq = 3,
    Ping = 4,
    StartSpectate = 16,
    StopSpectate = 17,
    SpectateFrames = 18,
    CantSpectate = 21,
    PrivateMessage = 25,
    PartLobby = 29,
    JoinLobby = 30,
    CreateMatch = 31,
    JoinMatch = 32,
    PartMatch = 33,
    MatchChangeSlot = 38,
    MatchReady = 39,
    MatchLock = 40,
    MatchChangeSettings = 41,
    MatchStart = 44,
    MatchScoreUpdate = 48,
    MatchComplete = 49,
    MatchChangeMods = 51,
    MatchLoadComplete = 52,
    MatchNoBeatmap = 54,
    MatchNotReady = 55,
    MatchFailed = 56,
    MatchHasBeatmap = 59,
    MatchSkipRequest = 60,
    ChannelJoin = 63,
    MatchTransferHost = 70,
    FriendAdd = 73,
    FriendRemove = 74,
    MatchChangeTeam = 77,
    ChannelPart = 78,
    ReceiveUpdates = 79,
    SetAwayMessage = 82,
    UserStatsRequest = 85,
    MatchInvite = 87,
    MatchChangePassword = 90,
    UserPresenceRequest = 97,
    ToggleBlockNonFriendPM = 99,
}

impl ClientPacketId {
    pub fn from_u16(v: u16) -> Option<Self> {
        use ClientPacketId::*;
        Some(match v {
            0 => ChangeAction,
            1 => PublicMessage,
            2 => Logout,
            3 => StatsUpdateReq,
            4 => Ping,
            16 => StartSpectate,
            17 => StopSpectate,
            18 => SpectateFrames,
            21 => CantSpectate,
            25 => PrivateMessage,
            29 => PartLobby,
            30 => JoinLobby,
            31 => CreateMatch,
            32 => JoinMatch,
            33 => PartMatch,
            38 => MatchChangeSlot,
            39 => MatchReady,
            40 => MatchLock,
            41 => MatchChangeSettings,
            44 => MatchStart,
            48 => MatchScoreUpdate,
            49 => MatchComplete,
            51 => MatchChangeMods,
            52 => MatchLoadComplete,
            54 => MatchNoBeatmap,
            55 => MatchNotReady,
            56 => MatchFailed,
            59 => MatchHasBeatmap,
            60 => MatchSkipRequest,
            63 => ChannelJoin,
            70 => MatchTransferHost,
            73 => FriendAdd,
            74 => FriendRemove,
            77 => MatchChangeTeam,
            78 => ChannelPart,
            79 => ReceiveUpdates,
            82 => SetAwayMessage,
            85 => UserStatsRequest,
            87 => MatchInvite,
            90 => MatchChangePassword,
            97 => UserPresenceRequest,
            99 => ToggleBlockNonFriendPM,
            _ => return None,
        })
    }
}

/// Payload of `ChangeAction` (packet 0): actionType, infotext, beatmap md5,
/// mods, gamemode, beatmapid.
#[derive(Debug, Clone)]
pub struct ChangeActionPayload {
    pub action: u8,
    pub info_text: String,
    pub map_md5: String,
    pub mods: u32,
    pub game_mode: u8,
    pub map_id: i32,
}

impl ChangeActionPayload {
    pub fn read(r: &mut PayloadReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            action: r.read_u8()?,
            info_text: r.read_string()?,
            map_md5: r.read_string()?,
            mods: r.read_u32()?,
            game_mode: r.read_u8()?,
            map_id: r.read_i32()?,
        })
    }
}
