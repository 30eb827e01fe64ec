//! Server → client packet ids and encoders. Builders take
//! plain primitives rather than world-model types (`Player`, `Match`) so the
//! codec stays free of a dependency on the registries.

use super::{match_wire::MatchWire, ClientMessage, PayloadWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ServerPacketId {
    UserId = 5,
    SendMessage = 7,
    Pong = 8,
    UserStats = 11,
    Logout = 12,
    HostSpectatorJoined = 13,
    SpectatorLeft = 14,
    SpectateFrames = 15,
    SpectatorCantSpectate = 22,
    GetAttention = 23,
    Notification = 24,
    MatchUpdate = 26,
    MatchNew = 27,
    MatchDisband = 28,
    MatchJoinSuccess = 36,
    MatchJoinFail = 37,
    SpectatorJoined = 42,
    MatchStart = 46,
    MatchTransferHost = 50,
    MatchAllPlayersLoaded = 53,
    MatchPlayerFailed = 57,
    MatchComplete = 58,
    MatchSkip = 61,
    ChannelJoin = 64,
    ChannelInfo = 65,
    ChannelKick = 66,
    BanchoPrivileges = 71,
    FriendsList = 72,
    ProtocolVersion = 75,
    MainMenuIcon = 76,
    MatchPlayerSkipped = 81,
    UserPresence = 83,
    ChannelInfoEnd = 89,
    SilenceEnd = 92,
    UserPMBlocked = 100,
    TargetSilenced = 101,
}

fn frame(id: ServerPacketId, payload: PayloadWriter) -> Vec<u8> {
    super::encode_frame(id as u16, &payload.into_payload())
}

pub fn user_id(id: i32) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_i32(id);
    frame(ServerPacketId::UserId, w)
}

pub fn protocol_version(version: i32) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_i32(version);
    frame(ServerPacketId::ProtocolVersion, w)
}

pub fn bancho_privileges(priv_bits: i32) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_i32(priv_bits);
    frame(ServerPacketId::BanchoPrivileges, w)
}

pub fn notification(message: &str) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_string(message);
    frame(ServerPacketId::Notification, w)
}

pub fn get_attention() -> Vec<u8> {
    frame(ServerPacketId::GetAttention, PayloadWriter::new())
}

pub fn channel_info_end() -> Vec<u8> {
    frame(ServerPacketId::ChannelInfoEnd, PayloadWriter::new())
}

pub fn channel_join(name: &str) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_string(name);
    frame(ServerPacketId::ChannelJoin, w)
}

pub fn channel_kick(name: &str) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_string(name);
    frame(ServerPacketId::ChannelKick, w)
}

/// `name, topic, member_count`.
pub fn channel_info(name: &str, topic: &str, member_count: i16) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_string(name);
    w.write_string(topic);
    w.write_i16(member_count);
    frame(ServerPacketId::ChannelInfo, w)
}

pub fn main_menu_icon(icon_url: &str, click_url: &str) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_string(&format!("{icon_url}|{click_url}"));
    frame(ServerPacketId::MainMenuIcon, w)
}

pub fn friends_list(friend_ids: &[i32]) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_i32_list(friend_ids);
    frame(ServerPacketId::FriendsList, w)
}

pub fn silence_end(seconds_remaining: i32) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_i32(seconds_remaining);
    frame(ServerPacketId::SilenceEnd, w)
}

pub fn server_logout(user_id: i32) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_i32(user_id);
    w.write_u8(0);
    frame(ServerPacketId::Logout, w)
}

pub fn pong() -> Vec<u8> {
    frame(ServerPacketId::Pong, PayloadWriter::new())
}

/// User presence (id, name, utc_offset, country, bancho_priv|mode, x, y, rank).
#[allow(clippy::too_many_arguments)]
pub fn user_presence(
    id: i32,
    name: &str,
    utc_offset: u8,
    country_code: u8,
    bancho_priv_and_mode: u8,
    longitude: f32,
    latitude: f32,
    rank: i32,
) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_i32(id);
    w.write_string(name);
    w.write_u8(utc_offset + 24);
    w.write_u8(country_code);
    w.write_u8(bancho_priv_and_mode);
    w.write_f32_as_raw(longitude);
    w.write_f32_as_raw(latitude);
    w.write_i32(rank);
    frame(ServerPacketId::UserPresence, w)
}

/// User stats (id, action, info_text, map_md5, mods, mode, map_id, ranked_score,
/// accuracy, play_count, total_score, rank, pp).
#[allow(clippy::too_many_arguments)]
pub fn user_stats(
    id: i32,
    action: u8,
    info_text: &str,
    map_md5: &str,
    mods: u32,
    mode: u8,
    map_id: i32,
    ranked_score: i64,
    accuracy: f32,
    play_count: i32,
    total_score: i64,
    rank: i32,
    pp: i16,
) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_i32(id);
    w.write_u8(action);
    w.write_string(info_text);
    w.write_string(map_md5);
    w.write_u32(mods);
    w.write_u8(mode);
    w.write_i32(map_id);
    w.write_u64_as_raw(ranked_score as u64);
    w.write_f32_as_raw(accuracy / 100.0);
    w.write_i32(play_count);
    w.write_u64_as_raw(total_score as u64);
    w.write_i32(rank);
    w.write_i16(pp);
    frame(ServerPacketId::UserStats, w)
}

pub fn send_message(msg: &ClientMessage) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_message(msg);
    frame(ServerPacketId::SendMessage, w)
}

pub fn user_pm_blocked(target_name: &str) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_message(&ClientMessage {
        sender: String::new(),
        text: String::new(),
        target: target_name.to_string(),
        sender_id: 0,
    });
    frame(ServerPacketId::UserPMBlocked, w)
}

pub fn target_silenced(target_name: &str) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_message(&ClientMessage {
        sender: String::new(),
        text: String::new(),
        target: target_name.to_string(),
        sender_id: 0,
    });
    frame(ServerPacketId::TargetSilenced, w)
}

pub fn spectator_joined(follower_id: i32) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_i32(follower_id);
    frame(ServerPacketId::SpectatorJoined, w)
}

pub fn host_spectator_joined(follower_id: i32) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_i32(follower_id);
    frame(ServerPacketId::HostSpectatorJoined, w)
}

pub fn spectator_left(follower_id: i32) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_i32(follower_id);
    frame(ServerPacketId::SpectatorLeft, w)
}

/// Frames are re-broadcast verbatim; this just wraps them.
pub fn spectate_frames(raw: &[u8]) -> Vec<u8> {
    super::encode_frame(ServerPacketId::SpectateFrames as u16, raw)
}

pub fn spectator_cant_spectate(player_id: i32) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_i32(player_id);
    frame(ServerPacketId::SpectatorCantSpectate, w)
}

pub fn new_match(m: &MatchWire) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    m.write(&mut w);
    frame(ServerPacketId::MatchNew, w)
}

pub fn update_match(m: &MatchWire) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    m.write(&mut w);
    frame(ServerPacketId::MatchUpdate, w)
}

pub fn match_join_success(m: &MatchWire) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    m.write(&mut w);
    frame(ServerPacketId::MatchJoinSuccess, w)
}

pub fn match_join_fail() -> Vec<u8> {
    frame(ServerPacketId::MatchJoinFail, PayloadWriter::new())
}

pub fn disband_match(match_id: i32) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_i32(match_id);
    frame(ServerPacketId::MatchDisband, w)
}

pub fn match_start(m: &MatchWire) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    m.write(&mut w);
    frame(ServerPacketId::MatchStart, w)
}

pub fn match_complete() -> Vec<u8> {
    frame(ServerPacketId::MatchComplete, PayloadWriter::new())
}

pub fn match_all_players_loaded() -> Vec<u8> {
    frame(ServerPacketId::MatchAllPlayersLoaded, PayloadWriter::new())
}

pub fn match_player_skipped(slot_id: i32) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_i32(slot_id);
    frame(ServerPacketId::MatchPlayerSkipped, w)
}

pub fn match_skip() -> Vec<u8> {
    frame(ServerPacketId::MatchSkip, PayloadWriter::new())
}

pub fn match_transfer_host() -> Vec<u8> {
    frame(ServerPacketId::MatchTransferHost, PayloadWriter::new())
}

pub fn match_player_failed(slot_id: i32) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_i32(slot_id);
    frame(ServerPacketId::MatchPlayerFailed, w)
}
