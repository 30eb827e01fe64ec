//! Packet id → handler dispatch. Handlers are uniform
//! `(ctx, player, reader) -> ()`: failures are logged and swallowed here,
//! never surfaced as an HTTP error.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::channel;
use crate::chat;
use crate::codec::client::{ChangeActionPayload, ClientPacketId};
use crate::codec::{server, PayloadReader};
use crate::context::BanchoContext;
use crate::lifecycle;
use crate::match_state::Match;
use crate::model::action::PresenceFilter;
use crate::player::Player;
use crate::spectator;

/// Logout packets arriving within this long of login are ignored — the
/// client is known to immediately re-send one right after a successful
/// login.
const DOUBLE_LOGOUT_GUARD_SECS: i64 = 2;

async fn resolve_match(ctx: &BanchoContext, player: &Player) -> Option<Arc<Match>> {
    let Some(match_id) = player.match_id().await else {
        debug!(player = player.id, "match handler invoked but player is not in a match");
        return None;
    };
    ctx.matches.get(match_id).await
}

/// Mirrors a slot transition's `MatchUpdate` out to lobby subscribers, for
/// every transition except the handful the wire protocol keeps quiet
/// (NotReady, Start, LoadComplete, ScoreUpdate, ChangePassword — those
/// stay local to the match's own occupants).
async fn notify_lobby(ctx: &BanchoContext, m: &Match) {
    ctx.matches.broadcast_to_lobby(&ctx.roster, &server::update_match(&m.wire().await)).await;
}

pub async fn dispatch(ctx: &BanchoContext, player: &Arc<Player>, packet_id: u16, payload: &[u8]) {
    let Some(id) = ClientPacketId::from_u16(packet_id) else {
        debug!(packet_id, "unknown client packet id, skipping");
        return;
    };
    let mut r = PayloadReader::new(payload);
    if let Err(err) = handle(ctx, player, id, &mut r).await {
        warn!(player = player.id, packet = ?id, error = %err, "handler failed");
    }
}

async fn handle(ctx: &BanchoContext, player: &Arc<Player>, id: ClientPacketId, r: &mut PayloadReader<'_>) -> Result<(), Box<dyn std::error::Error>> {
    use ClientPacketId::*;
    match id {
        ChangeAction => {
            let payload = ChangeActionPayload::read(r)?;
            {
                let mut s = player.state_mut().await;
                s.action = payload.action;
                s.info_text = payload.info_text;
                s.map_md5 = payload.map_md5;
                s.mods = payload.mods;
                s.game_mode = payload.game_mode;
                s.map_id = payload.map_id;
            }
        },
        PublicMessage => {
            let msg = r.read_message()?;
            chat::send_public(ctx, player, &msg.target, &msg.text).await?;
        },
        Logout => {
            let now = chrono::Utc::now();
            if player.seconds_since_login(now).await < DOUBLE_LOGOUT_GUARD_SECS {
                debug!(player = player.id, "ignoring logout within double-logout guard window");
                return Ok(());
            }
            lifecycle::logout(ctx, player).await;
        },
        StatsUpdateReq => {
            // Legacy client-initiated refresh request; no server action needed.
        },
        Ping => {
            player.enqueue(&server::pong()).await;
        },
        StartSpectate => {
            let host_id = r.read_i32()?;
            if let Some(host) = ctx.roster.lookup_by_id(host_id).await {
                spectator::add_spectator(&ctx.channels, &ctx.roster, &host, player).await?;
            }
        },
        StopSpectate => {
            if let Some(host_id) = player.spectating().await {
                if let Some(host) = ctx.roster.lookup_by_id(host_id).await {
                    spectator::remove_spectator(&ctx.channels, &ctx.roster, &host, player).await?;
                }
            }
        },
        SpectateFrames => {
            let raw = r.rest().to_vec();
            spectator::relay_frames(&ctx.roster, player, &raw).await;
        },
        CantSpectate => {
            if let Some(host_id) = player.spectating().await {
                if let Some(host) = ctx.roster.lookup_by_id(host_id).await {
                    spectator::relay_cant_spectate(&ctx.roster, &host, player.id).await;
                }
            }
        },
        PrivateMessage => {
            let msg = r.read_message()?;
            chat::send_private(ctx, player, &msg.target, &msg.text).await?;
        },
        PartLobby => {
            player.state_mut().await.in_lobby = false;
        },
        JoinLobby => {
            player.state_mut().await.in_lobby = true;
            for m in ctx.matches.all().await {
                player.enqueue(&server::new_match(&m.wire().await)).await;
            }
        },
        CreateMatch => {
            let wire = crate::codec::match_wire::MatchWire::read(r)?;
            let password = (!wire.password.is_empty()).then_some(wire.password);
            ctx.matches.create(&ctx.channels, &ctx.roster, player, wire.name, password, wire.game_mode).await?;
        },
        JoinMatch => {
            let match_id = r.read_i32()?;
            let password = r.read_string().unwrap_or_default();
            match ctx.matches.get(match_id).await {
                Some(m) => {
                    let needs_password = {
                        let wire = m.wire().await;
                        !wire.password.is_empty() && wire.password != password
                    };
                    if needs_password {
                        player.enqueue(&server::match_join_fail()).await;
                    } else {
                        ctx.matches.join(&ctx.channels, &ctx.roster, match_id, player).await?;
                    }
                },
                None => player.enqueue(&server::match_join_fail()).await,
            }
        },
        PartMatch => {
            if let Some(match_id) = player.match_id().await {
                ctx.matches.leave(&ctx.channels, &ctx.roster, match_id, player).await?;
            }
        },
        MatchChangeSlot => {
            let to = r.read_i32()?;
            if let Some(m) = resolve_match(ctx, player).await {
                m.change_slot(&ctx.roster, player.id, to.max(0) as usize).await?;
                notify_lobby(ctx, &m).await;
            }
        },
        MatchReady => {
            if let Some(m) = resolve_match(ctx, player).await {
                m.ready(&ctx.roster, player.id).await?;
                notify_lobby(ctx, &m).await;
            }
        },
        MatchLock => {
            let slot = r.read_i32()?;
            if let Some(m) = resolve_match(ctx, player).await {
                m.lock_slot(&ctx.roster, player.id, slot.max(0) as usize).await?;
                notify_lobby(ctx, &m).await;
            }
        },
        MatchChangeSettings => {
            let wire = crate::codec::match_wire::MatchWire::read(r)?;
            if let Some(m) = resolve_match(ctx, player).await {
                let new_map = (!wire.map_md5.is_empty()).then_some((wire.map_name, wire.map_id, wire.map_md5));
                m.change_settings(
                    &ctx.roster,
                    player.id,
                    wire.name,
                    new_map,
                    wire.game_mode,
                    crate::model::TeamType::from_u8(wire.team_type),
                    crate::model::ScoringType::from_u8(wire.scoring_type),
                )
                .await?;
                if m.wire().await.freemods != wire.freemods {
                    m.set_freemods(&ctx.roster, player.id, wire.freemods).await?;
                }
                notify_lobby(ctx, &m).await;
            }
        },
        MatchStart => {
            if let Some(m) = resolve_match(ctx, player).await {
                m.start(&ctx.roster, player.id).await?;
            }
        },
        MatchScoreUpdate => {
            let frame = r.rest().to_vec();
            if let Some(m) = resolve_match(ctx, player).await {
                m.score_update(&ctx.roster, player.id, frame).await?;
            }
        },
        MatchComplete => {
            if let Some(m) = resolve_match(ctx, player).await {
                m.complete(&ctx.roster, player.id).await?;
                notify_lobby(ctx, &m).await;
            }
        },
        MatchChangeMods => {
            let mods = r.read_u32()?;
            if let Some(m) = resolve_match(ctx, player).await {
                m.change_mods(&ctx.roster, player.id, mods).await?;
                notify_lobby(ctx, &m).await;
            }
        },
        MatchLoadComplete => {
            if let Some(m) = resolve_match(ctx, player).await {
                m.load_complete(&ctx.roster, player.id).await?;
            }
        },
        MatchNoBeatmap => {
            if let Some(m) = resolve_match(ctx, player).await {
                m.no_map(&ctx.roster, player.id).await?;
                notify_lobby(ctx, &m).await;
            }
        },
        MatchNotReady => {
            if let Some(m) = resolve_match(ctx, player).await {
                m.not_ready(&ctx.roster, player.id).await?;
            }
        },
        MatchFailed => {
            if let Some(m) = resolve_match(ctx, player).await {
                m.failed(&ctx.roster, player.id).await?;
                notify_lobby(ctx, &m).await;
            }
        },
        MatchHasBeatmap => {
            if let Some(m) = resolve_match(ctx, player).await {
                m.has_map(&ctx.roster, player.id).await?;
                notify_lobby(ctx, &m).await;
            }
        },
        MatchSkipRequest => {
            if let Some(m) = resolve_match(ctx, player).await {
                m.skip_request(&ctx.roster, player.id).await?;
                notify_lobby(ctx, &m).await;
            }
        },
        ChannelJoin => {
            let name = r.read_string()?;
            channel::join_channel(&ctx.channels, &ctx.roster, player, &name).await?;
        },
        MatchTransferHost => {
            let slot = r.read_i32()?;
            if let Some(m) = resolve_match(ctx, player).await {
                m.transfer_host(&ctx.roster, player.id, slot.max(0) as usize).await?;
                notify_lobby(ctx, &m).await;
            }
        },
        FriendAdd => {
            let target_id = r.read_i32()?;
            if target_id != ctx.bot_id {
                player.add_friend(target_id).await;
            }
        },
        FriendRemove => {
            let target_id = r.read_i32()?;
            if target_id != ctx.bot_id {
                player.remove_friend(target_id).await;
            }
        },
        MatchChangeTeam => {
            if let Some(m) = resolve_match(ctx, player).await {
                m.change_team(&ctx.roster, player.id).await?;
                notify_lobby(ctx, &m).await;
            }
        },
        ChannelPart => {
            let name = r.read_string()?;
            if !name.is_empty() {
                channel::leave_channel(&ctx.channels, &ctx.roster, player, &name).await?;
            }
        },
        ReceiveUpdates => {
            let value = r.read_i32()?;
            if let Some(filter) = PresenceFilter::from_i32(value) {
                player.state_mut().await.presence_filter = filter;
            }
        },
        SetAwayMessage => {
            let msg = r.read_string()?;
            player.state_mut().await.away_msg = (!msg.is_empty()).then_some(msg);
        },
        UserStatsRequest => {
            if r.remaining() < 6 {
                return Ok(());
            }
            let ids = r.read_i32_list()?;
            for id in ids {
                if let Some(other) = ctx.roster.lookup_by_id(id).await {
                    let s = other.state().await;
                    let stats = ctx.store.load_stats(other.id).await.unwrap_or_default();
                    player
                        .enqueue(&server::user_stats(other.id, s.action, &s.info_text, &s.map_md5, s.mods, s.game_mode, s.map_id, stats.ranked_score, stats.accuracy, stats.play_count, stats.total_score, stats.rank, stats.pp))
                        .await;
                }
            }
        },
        MatchInvite => {
            let target_id = r.read_i32()?;
            if let Some(target) = ctx.roster.lookup_by_id(target_id).await {
                let embed = format!("Come join my multiplayer match: [osump://{}/ {}]", player.match_id().await.unwrap_or(0), player.name);
                chat::send_private(ctx, player, &target.name, &embed).await?;
            }
        },
        MatchChangePassword => {
            let wire = crate::codec::match_wire::MatchWire::read(r)?;
            if let Some(m) = resolve_match(ctx, player).await {
                let new_password = (!wire.password.is_empty()).then_some(wire.password);
                m.change_password(&ctx.roster, player.id, new_password).await?;
            }
        },
        UserPresenceRequest => {
            let ids = r.read_i32_list()?;
            for id in ids {
                if let Some(other) = ctx.roster.lookup_by_id(id).await {
                    let s = other.state().await;
                    let stats = ctx.store.load_stats(other.id).await.unwrap_or_default();
                    player.enqueue(&server::user_presence(other.id, &other.name, s.utc_offset, 0, 0, 0.0, 0.0, stats.rank)).await;
                }
            }
        },
        ToggleBlockNonFriendPM => {
            let value = r.read_i32().unwrap_or(0);
            player.state_mut().await.pm_private = value != 0;
        },
    }
    Ok(())
}
