//! Public and private message routing, plus an away-message auto-reply:
//! messaging a player whose action is `Afk` with an away message set gets
//! that message echoed back before the normal send continues.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::codec::{server, ClientMessage};
use crate::context::BanchoContext;
use crate::error::{BanchoError, BanchoResult};
use crate::model::action::Action;
use crate::player::Player;

/// Messages longer than this are truncated to `TRUNCATE_KEEP` bytes (on a
/// char boundary) with an appended `"..."`.
const TRUNCATE_LIMIT: usize = 2048;
const TRUNCATE_KEEP: usize = 2045;

fn truncate_message(text: &str) -> String {
    if text.len() <= TRUNCATE_LIMIT {
        return text.to_string();
    }
    let mut end = TRUNCATE_KEEP.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Recognizes the osu! now-playing chat convention (an `/np`-style action
/// message embedding a beatmap link) and extracts the beatmap id.
static NOW_PLAYING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https://osu\.ppy\.sh/(?:b|beatmapsets/\d+#\w+)/(\d+)").unwrap());

async fn bind_now_playing(player: &Player, text: &str) {
    if let Some(caps) = NOW_PLAYING_RE.captures(text) {
        if let Ok(bid) = caps[1].parse::<i32>() {
            player.state_mut().await.last_np = Some(bid);
        }
    }
}

async fn resolve_public_target(sender: &Player, target: &str) -> BanchoResult<String> {
    Ok(match target {
        "#spectator" => {
            let host_id = sender.spectating().await.unwrap_or(sender.id);
            crate::channel::spec_channel_name(host_id)
        },
        "#multiplayer" => {
            let match_id = sender.match_id().await.ok_or(BanchoError::NoSuchChannel)?;
            crate::channel::multi_channel_name(match_id)
        },
        other => other.to_string(),
    })
}

async fn deliver_to_channel(ctx: &BanchoContext, channel_name: &str, sender_name: &str, sender_id: i32, text: &str) {
    let Some(channel) = ctx.channels.get(channel_name).await else { return };
    let msg = ClientMessage { sender: sender_name.to_string(), text: text.to_string(), target: channel_name.to_string(), sender_id };
    let packet = server::send_message(&msg);
    for member_id in channel.members().await {
        if member_id == sender_id {
            continue;
        }
        if let Some(member) = ctx.roster.lookup_by_id(member_id).await {
            member.enqueue(&packet).await;
        }
    }
}

async fn deliver_to_staff_and_invoker(ctx: &BanchoContext, sender: &Player, text: &str, target_channel: &str) {
    let msg = ClientMessage { sender: "BanchoBot".to_string(), text: text.to_string(), target: target_channel.to_string(), sender_id: ctx.bot_id };
    let packet = server::send_message(&msg);
    sender.enqueue(&packet).await;
    for staff in ctx.roster.staff().await {
        if staff.id != sender.id {
            staff.enqueue(&packet).await;
        }
    }
}

/// Sends a public message to a channel (or a symbolic `#spectator`/
/// `#multiplayer` target), handing command-prefixed text to the command
/// processor collaborator instead of broadcasting it.
pub async fn send_public(ctx: &BanchoContext, sender: &Arc<Player>, target: &str, text: &str) -> BanchoResult<()> {
    if sender.state().await.is_silenced(chrono::Utc::now()) {
        return Err(BanchoError::Silenced);
    }

    let channel_name = resolve_public_target(sender, target).await?;
    let channel = ctx.channels.get(&channel_name).await.ok_or(BanchoError::NoSuchChannel)?;
    if !channel.can_write(sender.priv_bits) {
        return Err(BanchoError::Denied);
    }

    let text = truncate_message(text);
    bind_now_playing(sender, &text).await;

    if let Some(rest) = text.strip_prefix(&ctx.config.command_prefix) {
        let outcome = ctx.commands.process(sender.id, &channel_name, rest).await;
        if let Some(resp) = outcome.response {
            if outcome.public {
                deliver_to_channel(ctx, &channel_name, "BanchoBot", ctx.bot_id, &resp).await;
            } else {
                deliver_to_staff_and_invoker(ctx, sender, &resp, &channel_name).await;
            }
        }
        return Ok(());
    }

    deliver_to_channel(ctx, &channel_name, &sender.name, sender.id, &text).await;
    Ok(())
}

/// Estimated performance points at the accuracies the bot reports for a
/// now-playing query. The real computation belongs to the out-of-scope
/// PP calculator; this is a placeholder the collaborator can
/// override once wired to a real one.
const NOW_PLAYING_ACCURACIES: [f32; 5] = [90.0, 95.0, 98.0, 99.0, 100.0];

async fn bot_now_playing_reply(ctx: &BanchoContext, bid: i32) -> String {
    let Some(map) = ctx.beatmaps.beatmap_from_bid(bid).await else {
        return "No information found for that beatmap.".to_string();
    };
    let estimates = NOW_PLAYING_ACCURACIES.iter().map(|acc| format!("{acc:.0}%: 0pp")).collect::<Vec<_>>().join(" | ");
    format!("{}: {}", map.name, estimates)
}

/// Sends a point-to-point message, applying the away-message auto-reply,
/// blocking/silence capability checks, and bot routing.
pub async fn send_private(ctx: &BanchoContext, sender: &Arc<Player>, target_name: &str, text: &str) -> BanchoResult<()> {
    if sender.state().await.is_silenced(chrono::Utc::now()) {
        return Err(BanchoError::Silenced);
    }

    let text = truncate_message(text);
    bind_now_playing(sender, &text).await;

    let target = ctx.roster.lookup_by_name(target_name).await.ok_or(BanchoError::NoSuchUser)?;

    if target.id == ctx.bot_id {
        let reply = match sender.state().await.last_np {
            Some(bid) => bot_now_playing_reply(ctx, bid).await,
            None => {
                let outcome = ctx.commands.process(sender.id, &sender.name, &text).await;
                outcome.response.unwrap_or_default()
            },
        };
        if !reply.is_empty() {
            let msg = ClientMessage { sender: "BanchoBot".to_string(), text: reply, target: sender.name.clone(), sender_id: ctx.bot_id };
            sender.enqueue(&server::send_message(&msg)).await;
        }
        return Ok(());
    }

    {
        let target_state = target.state().await;
        if target_state.action == Action::Afk.val() {
            if let Some(away_msg) = &target_state.away_msg {
                let msg = ClientMessage { sender: target.name.clone(), text: away_msg.clone(), target: sender.name.clone(), sender_id: target.id };
                sender.enqueue(&server::send_message(&msg)).await;
            }
        }
    }

    let target_state = target.state().await;
    if target_state.pm_private && sender.id != target.id && !target.is_friend(sender.id).await {
        sender.enqueue(&server::user_pm_blocked(&target.name)).await;
        return Err(BanchoError::Blocking);
    }
    if target_state.is_silenced(chrono::Utc::now()) {
        sender.enqueue(&server::target_silenced(&target.name)).await;
        return Err(BanchoError::Silenced);
    }
    drop(target_state);

    let msg = ClientMessage { sender: sender.name.clone(), text, target: target.name.clone(), sender_id: sender.id };
    target.enqueue(&server::send_message(&msg)).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::collaborators::stub::{InMemoryStore, NoopBeatmapFetcher, NoopCommandProcessor};
    use crate::config::BanchoConfig;
    use crate::model::privileges;
    use async_trait::async_trait;
    use chrono::Utc;

    struct NoopGeo;
    #[async_trait]
    impl crate::collaborators::Geolocator for NoopGeo {
        async fn locate(&self, _ip: std::net::IpAddr) -> Option<u8> {
            None
        }
    }

    async fn context() -> BanchoContext {
        let ctx = BanchoContext::new(
            Arc::new(BanchoConfig::default()),
            Arc::new(InMemoryStore::default()),
            Arc::new(NoopGeo),
            Arc::new(NoopCommandProcessor),
            Arc::new(NoopBeatmapFetcher),
            -1,
        );
        ctx.channels.insert(Channel::new("#osu", "general chat", true)).await;
        ctx
    }

    fn player(id: i32, name: &str, silence_end: i64) -> Arc<Player> {
        Arc::new(Player::new(id, name.to_string(), format!("tok-{id}"), "h".into(), privileges::Normal, 0, false, silence_end, Utc::now()))
    }

    #[tokio::test]
    async fn silenced_sender_is_rejected_before_public_send() {
        let ctx = context().await;
        let sender = player(1, "naughty", Utc::now().timestamp() + 60);
        crate::channel::join_channel(&ctx.channels, &ctx.roster, &sender, "#osu").await.unwrap();

        let err = send_public(&ctx, &sender, "#osu", "hello").await.unwrap_err();
        assert!(matches!(err, BanchoError::Silenced));
    }

    #[tokio::test]
    async fn silenced_sender_is_rejected_before_private_send() {
        let ctx = context().await;
        let sender = player(1, "naughty", Utc::now().timestamp() + 60);
        let target = player(2, "victim", 0);
        ctx.roster.add(target).await;

        let err = send_private(&ctx, &sender, "victim", "hello").await.unwrap_err();
        assert!(matches!(err, BanchoError::Silenced));
    }

    #[test]
    fn oversize_message_truncated_to_2048_bytes() {
        let input = "x".repeat(4000);
        let out = truncate_message(&input);
        assert_eq!(out.len(), 2048);
        assert_eq!(out, format!("{}...", "x".repeat(2045)));
    }

    #[test]
    fn short_message_passes_through_unchanged() {
        assert_eq!(truncate_message("hello"), "hello");
    }

    #[test]
    fn now_playing_pattern_extracts_beatmap_id() {
        let text = "is playing [https://osu.ppy.sh/b/75 Artist - Song [Hard]]";
        let caps = NOW_PLAYING_RE.captures(text).unwrap();
        assert_eq!(&caps[1], "75");
    }
}
