//! Named chat rooms and their registry.
//!
//! Channels beginning with `#spec_` or `#multi_` are dynamic: created on
//! demand by the spectator/match modules and disposed of when their last
//! member leaves, rather than configured up front.

use std::collections::HashMap;
use std::collections::HashSet as StdHashSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::codec::server;
use crate::error::{BanchoError, BanchoResult};
use crate::model::privileges::{self, PrivBits};
use crate::player::Player;
use crate::roster::Roster;

pub struct Channel {
    pub name: String,
    pub topic: String,
    pub read_priv: PrivBits,
    pub write_priv: PrivBits,
    pub auto_join: bool,
    members: RwLock<StdHashSet<i32>>,
}

impl Channel {
    pub fn new(name: impl Into<String>, topic: impl Into<String>, auto_join: bool) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            read_priv: privileges::Normal,
            write_priv: privileges::Normal,
            auto_join,
            members: RwLock::new(StdHashSet::new()),
        }
    }

    pub fn staff_only(name: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            read_priv: privileges::Staff,
            write_priv: privileges::Staff,
            auto_join: false,
            members: RwLock::new(StdHashSet::new()),
        }
    }

    pub fn can_read(&self, priv_bits: PrivBits) -> bool {
        privileges::has_any(priv_bits, self.read_priv)
    }

    pub fn can_write(&self, priv_bits: PrivBits) -> bool {
        privileges::has_any(priv_bits, self.write_priv)
    }

    pub async fn members(&self) -> Vec<i32> {
        self.members.read().await.iter().copied().collect()
    }

    pub async fn member_count(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn contains(&self, player_id: i32) -> bool {
        self.members.read().await.contains(&player_id)
    }

    async fn insert(&self, player_id: i32) -> bool {
        self.members.write().await.insert(player_id)
    }

    async fn remove(&self, player_id: i32) -> bool {
        self.members.write().await.remove(&player_id)
    }

    pub fn info_packet(&self, member_count: usize) -> Vec<u8> {
        server::channel_info(&self.name, &self.topic, member_count as i16)
    }
}

pub fn spec_channel_name(host_id: i32) -> String {
    format!("#spec_{host_id}")
}

pub fn multi_channel_name(match_id: i32) -> String {
    format!("#multi_{match_id}")
}

#[derive(Default)]
pub struct ChannelRegistry {
    channels: RwLock<HashMap<String, Arc<Channel>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, channel: Channel) -> Arc<Channel> {
        let arc = Arc::new(channel);
        self.channels.write().await.insert(arc.name.clone(), arc.clone());
        arc
    }

    pub async fn get(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.read().await.get(name).cloned()
    }

    pub async fn remove(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.write().await.remove(name)
    }

    pub async fn all(&self) -> Vec<Arc<Channel>> {
        self.channels.read().await.values().cloned().collect()
    }

    pub async fn auto_join_channels(&self) -> Vec<Arc<Channel>> {
        self.all().await.into_iter().filter(|c| c.auto_join).collect()
    }

    /// Fetches the host's spectator channel, creating it if this is the
    /// first follower.
    pub async fn get_or_create_spec_channel(&self, host_id: i32) -> Arc<Channel> {
        let name = spec_channel_name(host_id);
        if let Some(c) = self.get(&name).await {
            return c;
        }
        self.insert(Channel::new(name, "spectator chat", false)).await
    }

    /// Fetches the match's chat channel, creating it if the match was just
    /// allocated.
    pub async fn get_or_create_multi_channel(&self, match_id: i32) -> Arc<Channel> {
        let name = multi_channel_name(match_id);
        if let Some(c) = self.get(&name).await {
            return c;
        }
        self.insert(Channel::new(name, "multiplayer chat", false)).await
    }
}

/// Adds `player` to `channel_name`: capability-checks, updates membership,
/// enqueues a join ack to the player, and broadcasts the channel's updated
/// member count to everyone online.
pub async fn join_channel(
    registry: &ChannelRegistry,
    roster: &Roster,
    player: &Player,
    channel_name: &str,
) -> BanchoResult<()> {
    let channel = registry.get(channel_name).await.ok_or(BanchoError::NoSuchChannel)?;
    if !channel.can_read(player.priv_bits) {
        return Err(BanchoError::Denied);
    }
    if !channel.insert(player.id).await {
        return Err(BanchoError::AlreadyMember);
    }
    player.note_channel_joined(channel_name).await;
    player.enqueue(&server::channel_join(channel_name)).await;
    let count = channel.member_count().await;
    roster.broadcast(&channel.info_packet(count), &[]).await;
    Ok(())
}

/// Removes `player` from `channel_name`. Idempotent: leaving a channel the
/// player is not in is a silent no-op.
pub async fn leave_channel(
    registry: &ChannelRegistry,
    roster: &Roster,
    player: &Player,
    channel_name: &str,
) -> BanchoResult<()> {
    let Some(channel) = registry.get(channel_name).await else {
        return Ok(());
    };
    if !channel.remove(player.id).await {
        return Ok(());
    }
    player.note_channel_left(channel_name).await;
    player.enqueue(&server::channel_kick(channel_name)).await;
    let count = channel.member_count().await;
    roster.broadcast(&channel.info_packet(count), &[]).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::privileges;
    use chrono::Utc;

    fn player(id: i32, name: &str) -> Player {
        Player::new(id, name.to_string(), format!("tok-{id}"), "h".into(), privileges::Normal, 0, false, 0, Utc::now())
    }

    #[tokio::test]
    async fn join_then_duplicate_join_is_already_member() {
        let registry = ChannelRegistry::new();
        registry.insert(Channel::new("#osu", "general", true)).await;
        let roster = Roster::new();
        let p = player(1, "a");

        join_channel(&registry, &roster, &p, "#osu").await.unwrap();
        assert!(p.in_channel("#osu").await);

        let err = join_channel(&registry, &roster, &p, "#osu").await.unwrap_err();
        assert!(matches!(err, BanchoError::AlreadyMember));
    }

    #[tokio::test]
    async fn join_missing_channel_is_no_such_channel() {
        let registry = ChannelRegistry::new();
        let roster = Roster::new();
        let p = player(1, "a");
        let err = join_channel(&registry, &roster, &p, "#ghost").await.unwrap_err();
        assert!(matches!(err, BanchoError::NoSuchChannel));
    }

    #[tokio::test]
    async fn join_without_read_priv_is_denied() {
        let registry = ChannelRegistry::new();
        registry.insert(Channel::staff_only("#staff", "staff chat")).await;
        let roster = Roster::new();
        let p = player(1, "a");
        let err = join_channel(&registry, &roster, &p, "#staff").await.unwrap_err();
        assert!(matches!(err, BanchoError::Denied));
    }

    #[tokio::test]
    async fn leave_non_member_is_silent_no_op() {
        let registry = ChannelRegistry::new();
        registry.insert(Channel::new("#osu", "general", true)).await;
        let roster = Roster::new();
        let p = player(1, "a");
        leave_channel(&registry, &roster, &p, "#osu").await.unwrap();
    }
}
