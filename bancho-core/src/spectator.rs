//! Host → followers fan-out of live play frames.

use std::sync::Arc;

use crate::channel::{self, ChannelRegistry};
use crate::codec::server;
use crate::error::BanchoResult;
use crate::player::Player;
use crate::roster::Roster;

/// A follower joins `host`'s spectator group: allocates (or reuses) the
/// `#spec_<host.id>` channel, notifies the host and existing followers.
pub async fn add_spectator(
    registry: &ChannelRegistry,
    roster: &Roster,
    host: &Arc<Player>,
    follower: &Arc<Player>,
) -> BanchoResult<()> {
    let spec_channel = registry.get_or_create_spec_channel(host.id).await;
    channel::join_channel(registry, roster, follower, &spec_channel.name).await.ok();

    for existing_id in host.spectators().await {
        if let Some(existing) = roster.lookup_by_id(existing_id).await {
            existing.enqueue(&server::spectator_joined(follower.id)).await;
        }
    }
    host.enqueue(&server::host_spectator_joined(follower.id)).await;

    host.add_spectator(follower.id).await;
    follower.note_spectating(host.id).await;
    Ok(())
}

/// A follower leaves `host`'s spectator group; when the last one leaves,
/// the dynamic spectator channel is disbanded.
pub async fn remove_spectator(
    registry: &ChannelRegistry,
    roster: &Roster,
    host: &Arc<Player>,
    follower: &Arc<Player>,
) -> BanchoResult<()> {
    host.remove_spectator(follower.id).await;
    follower.clear_spectating().await;

    let spec_channel_name = channel::spec_channel_name(host.id);
    channel::leave_channel(registry, roster, follower, &spec_channel_name).await.ok();

    for remaining_id in host.spectators().await {
        if let Some(remaining) = roster.lookup_by_id(remaining_id).await {
            remaining.enqueue(&server::spectator_left(follower.id)).await;
        }
    }
    host.enqueue(&server::spectator_left(follower.id)).await;

    if host.spectators().await.is_empty() {
        registry.remove(&spec_channel_name).await;
    }
    Ok(())
}

/// Re-broadcasts a host's `SpectateFrames` payload verbatim to followers.
pub async fn relay_frames(roster: &Roster, host: &Player, raw_payload: &[u8]) {
    let packet = server::spectate_frames(raw_payload);
    for follower_id in host.spectators().await {
        if let Some(follower) = roster.lookup_by_id(follower_id).await {
            follower.enqueue(&packet).await;
        }
    }
}

/// A follower signals it cannot keep up; rebroadcast to the host and the
/// other followers.
pub async fn relay_cant_spectate(roster: &Roster, host: &Player, follower_id: i32) {
    let packet = server::spectator_cant_spectate(follower_id);
    host.enqueue(&packet).await;
    for other_id in host.spectators().await {
        if other_id == follower_id {
            continue;
        }
        if let Some(other) = roster.lookup_by_id(other_id).await {
            other.enqueue(&packet).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::privileges;
    use chrono::Utc;

    fn player(id: i32, name: &str) -> Arc<Player> {
        Arc::new(Player::new(id, name.to_string(), format!("tok-{id}"), "h".into(), privileges::Normal, 0, false, 0, Utc::now()))
    }

    #[tokio::test]
    async fn frames_are_forwarded_byte_identical_to_all_followers_only() {
        let registry = ChannelRegistry::new();
        let roster = Roster::new();
        let host = player(1, "host");
        let f1 = player(2, "f1");
        let f2 = player(3, "f2");
        roster.add(host.clone()).await;
        roster.add(f1.clone()).await;
        roster.add(f2.clone()).await;

        add_spectator(&registry, &roster, &host, &f1).await.unwrap();
        add_spectator(&registry, &roster, &host, &f2).await.unwrap();
        host.drain().await;
        f1.drain().await;
        f2.drain().await;

        let payload = vec![0xABu8; 10];
        relay_frames(&roster, &host, &payload).await;

        let f1_drained = f1.drain().await;
        let f2_drained = f2.drain().await;
        assert_eq!(&f1_drained[f1_drained.len() - 10..], payload.as_slice());
        assert_eq!(&f2_drained[f2_drained.len() - 10..], payload.as_slice());
        assert!(host.drain().await.is_empty());
    }

    #[tokio::test]
    async fn channel_disbands_when_last_follower_leaves() {
        let registry = ChannelRegistry::new();
        let roster = Roster::new();
        let host = player(1, "host");
        let f1 = player(2, "f1");
        roster.add(host.clone()).await;
        roster.add(f1.clone()).await;

        add_spectator(&registry, &roster, &host, &f1).await.unwrap();
        assert!(registry.get(&channel::spec_channel_name(1)).await.is_some());

        remove_spectator(&registry, &roster, &host, &f1).await.unwrap();
        assert!(registry.get(&channel::spec_channel_name(1)).await.is_none());
    }
}
