//! Player destruction: explicit logout, idle pingout,
//! or displacement by a same-name login all funnel through here so the
//! teardown order (spectator → match → channels → roster) is never
//! duplicated ad hoc.

use std::sync::Arc;

use crate::codec::server;
use crate::context::BanchoContext;
use crate::player::Player;
use crate::spectator;

pub async fn logout(ctx: &BanchoContext, player: &Arc<Player>) {
    if let Some(host_id) = player.spectating().await {
        if let Some(host) = ctx.roster.lookup_by_id(host_id).await {
            spectator::remove_spectator(&ctx.channels, &ctx.roster, &host, player).await.ok();
        }
    }
    for follower_id in player.spectators().await {
        if let Some(follower) = ctx.roster.lookup_by_id(follower_id).await {
            spectator::remove_spectator(&ctx.channels, &ctx.roster, player, &follower).await.ok();
        }
    }

    if let Some(match_id) = player.match_id().await {
        ctx.matches.leave(&ctx.channels, &ctx.roster, match_id, player).await.ok();
    }

    for channel_name in player.channels().await {
        crate::channel::leave_channel(&ctx.channels, &ctx.roster, player, &channel_name).await.ok();
    }

    ctx.roster.remove(player.id).await;
    ctx.roster.broadcast(&server::server_logout(player.id), &[]).await;
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn context() -> BanchoContext {
        BanchoContext::new(
            std::sync::Arc::new(BanchoConfig::default()),
            std::sync::Arc::new(InMemoryStore::default()),
            std::sync::Arc::new(NoopGeo),
            std::sync::Arc::new(NoopCommandProcessor),
            std::sync::Arc::new(NoopBeatmapFetcher),
            -1,
        )
    }

    #[tokio::test]
    async fn logout_removes_from_roster_and_notifies_remaining() {
        let ctx = context();
        let a = Arc::new(Player::new(1, "a".into(), "t1".into(), "h".into(), privileges::Normal, 0, false, 0, Utc::now()));
        let b = Arc::new(Player::new(2, "b".into(), "t2".into(), "h".into(), privileges::Normal, 0, false, 0, Utc::now()));
        ctx.roster.add(a.clone()).await;
        ctx.roster.add(b.clone()).await;

        logout(&ctx, &a).await;

        assert!(ctx.roster.lookup_by_id(1).await.is_none());
        assert!(!b.drain().await.is_empty());
    }
}
