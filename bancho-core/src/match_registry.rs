//! Fixed-capacity (64) match table: allocation, disposal, lobby broadcast.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::channel::{self, ChannelRegistry};
use crate::codec::server;
use crate::error::{BanchoResult, MatchError};
use crate::match_state::Match;
use crate::player::Player;
use crate::roster::Roster;

pub const MATCH_CAPACITY: usize = 64;

#[derive(Default)]
pub struct MatchRegistry {
    matches: RwLock<HashMap<i32, Arc<Match>>>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: i32) -> Option<Arc<Match>> {
        self.matches.read().await.get(&id).cloned()
    }

    pub async fn all(&self) -> Vec<Arc<Match>> {
        self.matches.read().await.values().cloned().collect()
    }

    fn lowest_free_id(matches: &HashMap<i32, Arc<Match>>) -> Option<i32> {
        (0..MATCH_CAPACITY as i32).find(|id| !matches.contains_key(id))
    }

    /// Allocates a match at the lowest free id in `[0,64)`, seats `host` in
    /// slot 0, and joins them to the match's dynamic chat channel.
    pub async fn create(
        &self,
        channels: &ChannelRegistry,
        roster: &Roster,
        host: &Arc<Player>,
        name: String,
        password: Option<String>,
        game_mode: u8,
    ) -> BanchoResult<Arc<Match>> {
        let id = {
            let mut matches = self.matches.write().await;
            let id = Self::lowest_free_id(&matches).ok_or(MatchError::LobbyFull)?;
            let m = Arc::new(Match::new(id, name, password, host.id, game_mode));
            matches.insert(id, m);
            id
        };
        let m = self.get(id).await.expect("just inserted");
        host.note_match(id).await;
        let chat = channels.get_or_create_multi_channel(id).await;
        channel::join_channel(channels, roster, host, &chat.name).await.ok();

        let packet = server::new_match(&m.wire().await);
        self.broadcast_to_lobby(roster, &packet).await;
        Ok(m)
    }

    /// Joins an existing match: seats `player` in the first open slot.
    pub async fn join(&self, channels: &ChannelRegistry, roster: &Roster, match_id: i32, player: &Arc<Player>) -> BanchoResult<Arc<Match>> {
        if !(0..MATCH_CAPACITY as i32).contains(&match_id) {
            return Err(MatchError::InvalidMatchId(match_id).into());
        }
        let m = self.get(match_id).await.ok_or(MatchError::NoSuchMatch)?;
        let open_slot = m.first_open_slot().await.ok_or(MatchError::LobbyFull)?;
        m.seat(roster, player.id, open_slot).await?;
        player.note_match(match_id).await;
        let chat = channels.get_or_create_multi_channel(match_id).await;
        channel::join_channel(channels, roster, player, &chat.name).await.ok();
        player.enqueue(&server::match_join_success(&m.wire().await)).await;
        Ok(m)
    }

    /// Removes `player` from `match_id`; disbands the match if it is now
    /// empty.
    pub async fn leave(&self, channels: &ChannelRegistry, roster: &Roster, match_id: i32, player: &Arc<Player>) -> BanchoResult<()> {
        let Some(m) = self.get(match_id).await else { return Ok(()) };
        let (remaining, _promoted) = m.leave(roster, player.id).await?;
        player.clear_match().await;

        let chat_name = channel::multi_channel_name(match_id);
        channel::leave_channel(channels, roster, player, &chat_name).await.ok();

        if remaining == 0 {
            self.matches.write().await.remove(&match_id);
            channels.remove(&chat_name).await;
            self.broadcast_to_lobby(roster, &server::disband_match(match_id)).await;
        }
        Ok(())
    }

    /// Enqueues `bytes` to every player currently observing the lobby
    /// (`Player.in_lobby`) "lobby subscribers".
    pub async fn broadcast_to_lobby(&self, roster: &Roster, bytes: &[u8]) {
        for p in roster.all().await {
            if p.state().await.in_lobby {
                p.enqueue(bytes).await;
            }
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
    async fn create_then_join_then_leave_disbands_when_empty() {
        let registry = MatchRegistry::new();
        let channels = ChannelRegistry::new();
        let roster = Roster::new();
        let host = player(1, "host");
        let guest = player(2, "guest");
        roster.add(host.clone()).await;
        roster.add(guest.clone()).await;

        let m = registry.create(&channels, &roster, &host, "room".into(), None, 0).await.unwrap();
        assert_eq!(m.host_id().await, 1);

        registry.join(&channels, &roster, m.id, &guest).await.unwrap();
        assert_eq!(m.occupant_ids().await.len(), 2);

        registry.leave(&channels, &roster, m.id, &host).await.unwrap();
        assert!(registry.get(m.id).await.is_some());

        registry.leave(&channels, &roster, m.id, &guest).await.unwrap();
        assert!(registry.get(m.id).await.is_none());
    }

    #[tokio::test]
    async fn lobby_full_when_all_64_slots_used() {
        let registry = MatchRegistry::new();
        let channels = ChannelRegistry::new();
        let roster = Roster::new();
        for i in 0..MATCH_CAPACITY as i32 {
            let host = player(i, &format!("h{i}"));
            roster.add(host.clone()).await;
            registry.create(&channels, &roster, &host, "room".into(), None, 0).await.unwrap();
        }
        let overflow_host = player(1000, "overflow");
        roster.add(overflow_host.clone()).await;
        let err = registry.create(&channels, &roster, &overflow_host, "room".into(), None, 0).await.unwrap_err();
        assert!(matches!(err, crate::error::BanchoError::Match(MatchError::LobbyFull)));
    }
}
