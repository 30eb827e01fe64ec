//! Process-wide set of online players, indexed three ways.
//!
//! A single `tokio::sync::RwLock` guards the map, with broadcasts holding
//! the read lock across an `.await` loop over each player's queue.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::model::privileges;
use crate::player::Player;

#[derive(Default)]
struct Inner {
    by_id: HashMap<i32, Arc<Player>>,
    by_name: HashMap<String, i32>,
    by_token: HashMap<String, i32>,
}

/// Threshold below which a same-name re-login is refused rather than
/// displacing the existing session.
pub const DISPLACE_THRESHOLD_SECS: i64 = 10;

pub struct Roster {
    inner: RwLock<Inner>,
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}

impl Roster {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner::default()) }
    }

    pub async fn add(&self, player: Arc<Player>) {
        let mut inner = self.inner.write().await;
        inner.by_name.insert(player.name_safe.clone(), player.id);
        inner.by_token.insert(player.token.clone(), player.id);
        inner.by_id.insert(player.id, player);
    }

    pub async fn remove(&self, id: i32) -> Option<Arc<Player>> {
        let mut inner = self.inner.write().await;
        let player = inner.by_id.remove(&id)?;
        inner.by_name.remove(&player.name_safe);
        inner.by_token.remove(&player.token);
        Some(player)
    }

    pub async fn lookup_by_id(&self, id: i32) -> Option<Arc<Player>> {
        self.inner.read().await.by_id.get(&id).cloned()
    }

    pub async fn lookup_by_name(&self, name: &str) -> Option<Arc<Player>> {
        let folded = crate::player::fold_name(name);
        let inner = self.inner.read().await;
        let id = *inner.by_name.get(&folded)?;
        inner.by_id.get(&id).cloned()
    }

    pub async fn lookup_by_token(&self, token: &str) -> Option<Arc<Player>> {
        let inner = self.inner.read().await;
        let id = *inner.by_token.get(token)?;
        inner.by_id.get(&id).cloned()
    }

    pub async fn all(&self) -> Vec<Arc<Player>> {
        self.inner.read().await.by_id.values().cloned().collect()
    }

    pub async fn staff(&self) -> Vec<Arc<Player>> {
        self.inner
            .read()
            .await
            .by_id
            .values()
            .filter(|p| privileges::is_staff(p.priv_bits))
            .cloned()
            .collect()
    }

    /// Enqueues `bytes` onto every online player except those in `exclude`.
    /// Holds the read lock across the loop rather than cloning a snapshot
    /// of the player list first.
    pub async fn broadcast(&self, bytes: &[u8], exclude: &[i32]) {
        let inner = self.inner.read().await;
        for (id, player) in inner.by_id.iter() {
            if exclude.contains(id) {
                continue;
            }
            player.enqueue(bytes).await;
        }
    }

    /// Evicts a stale same-name session if one exists and has not pinged
    /// within [`DISPLACE_THRESHOLD_SECS`]; returns `Err(())` if a live
    /// session still holds the name.
    pub async fn evict_stale_or_reject(&self, name: &str, now: DateTime<Utc>) -> Result<Option<Arc<Player>>, ()> {
        let existing = self.lookup_by_name(name).await;
        let Some(existing) = existing else { return Ok(None) };
        if existing.seconds_since_ping(now).await <= DISPLACE_THRESHOLD_SECS {
            return Err(());
        }
        self.remove(existing.id).await;
        Ok(Some(existing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: i32, name: &str, ping: DateTime<Utc>) -> Arc<Player> {
        let p = Player::new(
            id,
            name.to_string(),
            format!("token-{id}"),
            "hash".into(),
            privileges::Normal,
            0,
            false,
            0,
            ping,
        );
        Arc::new(p)
    }

    #[tokio::test]
    async fn lookup_by_all_three_keys() {
        let roster = Roster::new();
        roster.add(player(1, "Cookiezi", Utc::now())).await;
        assert!(roster.lookup_by_id(1).await.is_some());
        assert!(roster.lookup_by_name("cookiezi").await.is_some());
        assert!(roster.lookup_by_name("COOKIEZI").await.is_some());
        assert!(roster.lookup_by_token("token-1").await.is_some());
    }

    #[tokio::test]
    async fn remove_clears_all_indices() {
        let roster = Roster::new();
        roster.add(player(1, "rafis", Utc::now())).await;
        roster.remove(1).await;
        assert!(roster.lookup_by_id(1).await.is_none());
        assert!(roster.lookup_by_name("rafis").await.is_none());
        assert!(roster.lookup_by_token("token-1").await.is_none());
    }

    #[tokio::test]
    async fn fresh_session_rejects_displacement() {
        let roster = Roster::new();
        roster.add(player(1, "rafis", Utc::now())).await;
        let result = roster.evict_stale_or_reject("rafis", Utc::now()).await;
        assert!(result.is_err());
        assert!(roster.lookup_by_id(1).await.is_some());
    }

    #[tokio::test]
    async fn stale_session_is_displaced() {
        let roster = Roster::new();
        let stale_ping = Utc::now() - chrono::Duration::seconds(11);
        roster.add(player(1, "rafis", stale_ping)).await;
        let evicted = roster.evict_stale_or_reject("rafis", Utc::now()).await.unwrap();
        assert_eq!(evicted.unwrap().id, 1);
        assert!(roster.lookup_by_id(1).await.is_none());
    }

    #[tokio::test]
    async fn broadcast_excludes_listed_ids() {
        let roster = Roster::new();
        roster.add(player(1, "a", Utc::now())).await;
        roster.add(player(2, "b", Utc::now())).await;
        roster.broadcast(&[9, 9], &[1]).await;
        let a = roster.lookup_by_id(1).await.unwrap();
        let b = roster.lookup_by_id(2).await.unwrap();
        assert!(a.drain().await.is_empty());
        assert_eq!(b.drain().await, vec![9, 9]);
    }
}
