//! A single connected user: identity, session state, live status, and the
//! per-connection outbound packet queue.
//!
//! Follows an arena-and-index pattern: a `Player` never holds another
//! `Player` directly. Relations (`spectating`, `spectators`, `match_id`,
//! `channels`) are ids/names resolved through [`crate::roster`],
//! [`crate::channel`], and [`crate::match_state`] on demand. A `tokio::sync`
//! lock is held across the broadcast loops that enqueue onto other players.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::model::action::PresenceFilter;
use crate::model::mods::{self, ModsBits};
use crate::model::privileges::PrivBits;

/// Mutable session/live fields, grouped behind one lock so a status update
/// (one `ChangeAction` packet) is a single critical section.
#[derive(Debug)]
pub struct PlayerState {
    pub last_ping_time: DateTime<Utc>,
    pub utc_offset: u8,
    pub presence_filter: PresenceFilter,
    pub pm_private: bool,
    pub away_msg: Option<String>,
    /// Unix timestamp; `0` means not silenced.
    pub silence_end: i64,

    pub action: u8,
    pub info_text: String,
    pub map_md5: String,
    pub mods: ModsBits,
    pub game_mode: u8,
    pub map_id: i32,

    pub friends: HashSet<i32>,
    pub channels: HashSet<String>,
    pub spectating: Option<i32>,
    pub spectators: Vec<i32>,
    pub match_id: Option<i32>,
    pub in_lobby: bool,

    /// Beatmap id bound by the most recent now-playing chat message (§4.4).
    pub last_np: Option<i32>,
}

impl PlayerState {
    pub fn relax(&self) -> bool {
        mods::is_relax(self.mods)
    }

    pub fn is_silenced(&self, now: DateTime<Utc>) -> bool {
        self.silence_end > now.timestamp()
    }
}

#[derive(Debug)]
pub struct Player {
    pub id: i32,
    pub name: String,
    /// Case-folded lookup key.
    pub name_safe: String,
    pub token: String,
    pub password_hash: String,
    pub priv_bits: PrivBits,
    pub login_time: DateTime<Utc>,

    state: RwLock<PlayerState>,
    queue: Mutex<VecDeque<u8>>,
}

pub fn fold_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

impl Player {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: i32,
        name: String,
        token: String,
        password_hash: String,
        priv_bits: PrivBits,
        utc_offset: u8,
        pm_private: bool,
        silence_end: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let name_safe = fold_name(&name);
        Self {
            id,
            name,
            name_safe,
            token,
            password_hash,
            priv_bits,
            login_time: now,
            state: RwLock::new(PlayerState {
                last_ping_time: now,
                utc_offset,
                presence_filter: PresenceFilter::None,
                pm_private,
                away_msg: None,
                silence_end,
                action: 0,
                info_text: String::new(),
                map_md5: String::new(),
                mods: mods::NoMod,
                game_mode: 0,
                map_id: 0,
                friends: HashSet::new(),
                channels: HashSet::new(),
                spectating: None,
                spectators: Vec::new(),
                match_id: None,
                in_lobby: false,
                last_np: None,
            }),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn state(&self) -> tokio::sync::RwLockReadGuard<'_, PlayerState> {
        self.state.read().await
    }

    pub async fn state_mut(&self) -> tokio::sync::RwLockWriteGuard<'_, PlayerState> {
        self.state.write().await
    }

    /// Appends already-encoded packet bytes to the outbound queue (§4.2).
    pub async fn enqueue(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut q = self.queue.lock().await;
        q.extend(bytes.iter().copied());
    }

    /// Atomically removes and returns the concatenated queue contents.
    pub async fn drain(&self) -> Vec<u8> {
        let mut q = self.queue.lock().await;
        let out = q.drain(..).collect();
        out
    }

    pub async fn touch_ping(&self) {
        self.state.write().await.last_ping_time = Utc::now();
    }

    pub async fn seconds_since_ping(&self, now: DateTime<Utc>) -> i64 {
        (now - self.state.read().await.last_ping_time).num_seconds()
    }

    pub async fn seconds_since_login(&self, now: DateTime<Utc>) -> i64 {
        (now - self.login_time).num_seconds()
    }

    pub fn has_priv(&self, required: PrivBits) -> bool {
        crate::model::privileges::has_any(self.priv_bits, required)
    }

    pub fn is_staff(&self) -> bool {
        crate::model::privileges::is_staff(self.priv_bits)
    }

    pub async fn note_channel_joined(&self, name: &str) {
        self.state.write().await.channels.insert(name.to_string());
    }

    pub async fn note_channel_left(&self, name: &str) {
        self.state.write().await.channels.remove(name);
    }

    pub async fn in_channel(&self, name: &str) -> bool {
        self.state.read().await.channels.contains(name)
    }

    pub async fn add_friend(&self, id: i32) {
        self.state.write().await.friends.insert(id);
    }

    pub async fn remove_friend(&self, id: i32) {
        self.state.write().await.friends.remove(&id);
    }

    pub async fn is_friend(&self, id: i32) -> bool {
        self.state.read().await.friends.contains(&id)
    }

    pub async fn note_spectating(&self, host_id: i32) {
        self.state.write().await.spectating = Some(host_id);
    }

    pub async fn clear_spectating(&self) {
        self.state.write().await.spectating = None;
    }

    pub async fn add_spectator(&self, id: i32) {
        let mut s = self.state.write().await;
        if !s.spectators.contains(&id) {
            s.spectators.push(id);
        }
    }

    pub async fn remove_spectator(&self, id: i32) {
        self.state.write().await.spectators.retain(|&x| x != id);
    }

    pub async fn note_match(&self, match_id: i32) {
        self.state.write().await.match_id = Some(match_id);
    }

    pub async fn clear_match(&self) {
        self.state.write().await.match_id = None;
    }

    pub async fn match_id(&self) -> Option<i32> {
        self.state.read().await.match_id
    }

    pub async fn spectating(&self) -> Option<i32> {
        self.state.read().await.spectating
    }

    pub async fn spectators(&self) -> Vec<i32> {
        self.state.read().await.spectators.clone()
    }

    pub async fn channels(&self) -> HashSet<String> {
        self.state.read().await.channels.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_player(id: i32, name: &str) -> Player {
        Player::new(
            id,
            name.to_string(),
            format!("token-{id}"),
            "$2b$stub".into(),
            crate::model::privileges::Normal,
            0,
            false,
            0,
            Utc::now(),
        )
    }

    #[test]
    fn name_folding_lowercases_and_collapses_spaces() {
        assert_eq!(fold_name("Cookie Zi"), "cookie_zi");
        assert_eq!(fold_name("  Rafis  "), "rafis");
    }

    #[tokio::test]
    async fn enqueue_then_drain_is_fifo_and_empties() {
        let p = new_player(1, "rafis");
        p.enqueue(&[1, 2, 3]).await;
        p.enqueue(&[4, 5]).await;
        assert_eq!(p.drain().await, vec![1, 2, 3, 4, 5]);
        assert!(p.drain().await.is_empty());
    }

    #[tokio::test]
    async fn spectator_set_is_insert_order_and_dedups() {
        let p = new_player(1, "host");
        p.add_spectator(10).await;
        p.add_spectator(11).await;
        p.add_spectator(10).await;
        assert_eq!(p.spectators().await, vec![10, 11]);
        p.remove_spectator(10).await;
        assert_eq!(p.spectators().await, vec![11]);
    }

    #[tokio::test]
    async fn relax_is_derived_from_mods() {
        let p = new_player(1, "rx_player");
        {
            let mut s = p.state_mut().await;
            s.mods = mods::Relax | mods::Hidden;
        }
        assert!(p.state().await.relax());
    }
}
