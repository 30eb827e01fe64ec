//! Multiplayer lobby: 16 slots, host, map, mods, team/scoring mode, and the
//! state machine driven by client packets.

use tokio::sync::RwLock;

use crate::codec::match_wire::{MatchWire, SlotWire};
use crate::codec::server;
use crate::error::{BanchoError, BanchoResult, MatchError};
use crate::model::mods::{self, ModsBits};
use crate::model::{ScoringType, SlotStatus, Team, TeamType};
use crate::player::Player;
use crate::roster::Roster;

pub const SLOT_COUNT: usize = 16;

#[derive(Debug, Clone)]
pub struct Slot {
    pub status: SlotStatus,
    pub team: Team,
    pub player_id: Option<i32>,
    pub mods: ModsBits,
    pub loaded: bool,
    pub skipped: bool,
}

impl Slot {
    fn empty() -> Self {
        Self { status: SlotStatus::Open, team: Team::Neutral, player_id: None, mods: mods::NoMod, loaded: false, skipped: false }
    }

    fn reset(&mut self) {
        *self = Self::empty();
    }
}

#[derive(Debug)]
pub struct MatchInner {
    pub name: String,
    pub password: Option<String>,
    pub host_id: i32,
    pub map_name: String,
    pub map_id: i32,
    pub map_md5: String,
    pub mods: ModsBits,
    pub freemods: bool,
    pub game_mode: u8,
    pub team_type: TeamType,
    pub scoring_type: ScoringType,
    pub in_progress: bool,
    pub slots: [Slot; SLOT_COUNT],
}

impl MatchInner {
    fn slot_of(&self, player_id: i32) -> Option<usize> {
        self.slots.iter().position(|s| s.player_id == Some(player_id))
    }

    fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| s.status.has_player()).count()
    }

    pub fn to_wire(&self, id: i32) -> MatchWire {
        let slots = std::array::from_fn(|i| {
            let s = &self.slots[i];
            SlotWire { status: s.status.val(), team: s.team as u8, user_id: s.player_id, mods: s.mods }
        });
        MatchWire {
            id: id as u16,
            in_progress: self.in_progress,
            match_type: 0,
            mods: self.mods,
            name: self.name.clone(),
            password: self.password.clone().unwrap_or_default(),
            map_name: self.map_name.clone(),
            map_id: self.map_id,
            map_md5: self.map_md5.clone(),
            slots,
            host_id: self.host_id,
            game_mode: self.game_mode,
            scoring_type: self.scoring_type.val(),
            team_type: self.team_type.val(),
            freemods: self.freemods,
            seed: 0,
        }
    }
}

pub struct Match {
    pub id: i32,
    inner: RwLock<MatchInner>,
}

impl Match {
    pub fn new(id: i32, name: String, password: Option<String>, host_id: i32, game_mode: u8) -> Self {
        let mut slots = std::array::from_fn(|_| Slot::empty());
        slots[0] = Slot { status: SlotStatus::NotReady, team: Team::Neutral, player_id: Some(host_id), mods: mods::NoMod, loaded: false, skipped: false };
        Self {
            id,
            inner: RwLock::new(MatchInner {
                name,
                password,
                host_id,
                map_name: String::new(),
                map_id: 0,
                map_md5: String::new(),
                mods: mods::NoMod,
                freemods: false,
                game_mode,
                team_type: TeamType::HeadToHead,
                scoring_type: ScoringType::Score,
                in_progress: false,
                slots,
            }),
        }
    }

    pub async fn wire(&self) -> MatchWire {
        self.inner.read().await.to_wire(self.id)
    }

    pub async fn host_id(&self) -> i32 {
        self.inner.read().await.host_id
    }

    pub async fn occupant_ids(&self) -> Vec<i32> {
        self.inner.read().await.slots.iter().filter_map(|s| s.player_id).collect()
    }

    async fn broadcast_update(&self, roster: &Roster) {
        let packet = server::update_match(&self.wire().await);
        for id in self.occupant_ids().await {
            if let Some(p) = roster.lookup_by_id(id).await {
                p.enqueue(&packet).await;
            }
        }
    }

    pub async fn first_open_slot(&self) -> Option<usize> {
        self.inner.read().await.slots.iter().position(|s| s.status == SlotStatus::Open)
    }

    /// Seats a newly-joining player (not yet in any slot) into `slot_idx`.
    pub async fn seat(&self, roster: &Roster, player_id: i32, slot_idx: usize) -> BanchoResult<()> {
        {
            let mut m = self.inner.write().await;
            if slot_idx >= SLOT_COUNT {
                return Err(MatchError::InvalidSlot(slot_idx as i32).into());
            }
            if m.slots[slot_idx].status != SlotStatus::Open {
                return Err(MatchError::SlotOccupied.into());
            }
            m.slots[slot_idx] = Slot {
                status: SlotStatus::NotReady,
                team: Team::Neutral,
                player_id: Some(player_id),
                mods: mods::NoMod,
                loaded: false,
                skipped: false,
            };
        }
        self.broadcast_update(roster).await;
        Ok(())
    }

    pub async fn change_slot(&self, roster: &Roster, player_id: i32, to: usize) -> BanchoResult<()> {
        if to >= SLOT_COUNT {
            return Err(MatchError::InvalidSlot(to as i32).into());
        }
        {
            let mut m = self.inner.write().await;
            let from = m.slot_of(player_id).ok_or(MatchError::NotInMatch)?;
            if from == to {
                return Ok(());
            }
            if m.slots[to].status != SlotStatus::Open {
                return Err(MatchError::SlotOccupied.into());
            }
            m.slots[to] = m.slots[from].clone();
            m.slots[from].reset();
        }
        self.broadcast_update(roster).await;
        Ok(())
    }

    pub async fn ready(&self, roster: &Roster, player_id: i32) -> BanchoResult<()> {
        self.set_slot_status(roster, player_id, SlotStatus::Ready, true).await
    }

    pub async fn not_ready(&self, roster: &Roster, player_id: i32) -> BanchoResult<()> {
        // Lobby broadcast suppressed for this transition.
        self.set_slot_status(roster, player_id, SlotStatus::NotReady, false).await
    }

    pub async fn has_map(&self, roster: &Roster, player_id: i32) -> BanchoResult<()> {
        self.set_slot_status(roster, player_id, SlotStatus::NotReady, true).await
    }

    pub async fn no_map(&self, roster: &Roster, player_id: i32) -> BanchoResult<()> {
        self.set_slot_status(roster, player_id, SlotStatus::NoMap, true).await
    }

    async fn set_slot_status(&self, roster: &Roster, player_id: i32, status: SlotStatus, broadcast_lobby: bool) -> BanchoResult<()> {
        let _ = broadcast_lobby;
        {
            let mut m = self.inner.write().await;
            let idx = m.slot_of(player_id).ok_or(MatchError::NotInMatch)?;
            m.slots[idx].status = status;
        }
        self.broadcast_update(roster).await;
        Ok(())
    }

    pub async fn lock_slot(&self, roster: &Roster, host_id: i32, slot_idx: usize) -> BanchoResult<()> {
        if slot_idx >= SLOT_COUNT {
            return Err(MatchError::InvalidSlot(slot_idx as i32).into());
        }
        {
            let m = self.inner.read().await;
            if m.host_id != host_id {
                return Err(BanchoError::Denied);
            }
        }
        {
            let mut m = self.inner.write().await;
            let slot = &mut m.slots[slot_idx];
            if slot.status == SlotStatus::Locked {
                slot.reset();
            } else {
                slot.reset();
                slot.status = SlotStatus::Locked;
            }
        }
        self.broadcast_update(roster).await;
        Ok(())
    }

    pub async fn change_team(&self, roster: &Roster, player_id: i32) -> BanchoResult<()> {
        {
            let mut m = self.inner.write().await;
            let idx = m.slot_of(player_id).ok_or(MatchError::NotInMatch)?;
            m.slots[idx].team = match m.slots[idx].team {
                Team::Blue => Team::Red,
                _ => Team::Blue,
            };
        }
        self.broadcast_update(roster).await;
        Ok(())
    }

    /// `freemods`: host may change only the speed-changing bits; any player
    /// sets their own non-speed bits. Not `freemods`: host-only, match-wide
    /// replacement.
    pub async fn change_mods(&self, roster: &Roster, player_id: i32, requested: ModsBits) -> BanchoResult<()> {
        {
            let mut m = self.inner.write().await;
            if m.freemods {
                if player_id == m.host_id {
                    m.mods = requested & mods::SPEED_CHANGING;
                } else {
                    let idx = m.slot_of(player_id).ok_or(MatchError::NotInMatch)?;
                    m.slots[idx].mods = requested & !mods::SPEED_CHANGING;
                }
            } else {
                if player_id != m.host_id {
                    return Err(BanchoError::Denied);
                }
                m.mods = requested;
            }
        }
        self.broadcast_update(roster).await;
        Ok(())
    }

    pub async fn set_freemods(&self, roster: &Roster, host_id: i32, freemods: bool) -> BanchoResult<()> {
        {
            let mut m = self.inner.write().await;
            if m.host_id != host_id {
                return Err(BanchoError::Denied);
            }
            if m.freemods == freemods {
                return Ok(());
            }
            if freemods {
                // Host's speed-changing bits stay at match level; the rest
                // devolve onto the host's own slot.
                let non_speed = m.mods & !mods::SPEED_CHANGING;
                let speed = m.mods & mods::SPEED_CHANGING;
                if let Some(idx) = m.host_id_slot_index() {
                    m.slots[idx].mods = non_speed;
                }
                m.mods = speed;
            } else {
                let non_speed = m.host_id_slot_index().map(|idx| m.slots[idx].mods).unwrap_or(0);
                m.mods |= non_speed;
                for s in m.slots.iter_mut() {
                    s.mods = 0;
                }
            }
            m.freemods = freemods;
        }
        self.broadcast_update(roster).await;
        Ok(())
    }

    pub async fn change_password(&self, roster: &Roster, host_id: i32, new_password: Option<String>) -> BanchoResult<()> {
        {
            let mut m = self.inner.write().await;
            if m.host_id != host_id {
                return Err(BanchoError::Denied);
            }
            m.password = new_password;
        }
        // Lobby broadcast suppressed.
        self.broadcast_update(roster).await;
        Ok(())
    }

    /// `new_map`: `None` means the map was deselected.
    pub async fn change_settings(
        &self,
        roster: &Roster,
        host_id: i32,
        name: String,
        new_map: Option<(String, i32, String)>,
        game_mode: u8,
        team_type: TeamType,
        scoring_type: ScoringType,
    ) -> BanchoResult<()> {
        {
            let mut m = self.inner.write().await;
            if m.host_id != host_id {
                return Err(BanchoError::Denied);
            }
            if new_map.is_none() {
                for s in m.slots.iter_mut() {
                    if s.status == SlotStatus::Ready {
                        s.status = SlotStatus::NotReady;
                    }
                }
            }
            if let Some((map_name, map_id, map_md5)) = new_map {
                m.map_name = map_name;
                m.map_id = map_id;
                m.map_md5 = map_md5;
            } else {
                m.map_name.clear();
                m.map_id = 0;
                m.map_md5.clear();
            }
            m.name = name;
            m.game_mode = game_mode;
            m.team_type = team_type;
            m.scoring_type = scoring_type;
        }
        self.broadcast_update(roster).await;
        Ok(())
    }

    pub async fn start(&self, roster: &Roster, host_id: i32) -> BanchoResult<()> {
        {
            let m = self.inner.read().await;
            if m.host_id != host_id {
                return Err(BanchoError::Denied);
            }
        }
        let packet = {
            let mut m = self.inner.write().await;
            for s in m.slots.iter_mut() {
                if s.status == SlotStatus::Ready {
                    s.status = SlotStatus::Playing;
                    s.loaded = false;
                    s.skipped = false;
                }
            }
            m.in_progress = true;
            server::match_start(&m.to_wire(self.id))
        };
        for id in self.playing_ids().await {
            if let Some(p) = roster.lookup_by_id(id).await {
                p.enqueue(&packet).await;
            }
        }
        // Lobby is not notified directly by Start; MatchUpdate below covers it.
        self.broadcast_update(roster).await;
        Ok(())
    }

    async fn playing_ids(&self) -> Vec<i32> {
        self.inner.read().await.slots.iter().filter(|s| s.status == SlotStatus::Playing).filter_map(|s| s.player_id).collect()
    }

    pub async fn load_complete(&self, roster: &Roster, player_id: i32) -> BanchoResult<bool> {
        let all_loaded = {
            let mut m = self.inner.write().await;
            let idx = m.slot_of(player_id).ok_or(MatchError::NotInMatch)?;
            m.slots[idx].loaded = true;
            m.slots.iter().filter(|s| s.status == SlotStatus::Playing).all(|s| s.loaded)
        };
        if all_loaded {
            let packet = server::match_all_players_loaded();
            for id in self.playing_ids().await {
                if let Some(p) = roster.lookup_by_id(id).await {
                    p.enqueue(&packet).await;
                }
            }
        }
        Ok(all_loaded)
    }

    pub async fn skip_request(&self, roster: &Roster, player_id: i32) -> BanchoResult<()> {
        let (all_skipped, idx) = {
            let mut m = self.inner.write().await;
            let idx = m.slot_of(player_id).ok_or(MatchError::NotInMatch)?;
            m.slots[idx].skipped = true;
            let all = m.slots.iter().filter(|s| s.status == SlotStatus::Playing).all(|s| s.skipped);
            (all, idx)
        };
        let skipped_packet = server::match_player_skipped(idx as i32);
        for id in self.playing_ids().await {
            if let Some(p) = roster.lookup_by_id(id).await {
                p.enqueue(&skipped_packet).await;
            }
        }
        if all_skipped {
            let skip_packet = server::match_skip();
            for id in self.playing_ids().await {
                if let Some(p) = roster.lookup_by_id(id).await {
                    p.enqueue(&skip_packet).await;
                }
            }
        }
        Ok(())
    }

    /// Rewrites the slot-id byte (offset 4) of a 29- or 37-byte score frame
    /// and fans it out. The frame length is
    /// determined by the selector byte at offset 28.
    pub async fn score_update(&self, roster: &Roster, player_id: i32, mut frame: Vec<u8>) -> BanchoResult<()> {
        let idx = {
            let m = self.inner.read().await;
            m.slot_of(player_id).ok_or(MatchError::NotInMatch)?
        };
        if frame.len() > 4 {
            frame[4] = idx as u8;
        }
        for id in self.playing_ids().await {
            if let Some(p) = roster.lookup_by_id(id).await {
                p.enqueue(&frame).await;
            }
        }
        Ok(())
    }

    pub async fn failed(&self, roster: &Roster, player_id: i32) -> BanchoResult<()> {
        let idx = {
            let m = self.inner.read().await;
            m.slot_of(player_id).ok_or(MatchError::NotInMatch)?
        };
        let packet = server::match_player_failed(idx as i32);
        for id in self.playing_ids().await {
            if let Some(p) = roster.lookup_by_id(id).await {
                p.enqueue(&packet).await;
            }
        }
        Ok(())
    }

    /// Returns `true` if this was the last playing slot to complete (the
    /// match just finished).
    pub async fn complete(&self, roster: &Roster, player_id: i32) -> BanchoResult<bool> {
        let finished = {
            let mut m = self.inner.write().await;
            let idx = m.slot_of(player_id).ok_or(MatchError::NotInMatch)?;
            m.slots[idx].status = SlotStatus::Complete;
            let none_playing = !m.slots.iter().any(|s| s.status == SlotStatus::Playing);
            if none_playing {
                m.in_progress = false;
                for s in m.slots.iter_mut() {
                    if s.status == SlotStatus::Complete {
                        s.status = SlotStatus::NotReady;
                        s.loaded = false;
                        s.skipped = false;
                    }
                }
            }
            none_playing
        };
        if finished {
            let occupants = self.occupant_ids().await;
            let complete_packet = server::match_complete();
            for id in &occupants {
                if let Some(p) = roster.lookup_by_id(*id).await {
                    p.enqueue(&complete_packet).await;
                }
            }
            self.broadcast_update(roster).await;
        }
        Ok(finished)
    }

    pub async fn transfer_host(&self, roster: &Roster, current_host_id: i32, to_slot: usize) -> BanchoResult<i32> {
        let new_host_id = {
            let mut m = self.inner.write().await;
            if m.host_id != current_host_id {
                return Err(BanchoError::Denied);
            }
            if to_slot >= SLOT_COUNT {
                return Err(MatchError::InvalidSlot(to_slot as i32).into());
            }
            let new_host = m.slots[to_slot].player_id.ok_or(MatchError::SlotOccupied)?;
            m.host_id = new_host;
            new_host
        };
        if let Some(p) = roster.lookup_by_id(new_host_id).await {
            p.enqueue(&server::match_transfer_host()).await;
        }
        self.broadcast_update(roster).await;
        Ok(new_host_id)
    }

    /// Resets the leaver's slot. Returns the remaining occupant count and,
    /// if the leaver was host, the newly promoted host id.
    pub async fn leave(&self, roster: &Roster, player_id: i32) -> BanchoResult<(usize, Option<i32>)> {
        let (remaining, promoted) = {
            let mut m = self.inner.write().await;
            let idx = m.slot_of(player_id).ok_or(MatchError::NotInMatch)?;
            m.slots[idx].reset();
            let remaining = m.occupied_count();
            let mut promoted = None;
            if m.host_id == player_id {
                if let Some(next_idx) = m.slots.iter().position(|s| s.player_id.is_some()) {
                    let next_id = m.slots[next_idx].player_id.unwrap();
                    m.host_id = next_id;
                    promoted = Some(next_id);
                }
            }
            (remaining, promoted)
        };
        if let Some(new_host_id) = promoted {
            if let Some(p) = roster.lookup_by_id(new_host_id).await {
                p.enqueue(&server::match_transfer_host()).await;
            }
        }
        if remaining > 0 {
            self.broadcast_update(roster).await;
        }
        Ok((remaining, promoted))
    }
}

impl MatchInner {
    fn host_id_slot_index(&self) -> Option<usize> {
        self.slot_of(self.host_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::privileges;
    use chrono::Utc;
    use std::sync::Arc as StdArc;

    /// Builds a one-player match (the host only); the tests below only
    /// exercise host-only transitions.
    async fn setup(n: usize) -> (Roster, Match, Vec<StdArc<Player>>) {
        assert_eq!(n, 1, "test helper only seeds the host slot");
        let roster = Roster::new();
        let host = StdArc::new(Player::new(0, "p0".into(), "tok-0".into(), "h".into(), privileges::Normal, 0, false, 0, Utc::now()));
        roster.add(host.clone()).await;
        let m = Match::new(0, "test".into(), None, 0, 0);
        (roster, m, vec![host])
    }

    #[tokio::test]
    async fn freemods_toggle_moves_mods_between_match_and_host_slot() {
        let (roster, m, players) = setup(1).await;
        m.change_mods(&roster, players[0].id, mods::DoubleTime | mods::Hidden).await.unwrap();
        m.set_freemods(&roster, players[0].id, true).await.unwrap();
        {
            let inner = m.inner.read().await;
            assert_eq!(inner.mods, mods::DoubleTime);
            assert_eq!(inner.slots[0].mods, mods::Hidden);
        }
        m.set_freemods(&roster, players[0].id, false).await.unwrap();
        {
            let inner = m.inner.read().await;
            assert_eq!(inner.mods, mods::DoubleTime | mods::Hidden);
            assert_eq!(inner.slots[0].mods, 0);
        }
    }

    #[tokio::test]
    async fn lock_evicts_occupant_and_sets_locked() {
        let (roster, m, _players) = setup(1).await;
        m.lock_slot(&roster, 0, 0).await.unwrap();
        let inner = m.inner.read().await;
        assert_eq!(inner.slots[0].status, SlotStatus::Locked);
        assert_eq!(inner.slots[0].player_id, None);
    }

    #[tokio::test]
    async fn complete_resets_to_not_ready_once_all_done() {
        let (roster, m, players) = setup(1).await;
        {
            let mut inner = m.inner.write().await;
            inner.slots[0].status = SlotStatus::Playing;
            inner.in_progress = true;
        }
        let finished = m.complete(&roster, players[0].id).await.unwrap();
        assert!(finished);
        let inner = m.inner.read().await;
        assert_eq!(inner.slots[0].status, SlotStatus::NotReady);
        assert!(!inner.in_progress);
    }

    #[tokio::test]
    async fn invalid_slot_index_rejected() {
        let (roster, m, players) = setup(1).await;
        let err = m.change_slot(&roster, players[0].id, 99).await.unwrap_err();
        assert!(matches!(err, BanchoError::Match(MatchError::InvalidSlot(99))));
    }
}
