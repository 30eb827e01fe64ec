pub mod action;
pub mod game_mode;
pub mod mods;
pub mod privileges;

pub use action::{Action, PresenceFilter};
pub use game_mode::GameMode;
pub use privileges::BanchoPrivileges;

/// Multiplayer team assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Team {
    Neutral = 0,
    Blue = 1,
    Red = 2,
}

impl Team {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Blue,
            2 => Self::Red,
            _ => Self::Neutral,
        }
    }
}

/// Match team mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TeamType {
    HeadToHead = 0,
    TagCoop = 1,
    TeamVs = 2,
    TagTeamVs = 3,
}

impl TeamType {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::TagCoop,
            2 => Self::TeamVs,
            3 => Self::TagTeamVs,
            _ => Self::HeadToHead,
        }
    }

    pub fn val(self) -> u8 {
        self as u8
    }

    /// Team-based modes assign slots a non-neutral team by default.
    pub fn is_team_based(self) -> bool {
        matches!(self, Self::TeamVs | Self::TagTeamVs)
    }
}

/// Match scoring mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScoringType {
    Score = 0,
    Accuracy = 1,
    Combo = 2,
    ScoreV2 = 3,
}

impl ScoringType {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Accuracy,
            2 => Self::Combo,
            3 => Self::ScoreV2,
            _ => Self::Score,
        }
    }

    pub fn val(self) -> u8 {
        self as u8
    }
}

/// Slot occupancy/readiness state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SlotStatus {
    Open = 0,
    Locked = 1,
    NotReady = 2,
    Ready = 4,
    NoMap = 8,
    Playing = 16,
    Complete = 32,
    Quit = 64,
}

impl SlotStatus {
    /// The disjoint predicate named in: a slot is occupied iff its
    /// status is one of these.
    pub fn has_player(self) -> bool {
        matches!(
            self,
            Self::NotReady | Self::Ready | Self::NoMap | Self::Playing | Self::Complete
        )
    }

    pub fn val(self) -> u8 {
        self as u8
    }
}

/// Same predicate as [`SlotStatus::has_player`], against a raw wire byte —
/// used while decoding a [`crate::codec::match_wire::MatchWire`], where
/// slot status arrives before it's parsed into a [`SlotStatus`].
pub fn slot_status_byte_has_player(byte: u8) -> bool {
    const MASK: u8 = SlotStatus::NotReady as u8
        | SlotStatus::Ready as u8
        | SlotStatus::NoMap as u8
        | SlotStatus::Playing as u8
        | SlotStatus::Complete as u8;
    byte & MASK != 0
}
