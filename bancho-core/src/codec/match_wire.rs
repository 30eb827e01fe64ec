//! The `match` composite wire type.
//!
//! This is pure wire data — no reference to [`crate::match_state::Match`] —
//! so the match state machine can convert to/from it without the codec
//! depending on the world model.

use super::{PayloadReader, PayloadWriter};
use crate::error::CodecError;

#[derive(Debug, Clone)]
pub struct SlotWire {
    pub status: u8,
    pub team: u8,
    pub user_id: Option<i32>,
    pub mods: u32,
}

#[derive(Debug, Clone)]
pub struct MatchWire {
    pub id: u16,
    pub in_progress: bool,
    /// Deprecated wire byte, always 0; kept only for format compatibility.
    pub match_type: u8,
    pub mods: u32,
    pub name: String,
    pub password: String,
    pub map_name: String,
    pub map_id: i32,
    pub map_md5: String,
    pub slots: [SlotWire; 16],
    pub host_id: i32,
    pub game_mode: u8,
    pub scoring_type: u8,
    pub team_type: u8,
    pub freemods: bool,
    pub seed: i32,
}

impl MatchWire {
    pub fn read(r: &mut PayloadReader<'_>) -> Result<Self, CodecError> {
        let id = r.read_u16()?;
        let in_progress = r.read_u8()? != 0;
        let match_type = r.read_u8()?;
        let mods = r.read_u32()?;
        let name = r.read_string()?;
        let password = r.read_string()?;
        let map_name = r.read_string()?;
        let map_id = r.read_i32()?;
        let map_md5 = r.read_string()?;

        let mut statuses = [0u8; 16];
        for s in statuses.iter_mut() {
            *s = r.read_u8()?;
        }
        let mut teams = [0u8; 16];
        for t in teams.iter_mut() {
            *t = r.read_u8()?;
        }

        let mut user_ids = [None; 16];
        for (i, status) in statuses.iter().enumerate() {
            if crate::model::slot_status_byte_has_player(*status) {
                user_ids[i] = Some(r.read_i32()?);
            }
        }

        let host_id = r.read_i32()?;
        let game_mode = r.read_u8()?;
        let scoring_type = r.read_u8()?;
        let team_type = r.read_u8()?;
        let freemods = r.read_u8()? != 0;

        let mut slot_mods = [0u32; 16];
        if freemods {
            for m in slot_mods.iter_mut() {
                *m = r.read_u32()?;
            }
        }

        let seed = r.read_i32()?;

        let slots = std::array::from_fn(|i| SlotWire {
            status: statuses[i],
            team: teams[i],
            user_id: user_ids[i],
            mods: slot_mods[i],
        });

        Ok(Self {
            id,
            in_progress,
            match_type,
            mods,
            name,
            password,
            map_name,
            map_id,
            map_md5,
            slots,
            host_id,
            game_mode,
            scoring_type,
            team_type,
            freemods,
            seed,
        })
    }

    pub fn write(&self, w: &mut PayloadWriter) {
        w.write_u16(self.id);
        w.write_u8(self.in_progress as u8);
        w.write_u8(self.match_type);
        w.write_u32(self.mods);
        w.write_string(&self.name);
        w.write_string(&self.password);
        w.write_string(&self.map_name);
        w.write_i32(self.map_id);
        w.write_string(&self.map_md5);

        for s in &self.slots {
            w.write_u8(s.status);
        }
        for s in &self.slots {
            w.write_u8(s.team);
        }
        for s in &self.slots {
            if let Some(uid) = s.user_id {
                w.write_i32(uid);
            }
        }

        w.write_i32(self.host_id);
        w.write_u8(self.game_mode);
        w.write_u8(self.scoring_type);
        w.write_u8(self.team_type);
        w.write_u8(self.freemods as u8);

        if self.freemods {
            for s in &self.slots {
                w.write_u32(s.mods);
            }
        }

        w.write_i32(self.seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MatchWire {
        let mut slots: [SlotWire; 16] = std::array::from_fn(|_| SlotWire {
            status: 0,
            team: 0,
            user_id: None,
            mods: 0,
        });
        slots[0] = SlotWire { status: 2, team: 1, user_id: Some(1001), mods: 8 };
        slots[1] = SlotWire { status: 4, team: 2, user_id: Some(1002), mods: 0 };
        MatchWire {
            id: 3,
            in_progress: false,
            match_type: 0,
            mods: 64,
            name: "test match".into(),
            password: "secret".into(),
            map_name: "Some Artist - Some Song [Hard]".into(),
            map_id: 12345,
            map_md5: "d41d8cd98f00b204e9800998ecf8427e".into(),
            slots,
            host_id: 1001,
            game_mode: 0,
            scoring_type: 3,
            team_type: 2,
            freemods: true,
            seed: 42,
        }
    }

    #[test]
    fn match_round_trip_with_freemods() {
        let m = sample();
        let mut w = PayloadWriter::new();
        m.write(&mut w);
        let payload = w.into_payload();
        let mut r = PayloadReader::new(&payload);
        let decoded = MatchWire::read(&mut r).unwrap();

        assert_eq!(decoded.id, m.id);
        assert_eq!(decoded.mods, m.mods);
        assert_eq!(decoded.name, m.name);
        assert_eq!(decoded.password, m.password);
        assert_eq!(decoded.host_id, m.host_id);
        assert_eq!(decoded.slots[0].user_id, Some(1001));
        assert_eq!(decoded.slots[0].mods, 8);
        assert_eq!(decoded.slots[2].user_id, None);
    }

    #[test]
    fn match_round_trip_without_freemods() {
        let mut m = sample();
        m.freemods = false;
        let mut w = PayloadWriter::new();
        m.write(&mut w);
        let payload = w.into_payload();
        let mut r = PayloadReader::new(&payload);
        let decoded = MatchWire::read(&mut r).unwrap();
        assert!(!decoded.freemods);
        assert_eq!(decoded.slots[0].mods, 0);
    }
}
