/// The four osu! rulesets. The wire value is `u8`; relax/autopilot variants
/// are folded into [`crate::model::mods`] rather than the mode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GameMode {
    Standard = 0,
    Taiko = 1,
    Catch = 2,
    Mania = 3,
}

impl GameMode {
    pub fn from_u8(v: u8) -> Self {
        match v % 4 {
            0 => Self::Standard,
            1 => Self::Taiko,
            2 => Self::Catch,
            _ => Self::Mania,
        }
    }

    pub fn val(self) -> u8 {
        self as u8
    }
}
