use thiserror::Error;

/// Failures from decoding a single wire frame or its payload (§4.1).
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame payload length {declared} exceeds {remaining} remaining bytes")]
    MalformedFrame { declared: u32, remaining: usize },
    #[error("string existence flag 0x{0:02x} is neither 0x00 nor 0x0b")]
    MalformedString(u8),
    #[error("buffer exhausted while reading a primitive")]
    UnexpectedEof,
    #[error("packet id {0} is not a known client packet")]
    UnknownPacket(u16),
}

/// Failures surfaced by the login handshake (§4.7).
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("request body is not valid login syntax")]
    MalformedRequest,
    #[error("credentials did not match a known account")]
    InvalidCredentials,
    #[error("account is banned or otherwise lacks normal privileges")]
    AccountBanned,
    #[error("an existing session for this name is still active")]
    AlreadyLoggedIn,
    #[error("store operation failed: {0}")]
    Store(String),
}

/// Failures surfaced by multiplayer-match operations (§4.6).
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("no free slot in the 64-entry match table")]
    LobbyFull,
    #[error("player is not currently in a match")]
    NotInMatch,
    #[error("slot index {0} is out of the [0,16) range")]
    InvalidSlot(i32),
    #[error("target slot is already occupied")]
    SlotOccupied,
    #[error("match id {0} is out of the [0,64) range")]
    InvalidMatchId(i32),
    #[error("no such match")]
    NoSuchMatch,
}

/// Crate-wide error, one variant per §7 error kind not already covered by a
/// more specific enum above.
#[derive(Debug, Error)]
pub enum BanchoError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Login(#[from] LoginError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error("request carried no recognizable session token")]
    Unauthenticated,
    #[error("caller lacks the privilege required for this operation")]
    Denied,
    #[error("player is already a member of this channel")]
    AlreadyMember,
    #[error("player is silenced until a future timestamp")]
    Silenced,
    #[error("target is blocking non-friend private messages")]
    Blocking,
    #[error("no such user")]
    NoSuchUser,
    #[error("no such channel")]
    NoSuchChannel,
    #[error("backing store failed: {0}")]
    InternalStore(#[from] anyhow::Error),
}

pub type BanchoResult<T> = Result<T, BanchoError>;
