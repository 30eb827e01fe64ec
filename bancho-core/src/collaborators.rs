//! External collaborator interfaces: the relational store,
//! geolocator, chat-command processor, and beatmap fetcher all live outside
//! this crate's scope. These traits are the seam; the
//! `bancho-standalone` binary (or a test) supplies real or stub
//! implementations.

use async_trait::async_trait;

use crate::error::BanchoResult;
use crate::model::privileges::PrivBits;

#[derive(Debug, Clone)]
pub struct StoredAccount {
    pub id: i32,
    pub name: String,
    pub password_hash: String,
    pub priv_bits: PrivBits,
}

#[derive(Debug, Clone, Default)]
pub struct StoredStats {
    pub ranked_score: i64,
    pub total_score: i64,
    pub accuracy: f32,
    pub play_count: i32,
    pub rank: i32,
    pub pp: i16,
}

/// The relational store (user records, channels, scores, friends) — lives
/// outside this crate entirely, implemented elsewhere and consumed here.
#[async_trait]
pub trait Store: Send + Sync {
    async fn user_by_name(&self, name_safe: &str) -> BanchoResult<Option<StoredAccount>>;
    async fn insert_user(&self, name: &str, password_hash: &str) -> BanchoResult<StoredAccount>;
    async fn insert_stats(&self, user_id: i32) -> BanchoResult<()>;
    async fn load_stats(&self, user_id: i32) -> BanchoResult<StoredStats>;
    async fn load_friends(&self, user_id: i32) -> BanchoResult<Vec<i32>>;
    async fn iter_channel_names(&self) -> BanchoResult<Vec<String>>;
}

/// Resolves a client IP to a country code, for `UserPresence`.
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn locate(&self, ip: std::net::IpAddr) -> Option<u8>;
}

pub struct CommandOutcome {
    pub public: bool,
    pub response: Option<String>,
}

/// `!`-prefixed chat command parsing, treated as a pluggable collaborator.
#[async_trait]
pub trait CommandProcessor: Send + Sync {
    async fn process(&self, player_id: i32, target_channel: &str, message: &str) -> CommandOutcome;
}

#[derive(Debug, Clone)]
pub struct BeatmapInfo {
    pub id: i32,
    pub md5: String,
    pub name: String,
}

#[async_trait]
pub trait BeatmapFetcher: Send + Sync {
    async fn beatmap_from_bid(&self, id: i32) -> Option<BeatmapInfo>;
    async fn beatmap_from_md5(&self, md5: &str) -> Option<BeatmapInfo>;
}

/// In-memory, no-op-ish implementations suitable for tests and for driving
/// the standalone binary before a real store is wired in.
pub mod stub {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    #[derive(Default)]
    pub struct InMemoryStore {
        accounts: RwLock<HashMap<String, StoredAccount>>,
        next_id: RwLock<i32>,
    }

    #[async_trait]
    impl Store for InMemoryStore {
        async fn user_by_name(&self, name_safe: &str) -> BanchoResult<Option<StoredAccount>> {
            Ok(self.accounts.read().await.get(name_safe).cloned())
        }

        async fn insert_user(&self, name: &str, password_hash: &str) -> BanchoResult<StoredAccount> {
            let mut next_id = self.next_id.write().await;
            *next_id += 1;
            let account = StoredAccount {
                id: *next_id,
                name: name.to_string(),
                password_hash: password_hash.to_string(),
                priv_bits: crate::model::privileges::Normal,
            };
            self.accounts.write().await.insert(crate::player::fold_name(name), account.clone());
            Ok(account)
        }

        async fn insert_stats(&self, _user_id: i32) -> BanchoResult<()> {
            Ok(())
        }

        async fn load_stats(&self, _user_id: i32) -> BanchoResult<StoredStats> {
            Ok(StoredStats::default())
        }

        async fn load_friends(&self, _user_id: i32) -> BanchoResult<Vec<i32>> {
            Ok(Vec::new())
        }

        async fn iter_channel_names(&self) -> BanchoResult<Vec<String>> {
            Ok(vec!["#osu".to_string(), "#announce".to_string()])
        }
    }

    pub struct NoopCommandProcessor;

    #[async_trait]
    impl CommandProcessor for NoopCommandProcessor {
        async fn process(&self, _player_id: i32, _target_channel: &str, _message: &str) -> CommandOutcome {
            CommandOutcome { public: false, response: None }
        }
    }

    pub struct NoopBeatmapFetcher;

    #[async_trait]
    impl BeatmapFetcher for NoopBeatmapFetcher {
        async fn beatmap_from_bid(&self, _id: i32) -> Option<BeatmapInfo> {
            None
        }

        async fn beatmap_from_md5(&self, _md5: &str) -> Option<BeatmapInfo> {
            None
        }
    }
}
