//! The explicit, process-wide context object: every singleton a handler
//! might need, passed in rather than reached for via a hidden global.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::channel::{Channel, ChannelRegistry};
use crate::collaborators::{BeatmapFetcher, CommandProcessor, Geolocator, Store};
use crate::config::BanchoConfig;
use crate::error::BanchoResult;
use crate::match_registry::MatchRegistry;
use crate::roster::Roster;

pub struct BanchoContext {
    pub config: Arc<BanchoConfig>,
    pub roster: Arc<Roster>,
    pub channels: Arc<ChannelRegistry>,
    pub matches: Arc<MatchRegistry>,
    pub store: Arc<dyn Store>,
    pub geolocator: Arc<dyn Geolocator>,
    pub commands: Arc<dyn CommandProcessor>,
    pub beatmaps: Arc<dyn BeatmapFetcher>,
    /// Id of the server's bot account; private messages addressed to it are
    /// routed to `commands` instead of a real player.
    pub bot_id: i32,
    /// Password-token → bcrypt-hash cache: a keyed cache
    /// to skip repeat bcrypt evaluations, not a security boundary.
    pub password_cache: RwLock<HashMap<String, String>>,
}

impl BanchoContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<BanchoConfig>,
        store: Arc<dyn Store>,
        geolocator: Arc<dyn Geolocator>,
        commands: Arc<dyn CommandProcessor>,
        beatmaps: Arc<dyn BeatmapFetcher>,
        bot_id: i32,
    ) -> Self {
        Self {
            config,
            roster: Arc::new(Roster::new()),
            channels: Arc::new(ChannelRegistry::new()),
            matches: Arc::new(MatchRegistry::new()),
            store,
            geolocator,
            commands,
            beatmaps,
            bot_id,
            password_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Populates `channels` from the store's channel table, the way a
    /// fresh process loads its channel list from the database on startup
    /// rather than keeping it hardcoded. Each seeded channel auto-joins
    /// and uses its own name as both name and topic; a store wanting
    /// per-channel topics or restricted privileges should insert those
    /// channels directly into `self.channels` instead of relying on this.
    pub async fn seed_channels(&self) -> BanchoResult<()> {
        for name in self.store.iter_channel_names().await? {
            if self.channels.get(&name).await.is_some() {
                continue;
            }
            self.channels.insert(Channel::new(name.clone(), name, true)).await;
        }
        Ok(())
    }
}
