//! Process entry point: load config, init logging, build the context, serve
//! the Bancho endpoint, and run the idle-sweep loop alongside it.

mod app;
mod config;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use bancho_core::collaborators::stub::{InMemoryStore, NoopBeatmapFetcher, NoopCommandProcessor};
use bancho_core::collaborators::Geolocator;
use config::StandaloneConfig;
use tracing::info;

/// No-op until a real collaborator (e.g. a MaxMind database lookup) is
/// wired in; geolocation is out of this crate's scope.
struct NoopGeolocator;

#[async_trait::async_trait]
impl Geolocator for NoopGeolocator {
    async fn locate(&self, _ip: std::net::IpAddr) -> Option<u8> {
        None
    }
}

async fn run(cfg: StandaloneConfig) -> anyhow::Result<()> {
    let ctx = Arc::new(app::build_context(
        &cfg,
        Arc::new(InMemoryStore::default()),
        Arc::new(NoopGeolocator),
        Arc::new(NoopCommandProcessor),
        Arc::new(NoopBeatmapFetcher),
    ));
    ctx.seed_channels().await?;

    let sweep_ctx = ctx.clone();
    let sweep_interval = Duration::from_secs(cfg.bancho.idle_timeout_secs.max(1) as u64);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            bancho_core::session::sweep_idle(&sweep_ctx).await;
        }
    });

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    info!(addr = %cfg.bind_addr, "bancho-standalone listening");
    let app = app::router(ctx, cfg.bancho.request_deadline_ms);
    axum::serve(listener, app).await?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    logging::init();
    let cfg = StandaloneConfig::load("bancho.toml")?;
    tokio::runtime::Builder::new_multi_thread().enable_all().build()?.block_on(run(cfg))
}
