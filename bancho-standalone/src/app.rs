//! The axum application: one POST route for the Bancho long-poll endpoint,
//! wrapped in a `tower` middleware stack (request tracing + a timeout).

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use bancho_core::collaborators::{BeatmapFetcher, CommandProcessor, Geolocator, Store};
use bancho_core::context::BanchoContext;
use bancho_core::error::BanchoError;
use bancho_core::session;

use crate::config::StandaloneConfig;

pub fn build_context(
    cfg: &StandaloneConfig,
    store: Arc<dyn Store>,
    geolocator: Arc<dyn Geolocator>,
    commands: Arc<dyn CommandProcessor>,
    beatmaps: Arc<dyn BeatmapFetcher>,
) -> BanchoContext {
    // The bot account is resolved by name through the store at startup in a
    // full deployment; standalone/demo runs pin it to a sentinel id.
    let _ = &cfg.bot_name;
    BanchoContext::new(Arc::new(cfg.bancho.clone()), store, geolocator, commands, beatmaps, 1)
}

pub fn router(ctx: Arc<BanchoContext>, request_deadline_ms: u64) -> Router {
    Router::new()
        .route("/", post(bancho_handler))
        .with_state(ctx)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_millis(request_deadline_ms))),
        )
}

/// The single Bancho long-poll endpoint: `osu-token` absent means "run the
/// login handshake"; present means "dispatch the body's frames and drain
/// the response queue". Always `200 OK` — failures are a
/// logged event, never an HTTP error status.
async fn bancho_handler(
    axum::extract::State(ctx): axum::extract::State<Arc<BanchoContext>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let token = headers.get("osu-token").and_then(|v| v.to_str().ok());

    match session::handle_request(&ctx, token, &body).await {
        Ok(resp) => {
            let mut out = axum::response::Response::builder().status(StatusCode::OK);
            if let Some(token) = resp.token {
                out = out.header("cho-token", token);
            }
            out.body(axum::body::Body::from(resp.body)).unwrap()
        },
        Err(BanchoError::Unauthenticated) => {
            let mut w = bancho_core::codec::PayloadWriter::new();
            w.write_i32(-1);
            let body = bancho_core::codec::encode_frame(5, &w.into_payload());
            axum::response::Response::builder()
                .status(StatusCode::OK)
                .header("cho-token", "no")
                .body(axum::body::Body::from(body))
                .unwrap()
        },
        Err(err) => {
            warn!(error = %err, "session request failed");
            axum::response::Response::builder().status(StatusCode::OK).body(axum::body::Body::empty()).unwrap()
        },
    }
}
