//! The SessionLoop: one request body in, one response body out.
//! Locates the player by the `osu-token`/`cho-token` header, walks every
//! frame in the body through the router, and drains the outbound queue.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::codec::decode_frame;
use crate::context::BanchoContext;
use crate::error::{BanchoError, BanchoResult};
use crate::login;
use crate::player::Player;
use crate::router;

/// Outcome of handling one request: the response body to write back and,
/// for a fresh login, the token to set in the `cho-token` response header.
pub struct SessionResponse {
    pub body: Vec<u8>,
    pub token: Option<String>,
}

/// `token` is `None` when the request carried no session header — this is
/// the signal to run the login handshake instead of dispatching frames.
pub async fn handle_request(ctx: &BanchoContext, token: Option<&str>, body: &[u8]) -> BanchoResult<SessionResponse> {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        let body_str = String::from_utf8_lossy(body);
        let (response, new_token) = login::login(ctx, &body_str, None).await;
        let token = (new_token != login::DENIED_TOKEN).then_some(new_token);
        return Ok(SessionResponse { body: response, token });
    };

    let Some(player) = ctx.roster.lookup_by_token(token).await else {
        return Err(BanchoError::Unauthenticated);
    };

    player.touch_ping().await;
    dispatch_frames(ctx, &player, body).await;
    let drained = player.drain().await;
    Ok(SessionResponse { body: drained, token: None })
}

/// Walks every frame in `body`, dispatching each through [`router::dispatch`].
/// A frame whose declared length would overrun the buffer aborts the
/// remainder of the stream; packets for unknown ids are skipped by
/// consuming their declared length, never halting the stream.
async fn dispatch_frames(ctx: &BanchoContext, player: &Arc<Player>, mut body: &[u8]) {
    while !body.is_empty() {
        let (frame, consumed) = match decode_frame(body) {
            Ok(pair) => pair,
            Err(err) => {
                warn!(player = player.id, error = %err, "malformed frame, aborting request body");
                return;
            },
        };
        debug!(player = player.id, packet_id = frame.packet_id, len = frame.payload.len(), "dispatching frame");
        router::dispatch(ctx, player, frame.packet_id, frame.payload).await;
        body = &body[consumed..];
    }
}

/// Periodic sweep: logs out any player whose `last_ping_time` is
/// older than `ctx.config.idle_timeout_secs`. Intended to be driven by a
/// `tokio::time::interval` in the standalone binary, not called per-request.
pub async fn sweep_idle(ctx: &BanchoContext) {
    let now = Utc::now();
    for player in ctx.roster.all().await {
        if player.seconds_since_ping(now).await > ctx.config.idle_timeout_secs {
            debug!(player = player.id, "idle timeout, logging out");
            crate::lifecycle::logout(ctx, &player).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::stub::{InMemoryStore, NoopBeatmapFetcher, NoopCommandProcessor};
    use crate::config::BanchoConfig;
    use async_trait::async_trait;

    struct NoopGeo;
    #[async_trait]
    impl crate::collaborators::Geolocator for NoopGeo {
        async fn locate(&self, _ip: std::net::IpAddr) -> Option<u8> {
            None
        }
    }

    fn context() -> BanchoContext {
        BanchoContext::new(
            Arc::new(BanchoConfig::default()),
            Arc::new(InMemoryStore::default()),
            Arc::new(NoopGeo),
            Arc::new(NoopCommandProcessor),
            Arc::new(NoopBeatmapFetcher),
            -1,
        )
    }

    #[tokio::test]
    async fn missing_token_runs_login_handshake() {
        let ctx = context();
        let body = b"cookiezi\nsecretpass\nb20231001|24|1|a1b2c3|0";
        let response = handle_request(&ctx, None, body).await.unwrap();
        assert!(response.token.is_some());
        assert!(!response.body.is_empty());
    }

    #[tokio::test]
    async fn unknown_token_is_unauthenticated() {
        let ctx = context();
        let err = handle_request(&ctx, Some("ghost-token"), b"").await.unwrap_err();
        assert!(matches!(err, BanchoError::Unauthenticated));
    }

    #[tokio::test]
    async fn ping_frame_drains_a_pong_response() {
        let ctx = context();
        let body = b"cookiezi\nsecretpass\nb20231001|24|1|a1b2c3|0";
        let (_resp, token) = login::login(&ctx, &String::from_utf8_lossy(body), None).await;

        let ping_frame = crate::codec::encode_frame(4, &[]);
        let response = handle_request(&ctx, Some(&token), &ping_frame).await.unwrap();
        assert!(!response.body.is_empty());
    }

    #[tokio::test]
    async fn unknown_packet_id_is_skipped_without_aborting_stream() {
        let ctx = context();
        let body = b"cookiezi\nsecretpass\nb20231001|24|1|a1b2c3|0";
        let (_resp, token) = login::login(&ctx, &String::from_utf8_lossy(body), None).await;

        let mut stream = crate::codec::encode_frame(9999, &[1, 2, 3]);
        stream.extend(crate::codec::encode_frame(4, &[]));
        let response = handle_request(&ctx, Some(&token), &stream).await.unwrap();
        assert!(!response.body.is_empty());
    }
}
