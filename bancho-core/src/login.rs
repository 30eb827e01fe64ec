//! One-shot login handshake: credential check, registration, and initial
//! snapshot synthesis.

use std::sync::Arc;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, warn};

use crate::channel::{self};
use crate::codec::server;
use crate::context::BanchoContext;
use crate::error::LoginError;
use crate::model::privileges::{self, bancho_privileges};
use crate::player::{fold_name, Player};

/// `token = "no"` signals denial
pub const DENIED_TOKEN: &str = "no";

fn new_token() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect()
}

struct LoginRequest {
    username: String,
    password_token: String,
    utc_offset: u8,
    pm_private: bool,
}

fn parse_request(body: &str) -> Result<LoginRequest, LoginError> {
    let mut lines = body.lines();
    let username = lines.next().ok_or(LoginError::MalformedRequest)?.trim().to_string();
    let password_token = lines.next().ok_or(LoginError::MalformedRequest)?.trim().to_string();
    let info = lines.next().ok_or(LoginError::MalformedRequest)?;
    let mut fields = info.split('|');
    let _build = fields.next().ok_or(LoginError::MalformedRequest)?;
    let utc_offset: u8 = fields.next().ok_or(LoginError::MalformedRequest)?.parse().map_err(|_| LoginError::MalformedRequest)?;
    let _display_city = fields.next().ok_or(LoginError::MalformedRequest)?;
    let _hashes = fields.next().ok_or(LoginError::MalformedRequest)?;
    let pm_private = fields.next().unwrap_or("0").trim() == "1";
    if username.is_empty() || password_token.is_empty() {
        return Err(LoginError::MalformedRequest);
    }
    Ok(LoginRequest { username, password_token, utc_offset, pm_private })
}

/// Verifies `token` against `stored_hash`, consulting (and updating) the
/// process-wide password cache to skip repeat bcrypt evaluations — a keyed
/// cache, not a security boundary.
async fn verify_password(ctx: &BanchoContext, token: &str, stored_hash: &str) -> bool {
    {
        let cache = ctx.password_cache.read().await;
        if cache.get(token).map(String::as_str) == Some(stored_hash) {
            return true;
        }
    }
    let matches = bcrypt::verify(token, stored_hash).unwrap_or(false);
    if matches {
        ctx.password_cache.write().await.insert(token.to_string(), stored_hash.to_string());
    }
    matches
}

fn denial_response(sentinel: i32, message: &str) -> (Vec<u8>, String) {
    let mut out = server::user_id(sentinel);
    out.extend(server::notification(message));
    (out, DENIED_TOKEN.to_string())
}

/// Runs the full handshake against a raw request body; returns the
/// response bytes and the session token (`"no"` on denial).
pub async fn login(ctx: &BanchoContext, body: &str, now_utc_offset_hint: Option<u8>) -> (Vec<u8>, String) {
    let _ = now_utc_offset_hint;
    let request = match parse_request(body) {
        Ok(r) => r,
        Err(_) => return denial_response(-1, "Malformed login request."),
    };

    let name_safe = fold_name(&request.username);
    let now = Utc::now();

    match ctx.roster.evict_stale_or_reject(&request.username, now).await {
        Ok(_evicted) => {},
        Err(()) => {
            debug!(username = %request.username, "rejecting login: existing session still active");
            return denial_response(-1, "You are already logged in.");
        },
    }

    let account = match ctx.store.user_by_name(&name_safe).await {
        Ok(Some(account)) => {
            if !privileges::has_any(account.priv_bits, privileges::Normal) {
                warn!(username = %request.username, "login denied: account banned");
                return denial_response(-3, "Your account is restricted.");
            }
            if !verify_password(ctx, &request.password_token, &account.password_hash).await {
                return denial_response(-1, "Incorrect password.");
            }
            account
        },
        Ok(None) => {
            let fresh_hash = match bcrypt::hash(&request.password_token, bcrypt::DEFAULT_COST) {
                Ok(h) => h,
                Err(_) => return denial_response(-1, "Could not create account."),
            };
            let account = match ctx.store.insert_user(&request.username, &fresh_hash).await {
                Ok(a) => a,
                Err(_) => return denial_response(-1, "Could not create account."),
            };
            ctx.store.insert_stats(account.id).await.ok();
            ctx.password_cache.write().await.insert(request.password_token.clone(), fresh_hash);
            account
        },
        Err(_) => return denial_response(-1, "Account lookup failed."),
    };

    let stats = ctx.store.load_stats(account.id).await.unwrap_or_default();
    let token = new_token();
    let player = Arc::new(Player::new(
        account.id,
        account.name.clone(),
        token.clone(),
        account.password_hash.clone(),
        account.priv_bits,
        request.utc_offset,
        request.pm_private,
        0,
        now,
    ));

    if let Ok(friends) = ctx.store.load_friends(account.id).await {
        for friend_id in friends {
            player.add_friend(friend_id).await;
        }
    }

    ctx.roster.add(player.clone()).await;

    let mut response = Vec::new();
    response.extend(server::user_id(player.id));
    response.extend(server::protocol_version(19));
    response.extend(server::bancho_privileges(bancho_privileges(player.priv_bits)));
    response.extend(server::notification(&ctx.config.welcome_message));
    response.extend(server::channel_info_end());

    for ch in ctx.channels.all().await {
        if !ch.can_read(player.priv_bits) {
            continue;
        }
        if ch.auto_join && channel::join_channel(&ctx.channels, &ctx.roster, &player, &ch.name).await.is_ok() {
            response.extend(server::channel_join(&ch.name));
        }
        response.extend(server::channel_info(&ch.name, &ch.topic, ch.member_count().await as i16));
    }

    let mode = player.state().await.game_mode;
    response.extend(server::user_presence(
        player.id,
        &player.name,
        request.utc_offset,
        0,
        bancho_privileges(player.priv_bits) as u8 | (mode << 5),
        0.0,
        0.0,
        stats.rank,
    ));
    response.extend(server::user_stats(
        player.id,
        0,
        "",
        "",
        0,
        mode,
        0,
        stats.ranked_score,
        stats.accuracy,
        stats.play_count,
        stats.total_score,
        stats.rank,
        stats.pp,
    ));

    for other in ctx.roster.all().await {
        if other.id == player.id {
            continue;
        }
        let other_mode = other.state().await.game_mode;
        let other_stats = ctx.store.load_stats(other.id).await.unwrap_or_default();
        response.extend(server::user_presence(other.id, &other.name, 0, 0, bancho_privileges(other.priv_bits) as u8 | (other_mode << 5), 0.0, 0.0, other_stats.rank));
        response.extend(server::user_stats(other.id, 0, "", "", 0, other_mode, 0, other_stats.ranked_score, other_stats.accuracy, other_stats.play_count, other_stats.total_score, other_stats.rank, other_stats.pp));

        let mine = server::user_presence(player.id, &player.name, request.utc_offset, 0, bancho_privileges(player.priv_bits) as u8 | (mode << 5), 0.0, 0.0, stats.rank);
        other.enqueue(&mine).await;
        let mine_stats = server::user_stats(player.id, 0, "", "", 0, mode, 0, stats.ranked_score, stats.accuracy, stats.play_count, stats.total_score, stats.rank, stats.pp);
        other.enqueue(&mine_stats).await;
    }

    response.extend(server::main_menu_icon("", ""));
    let friend_ids: Vec<i32> = player.state().await.friends.iter().copied().collect();
    response.extend(server::friends_list(&friend_ids));
    let remaining_silence = (player.state().await.silence_end - now.timestamp()).max(0);
    response.extend(server::silence_end(remaining_silence as i32));

    (response, token)
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
    async fn first_login_registers_and_returns_fresh_token() {
        let ctx = context();
        let body = "cookiezi\nsecretpass\nb20231001|24|1|a1b2c3|0";
        let (response, token) = login(&ctx, body, None).await;
        assert_ne!(token, DENIED_TOKEN);
        assert!(!response.is_empty());
        assert!(ctx.roster.lookup_by_token(&token).await.is_some());
    }

    #[tokio::test]
    async fn malformed_request_is_denied() {
        let ctx = context();
        let (_response, token) = login(&ctx, "onlyoneline", None).await;
        assert_eq!(token, DENIED_TOKEN);
    }

    #[tokio::test]
    async fn repeat_login_with_wrong_password_is_denied() {
        let ctx = context();
        let body = "cookiezi\ncorrecthorse\nb20231001|24|1|a1b2c3|0";
        login(&ctx, body, None).await;

        let wrong_body = "cookiezi\nwrongpassword\nb20231001|24|1|a1b2c3|0";
        let (_response, token) = login(&ctx, wrong_body, None).await;
        assert_eq!(token, DENIED_TOKEN);
    }
}
