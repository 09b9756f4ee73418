//! WebSocket 握手
//!
//! 令牌在升级之前校验，失败直接返回 401，不会产生任何在线记录。

use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::Response,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{error::ApiError, state::AppState, ws_connection::WebSocketConnection};

/// WebSocket连接查询参数
#[derive(Debug, Default, Deserialize)]
pub struct WebSocketQuery {
    /// JWT access token
    pub token: Option<String>,
}

pub async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WebSocketQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = query.token.or_else(|| bearer_token(&headers));

    let identity = state
        .relay
        .authenticate(token.as_deref())
        .await
        .map_err(|err| {
            warn!(error = %err, "WebSocket upgrade rejected");
            if err.is_internal() {
                ApiError::from(err)
            } else {
                ApiError::new(StatusCode::UNAUTHORIZED, err.code(), err.client_message())
            }
        })?;

    info!(user_id = %identity.user_id, username = %identity.username, "WebSocket upgrade");
    let relay = state.relay.clone();
    Ok(ws.on_upgrade(move |socket| WebSocketConnection::new(socket, relay, identity).run()))
}

/// 从 `Authorization: Bearer <token>` 头中取令牌
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_owned())
}
