//! Web API 层。
//!
//! 提供 Axum 路由，将 HTTP 请求委托给用户服务，将 WebSocket 连接交给实时中继。

mod error;
mod routes;
mod state;
mod websocket;
mod ws_connection;

pub use error::{ApiError, ErrorBody};
pub use routes::router;
pub use state::AppState;
