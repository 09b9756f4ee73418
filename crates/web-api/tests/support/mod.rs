use std::{net::SocketAddr, time::Duration};

use config::AppConfig;
use infrastructure::Infrastructure;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::oneshot, time::timeout};
use tokio_tungstenite::{tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream};
use web_api::{router, AppState};

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub const TEST_SECRET: &str = "integration-test-secret-with-enough-length";

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.jwt.secret = TEST_SECRET.to_owned();
    config.security.bcrypt_cost = 4;
    config
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let config = test_config();
        let services = Infrastructure::in_memory(&config)
            .into_services(config.relay.clone())
            .await
            .expect("services");
        let app = router(AppState::new(services.user_service, services.relay));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Self {
            addr,
            client: Client::new(),
            _shutdown: shutdown_tx,
        }
    }

    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws(&self, query: &str) -> String {
        format!("ws://{}/ws{}", self.addr, query)
    }

    pub async fn register(&self, username: &str) -> reqwest::Response {
        self.client
            .post(self.http("/auth/register"))
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "secret-password"
            }))
            .send()
            .await
            .expect("register request")
    }

    /// 注册并登录，返回 access token
    pub async fn login(&self, username: &str) -> String {
        let response = self.register(username).await;
        assert_eq!(response.status(), 201);

        let body: Value = self
            .client
            .post(self.http("/auth/login"))
            .json(&json!({ "username": username, "password": "secret-password" }))
            .send()
            .await
            .expect("login request")
            .json()
            .await
            .expect("login json");
        body["access_token"]
            .as_str()
            .expect("access_token")
            .to_owned()
    }
}

pub async fn send_event(ws: &mut WsStream, event: Value) {
    use futures_util::SinkExt;
    ws.send(TungsteniteMessage::Text(event.to_string().into()))
        .await
        .expect("send frame");
}

/// 读取事件直到出现指定名字的事件
pub async fn next_event(ws: &mut WsStream, name: &str) -> Value {
    use futures_util::StreamExt;
    timeout(Duration::from_secs(5), async {
        loop {
            let frame = ws.next().await.expect("stream open").expect("frame");
            if let TungsteniteMessage::Text(text) = frame {
                let value: Value = serde_json::from_str(text.as_str()).expect("json frame");
                if value["event"] == name {
                    return value["data"].clone();
                }
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {name}"))
}
