use std::sync::Arc;

use application::{ChatRelay, ClientCommand, SessionIdentity};
use axum::{
    body::Bytes,
    extract::ws::{Message as WsMessage, WebSocket},
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

/// 单个 WebSocket 连接
///
/// 发送任务把中继投递到发送队列的帧写回客户端；接收任务解析客户端指令
/// 并交给中继派发。任一任务结束即视为连接断开，此时仍在执行的指令会
/// 先完成，`disconnect` 随后才取得中继状态锁。
pub struct WebSocketConnection {
    socket: WebSocket,
    relay: Arc<ChatRelay>,
    identity: SessionIdentity,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket, relay: Arc<ChatRelay>, identity: SessionIdentity) -> Self {
        Self {
            socket,
            relay,
            identity,
        }
    }

    pub async fn run(self) {
        let Self {
            socket,
            relay,
            identity,
        } = self;

        let (outbound, mut frames) = relay.open_outbound();
        let connection = match relay.attach(identity.clone(), outbound).await {
            Ok(connection) => connection,
            Err(err) => {
                tracing::error!(error = %err, user_id = %identity.user_id, "Failed to register connection");
                return;
            }
        };

        let (mut sender, mut incoming) = socket.split();
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(32);

        // 发送任务：统一处理所有对 WebSocket sender 的写操作
        let mut send_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = frames.recv() => {
                        let Some(frame) = frame else {
                            // 队列被中继关闭：连接已被驱逐
                            tracing::info!(connection_id = %connection, "发送队列已关闭，断开连接");
                            let _ = sender.send(WsMessage::Close(None)).await;
                            break;
                        };
                        if sender.send(WsMessage::Text(frame.to_string().into())).await.is_err() {
                            tracing::warn!("Failed to send text message");
                            break;
                        }
                    }
                    Some(cmd) = cmd_rx.recv() => {
                        match cmd {
                            WsCommand::SendPong(data) => {
                                if sender.send(WsMessage::Pong(data)).await.is_err() {
                                    tracing::warn!("Failed to send pong message");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            tracing::debug!("WebSocket发送任务结束");
        });

        // 接收任务：处理来自WebSocket客户端的消息
        let mut recv_task = tokio::spawn({
            let relay = relay.clone();
            async move {
                while let Some(Ok(message)) = incoming.next().await {
                    match message {
                        WsMessage::Text(text) => {
                            match serde_json::from_str::<ClientCommand>(text.as_str()) {
                                Ok(command) => {
                                    // 中止本任务不会打断已派发的指令
                                    if let Err(err) = relay.dispatch(connection, command).await {
                                        tracing::error!(error = %err, connection_id = %connection, "指令处理任务异常退出");
                                    }
                                }
                                Err(err) => {
                                    tracing::debug!(error = %err, "无法解析的客户端指令");
                                    relay
                                        .reject(connection, format!("unrecognised command: {err}"))
                                        .await;
                                }
                            }
                        }
                        WsMessage::Binary(_) => {
                            relay
                                .reject(connection, "binary frames are not supported")
                                .await;
                        }
                        WsMessage::Ping(data) => {
                            if cmd_tx.send(WsCommand::SendPong(data)).await.is_err() {
                                break;
                            }
                        }
                        WsMessage::Pong(_) => {}
                        WsMessage::Close(_) => {
                            tracing::debug!("WebSocket收到关闭消息");
                            break;
                        }
                    }
                }
                tracing::debug!("WebSocket接收任务结束");
            }
        });

        tokio::select! {
            _ = &mut send_task => recv_task.abort(),
            _ = &mut recv_task => send_task.abort(),
        }

        relay.disconnect(connection).await;
        tracing::info!(connection_id = %connection, user_id = %identity.user_id, "WebSocket连接已断开");
    }
}

/// 发送任务之外产生的写操作
#[derive(Debug)]
enum WsCommand {
    SendPong(Bytes),
}
