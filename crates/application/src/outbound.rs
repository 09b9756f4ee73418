//! 每个连接独享的有界发送队列。
//!
//! 中继只做非阻塞投递：队列满说明客户端消费过慢，由中继将其驱逐；
//! 队列已关闭说明套接字已经断开，直接跳过。

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};

/// 已序列化的事件帧，一次扇出共享同一份数据。
pub type Frame = Arc<str>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Lagging,
    Closed,
}

#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::Sender<Frame>,
}

impl Outbound {
    /// 创建发送端及其对应的接收端，接收端交给套接字写任务。
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn deliver(&self, frame: &Frame) -> Delivery {
        match self.tx.try_send(Arc::clone(frame)) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => Delivery::Lagging,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
