use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// 代表一个已连接的观察端 (仪表盘等) 的会话状态及相关句柄。
///
/// 每个成功建立的观察端 WebSocket 连接都会在服务端对应一个 `ClientSession` 实例。
/// 广播中心只通过 `sender` 把已序列化的消息推入该会话的出站队列，
/// 连接的发送任务再从队列中取出消息写入套接字。
#[derive(Debug)]
pub struct ClientSession {
    /// 服务端在会话创建时生成的唯一标识符 (UUID 版本 4)。
    pub client_id: Uuid,

    /// 出站队列的发送端。队列有界，满即视为该观察端已失效。
    /// 同一条广播消息以 `Arc<str>` 在所有会话间共享，只序列化一次。
    pub sender: mpsc::Sender<Arc<str>>,

    /// 观察端连接的源网络地址。
    pub addr: SocketAddr,

    /// 会话创建时间 (UTC)，注销时用于记录在线时长。
    pub creation_time: DateTime<Utc>,

    /// 关闭请求标志。连接的发送任务与接收循环都会等待它。
    connection_should_close: watch::Sender<bool>,
}

impl ClientSession {
    pub fn new(addr: SocketAddr, sender: mpsc::Sender<Arc<str>>) -> Self {
        let (connection_should_close, _) = watch::channel(false);
        Self {
            client_id: Uuid::new_v4(),
            sender,
            addr,
            creation_time: Utc::now(),
            connection_should_close,
        }
    }

    /// 请求关闭该会话的连接。可重复调用。
    pub fn request_close(&self) {
        self.connection_should_close.send_replace(true);
    }

    pub fn should_close(&self) -> bool {
        *self.connection_should_close.borrow()
    }

    /// 等待关闭请求。请求先于等待发出时立即返回；所有等待者都会被唤醒。
    pub async fn closed(&self) {
        let mut requested = self.connection_should_close.subscribe();
        let _ = requested.wait_for(|closed| *closed).await;
    }

    /// 会话自创建以来的时长。
    pub fn connected_for(&self) -> chrono::Duration {
        Utc::now() - self.creation_time
    }
}
