// rust_websocket_utils/src/server/transport.rs

//! 包含服务端 WebSocket 监听、接受连接和通信逻辑。

use crate::error::WsError;
use crate::message::{IncomingFrame, next_data_frame};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use log::{debug, error, info};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::time::timeout;
use tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::protocol::Message};

/// 服务端主动关闭连接时等待关闭帧写出的最长时间。
pub const SERVER_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// `WsStream` 是一个类型别名，代表经过 WebSocket 握手后的 TCP 流。
pub type WsStream = WebSocketStream<TcpStream>;

/// 一个已建立连接的发送端句柄。
///
/// 接收端 (`SplitStream<WsStream>`) 与本句柄一起交给 `on_connect` 回调，
/// 回调可以把二者分别移交给不同的任务。
pub struct ConnectionHandler {
    ws_sender: SplitSink<WsStream, Message>,
    peer_addr: SocketAddr,
}

impl ConnectionHandler {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// 向对端发送一条文本消息。
    pub async fn send_text(&mut self, text: &str) -> Result<(), WsError> {
        self.ws_sender.send(Message::Text(text.to_owned())).await?;
        Ok(())
    }

    /// 发起关闭握手，最多等待 `SERVER_CLOSE_TIMEOUT`。错误与超时只记录日志。
    ///
    /// 对端停止读取时发送缓冲区可能一直是满的，关闭帧写不出去，此时放弃等待。
    pub async fn close(&mut self) {
        match timeout(SERVER_CLOSE_TIMEOUT, self.ws_sender.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("服务端：关闭与 {} 的连接时发生错误 (已忽略): {}", self.peer_addr, e),
            Err(_) => debug!("服务端：与 {} 的关闭握手超过 {:?}，放弃等待。", self.peer_addr, SERVER_CLOSE_TIMEOUT),
        }
    }
}

/// 从服务端连接的接收流中取出下一条数据帧，控制帧会被跳过。
///
/// 返回 `None` 表示对端已关闭连接。
pub async fn receive_message(
    ws_receiver: &mut SplitStream<WsStream>,
) -> Option<Result<IncomingFrame, WsError>> {
    next_data_frame(ws_receiver).await
}

/// `ServerTransport` 结构体负责处理 WebSocket 服务端的监听和连接接受。
pub struct ServerTransport {
    listener: TcpListener,
}

impl ServerTransport {
    /// 绑定监听地址。端口为 0 时由系统分配，可通过 `local_addr` 查询。
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, WsError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, WsError> {
        Ok(self.listener.local_addr()?)
    }

    /// 持续接受连接。
    ///
    /// 对于每一个成功完成握手的 WebSocket 连接，都会在新的 Tokio 任务中调用 `on_connect`。
    /// 单个连接的接受或握手失败只记录日志，不会终止监听循环。
    pub async fn serve<F, Fut>(self, on_connect: F) -> Result<(), WsError>
    where
        F: Fn(ConnectionHandler, SplitStream<WsStream>) -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        info!("WebSocket 服务器正在监听地址: {}", self.local_addr()?);
        loop {
            match self.listener.accept().await {
                Ok((tcp_stream, peer_addr)) => {
                    debug!("从 {} 接受了新的 TCP 连接", peer_addr);
                    let on_connect_callback = on_connect.clone();
                    tokio::spawn(async move {
                        match accept_async(tcp_stream).await {
                            Ok(ws_stream) => {
                                debug!("与 {} 的 WebSocket 握手成功", peer_addr);
                                let (ws_sender, ws_receiver) = ws_stream.split();
                                let handler = ConnectionHandler { ws_sender, peer_addr };
                                on_connect_callback(handler, ws_receiver).await;
                            }
                            Err(e) => error!("与 {} 的 WebSocket 握手失败: {}", peer_addr, e),
                        }
                    });
                }
                Err(e) => error!("接受 TCP 连接失败: {}。服务器将继续运行。", e),
            }
        }
    }
}
