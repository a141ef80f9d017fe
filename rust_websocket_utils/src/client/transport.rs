// rust_websocket_utils/src/client/transport.rs

//! 客户端 WebSocket 传输层核心逻辑。
//!
//! 本模块提供建立到远端 WebSocket 服务器的连接、接收文本/二进制数据帧、发送文本消息、
//! 以及维持连接活性 (定时 Ping) 的能力。连接参数通过 `ClientOptions` 调整，
//! 以便与资源受限的上游 HTTP 桥接服务器 (例如手机上的 NanoHTTPD) 互通。

use crate::error::WsError;
use crate::message::{Inbound, IncomingFrame, classify_message};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, timeout};
use tokio_tungstenite::{
    WebSocketStream, connect_async_with_config,
    tungstenite::{Error as TungsteniteError, protocol::Message, protocol::WebSocketConfig},
};
use url::Url;

/// `ClientWsStream` 类型别名。本库只建立明文 `ws://` 连接，`MaybeTlsStream` 总是 `Plain` 变体。
pub type ClientWsStream = WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// 默认的单条消息大小上限：1 MiB，足以容纳一帧压缩后的摄像头 JPEG。
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1 << 20;

/// 客户端连接参数。
///
/// tokio-tungstenite 不实现 permessage-deflate 扩展，所以连接天然不协商压缩，
/// 这正是不支持压缩的上游所要求的。
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// 发送 Ping 的间隔。`None` 表示不主动发送 Ping。
    pub ping_interval: Option<Duration>,
    /// 等待 Pong 的期限。`None` 表示容忍对端不回 Pong，不因此断开连接。
    pub ping_timeout: Option<Duration>,
    /// 主动关闭连接时，等待关闭握手完成的最长时间。
    pub close_timeout: Duration,
    /// 单条消息 (以及单帧) 的最大字节数。
    pub max_message_size: usize,
    /// 建立连接 (TCP + 握手) 的最长时间。`None` 表示不额外限时。
    pub open_timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            ping_interval: Some(Duration::from_secs(20)),
            ping_timeout: Some(Duration::from_secs(20)),
            close_timeout: Duration::from_secs(10),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            open_timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl ClientOptions {
    /// 由本参数导出的底层 `WebSocketConfig`。
    pub fn websocket_config(&self) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(self.max_message_size);
        config.max_frame_size = Some(self.max_message_size);
        config
    }
}

/// `ClientConnection` 结构体代表一个活动的客户端 WebSocket 连接。
///
/// 它封装了发送端 (`SplitSink`) 与接收端 (`SplitStream`)，并在 `receive_frame`
/// 等待数据的同时按 `ClientOptions::ping_interval` 发送保活 Ping。
pub struct ClientConnection {
    /// 用于向 WebSocket 服务器异步发送消息的 `Sink` (发送端)。
    pub ws_sender: SplitSink<ClientWsStream, Message>,
    /// 用于从 WebSocket 服务器异步接收消息的 `Stream` (接收端)。
    pub ws_receiver: SplitStream<ClientWsStream>,
    options: ClientOptions,
    keepalive: Option<Interval>,
    /// 最早一个尚未得到 Pong 回应的 Ping 的发送时间。
    awaiting_pong_since: Option<Instant>,
}

enum Wake {
    Message(Option<Result<Message, TungsteniteError>>),
    KeepAlive,
}

impl ClientConnection {
    fn new(ws_stream: ClientWsStream, options: ClientOptions) -> Self {
        let (ws_sender, ws_receiver) = ws_stream.split();
        // 零间隔的 Interval 会 panic，视同未配置
        let keepalive = options.ping_interval.filter(|period| !period.is_zero()).map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        Self {
            ws_sender,
            ws_receiver,
            options,
            keepalive,
            awaiting_pong_since: None,
        }
    }

    /// 异步向 WebSocket 服务器发送一条文本消息。
    pub async fn send_text(&mut self, text: String) -> Result<(), WsError> {
        debug!("客户端：准备发送文本消息 ({} 字节)", text.len());
        self.ws_sender.send(Message::Text(text)).await?;
        Ok(())
    }

    /// 异步接收下一条数据帧。
    ///
    /// 等待期间会按间隔发送保活 Ping；Ping/Pong/Close 等控制帧不会返回给调用方。
    ///
    /// # Returns
    /// * `Some(Ok(frame))`：收到一条文本或二进制消息。
    /// * `Some(Err(e))`：接收出错，或保活 Ping 发送失败 / Pong 超时，连接应视为已断开。
    /// * `None`：连接已被对端关闭。
    pub async fn receive_frame(&mut self) -> Option<Result<IncomingFrame, WsError>> {
        loop {
            let wake = match self.keepalive.as_mut() {
                Some(ticker) => tokio::select! {
                    msg = self.ws_receiver.next() => Wake::Message(msg),
                    _ = ticker.tick() => Wake::KeepAlive,
                },
                None => Wake::Message(self.ws_receiver.next().await),
            };

            match wake {
                Wake::KeepAlive => {
                    if let Err(e) = self.send_keepalive().await {
                        return Some(Err(e));
                    }
                }
                Wake::Message(None) => {
                    debug!("客户端：WebSocket 接收流已结束。");
                    return None;
                }
                Wake::Message(Some(Err(TungsteniteError::ConnectionClosed | TungsteniteError::AlreadyClosed))) => {
                    debug!("客户端：连接已关闭 (ConnectionClosed / AlreadyClosed)。");
                    return None;
                }
                Wake::Message(Some(Err(e))) => {
                    error!("客户端：从 WebSocket 流接收消息时发生底层错误: {}", e);
                    return Some(Err(WsError::WebSocketProtocolError(e)));
                }
                Wake::Message(Some(Ok(msg))) => match classify_message(msg) {
                    Inbound::Data(frame) => return Some(Ok(frame)),
                    Inbound::Pong => self.awaiting_pong_since = None,
                    Inbound::Control => {}
                    Inbound::Closed => return None,
                },
            }
        }
    }

    async fn send_keepalive(&mut self) -> Result<(), WsError> {
        if let (Some(limit), Some(since)) = (self.options.ping_timeout, self.awaiting_pong_since) {
            if since.elapsed() > limit {
                warn!("客户端：超过 {:?} 未收到 Pong，判定连接已失效。", limit);
                return Err(WsError::ConnectionTimeout);
            }
        }
        self.ws_sender.send(Message::Ping(Vec::new())).await?;
        if self.awaiting_pong_since.is_none() {
            self.awaiting_pong_since = Some(Instant::now());
        }
        debug!("客户端：保活 Ping 已发送。");
        Ok(())
    }

    /// 发起关闭握手，最多等待 `close_timeout`。关闭失败不会返回错误，只记录日志。
    pub async fn close(&mut self) {
        match timeout(self.options.close_timeout, self.ws_sender.close()).await {
            Ok(Ok(())) => debug!("客户端：WebSocket 连接已关闭。"),
            Ok(Err(e)) => debug!("客户端：关闭 WebSocket 连接时发生错误 (已忽略): {}", e),
            Err(_) => debug!("客户端：关闭握手超过 {:?}，放弃等待。", self.options.close_timeout),
        }
    }
}

/// 按给定参数异步连接到指定的 WebSocket 服务器。
///
/// # Arguments
/// * `url_str` - 服务器 URL，只接受 `ws://`。未启用 TLS 支持，`wss://` 会以 `InvalidUrl` 拒绝。
/// * `options` - 连接参数，见 `ClientOptions`。
///
/// # Returns
/// * 成功时返回 `ClientConnection`；URL 无效、连接超时、TCP 连接失败或握手失败时返回相应的 `WsError`。
pub async fn connect_client_with_options(
    url_str: &str,
    options: ClientOptions,
) -> Result<ClientConnection, WsError> {
    debug!("客户端：开始尝试连接到 WebSocket 服务器，URL: {}", url_str);
    let parsed_url = Url::parse(url_str)
        .map_err(|e| WsError::InvalidUrl(format!("无效的 WebSocket URL '{}': {}", url_str, e)))?;
    if parsed_url.scheme() != "ws" {
        return Err(WsError::InvalidUrl(format!(
            "不支持的 scheme '{}' (URL: {})",
            parsed_url.scheme(),
            url_str
        )));
    }

    let connect = connect_async_with_config(parsed_url.as_str(), Some(options.websocket_config()), true);
    let connected = match options.open_timeout {
        Some(limit) => timeout(limit, connect).await.map_err(|_| WsError::ConnectionTimeout)?,
        None => connect.await,
    };

    match connected {
        Ok((ws_stream, response)) => {
            info!("客户端：已成功连接到 {} (HTTP 状态码: {})", url_str, response.status());
            debug!("客户端：WebSocket 连接响应头: {:?}", response.headers());
            Ok(ClientConnection::new(ws_stream, options))
        }
        Err(e) => {
            debug!("客户端：连接到 {} 失败，错误: {}", url_str, e);
            Err(WsError::WebSocketProtocolError(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::transport::{ConnectionHandler, ServerTransport, WsStream, receive_message};
    use futures_util::stream::SplitStream as ServerSplitStream;
    use tokio::time::{Duration, timeout};

    // 辅助函数：启动一个本地回显服务器，把收到的文本原样发回，二进制消息则回复其长度。
    async fn setup_test_echo_server() -> (String, tokio::task::JoinHandle<Result<(), WsError>>) {
        let server = ServerTransport::bind("127.0.0.1:0").await.expect("绑定测试服务器失败");
        let addr = server.local_addr().expect("获取测试服务器地址失败");
        let handle = tokio::spawn(server.serve(
            |mut conn_handler: ConnectionHandler, mut server_receiver: ServerSplitStream<WsStream>| async move {
                while let Some(Ok(frame)) = receive_message(&mut server_receiver).await {
                    let reply = match frame {
                        IncomingFrame::Text(text) => text,
                        IncomingFrame::Binary(bytes) => format!("binary:{}", bytes.len()),
                    };
                    if conn_handler.send_text(&reply).await.is_err() {
                        break;
                    }
                }
            },
        ));
        (format!("ws://{}", addr), handle)
    }

    #[tokio::test]
    /// 集成测试：客户端连接、发送文本与二进制消息并接收回显。
    async fn test_client_connect_send_receive_echo() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (url, server_handle) = setup_test_echo_server().await;

        let mut client_conn =
            connect_client_with_options(&url, ClientOptions::default()).await.expect("客户端连接测试服务器失败");
        client_conn.send_text("来自客户端集成测试的问候!".to_string()).await.expect("发送文本失败");
        let echoed = timeout(Duration::from_secs(5), client_conn.receive_frame())
            .await
            .expect("等待回显超时");
        assert_eq!(echoed.unwrap().unwrap(), IncomingFrame::Text("来自客户端集成测试的问候!".to_string()));

        client_conn.ws_sender.send(Message::Binary(vec![0u8; 10])).await.expect("发送二进制失败");
        let echoed = timeout(Duration::from_secs(5), client_conn.receive_frame())
            .await
            .expect("等待二进制回显超时");
        assert_eq!(echoed.unwrap().unwrap(), IncomingFrame::Text("binary:10".to_string()));

        client_conn.close().await;
        server_handle.abort();
    }

    #[tokio::test]
    async fn test_invalid_urls_are_rejected() {
        let result = connect_client_with_options("not a url", ClientOptions::default()).await;
        assert!(matches!(result, Err(WsError::InvalidUrl(_))));

        let result = connect_client_with_options("http://127.0.0.1:1/", ClientOptions::default()).await;
        assert!(matches!(result, Err(WsError::InvalidUrl(_))));

        // 未编译 TLS 支持，wss 在发起 TCP 连接之前就被拒绝
        let result = connect_client_with_options("wss://127.0.0.1:1/lidar", ClientOptions::default()).await;
        match result {
            Err(WsError::InvalidUrl(reason)) => assert!(reason.contains("wss")),
            Err(other) => panic!("wss 应以 InvalidUrl 拒绝，实际为: {}", other),
            Ok(_) => panic!("wss 不应连接成功"),
        }
    }

    #[tokio::test]
    async fn test_connect_refused_is_an_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = connect_client_with_options(&format!("ws://{}/lidar", addr), ClientOptions::default()).await;
        assert!(result.is_err(), "连接到未监听的端口应当失败");
    }

    #[tokio::test]
    /// 配置了 ping_interval 后，等待数据期间会向服务器发送 Ping。
    async fn test_keepalive_pings_are_sent_while_waiting() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Ping(_) = msg {
                    ws.send(Message::Text("saw ping".to_string())).await.unwrap();
                    break;
                }
            }
        });

        let options = ClientOptions {
            ping_interval: Some(Duration::from_millis(50)),
            ping_timeout: None,
            ..ClientOptions::default()
        };
        let mut client = connect_client_with_options(&format!("ws://{}", addr), options).await.unwrap();
        let frame = timeout(Duration::from_secs(5), client.receive_frame()).await.expect("未在期限内收到服务器回复");
        assert_eq!(frame.unwrap().unwrap(), IncomingFrame::Text("saw ping".to_string()));
        server.await.unwrap();
    }

    #[tokio::test]
    /// 零 Ping 间隔视同不发送 Ping，而不是在创建连接时 panic。
    async fn test_zero_ping_interval_disables_keepalive() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::Text("hello".to_string())).await.unwrap();
            ws.close(None).await.ok();
        });

        let options = ClientOptions { ping_interval: Some(Duration::ZERO), ..ClientOptions::default() };
        let mut client = connect_client_with_options(&format!("ws://{}", addr), options).await.unwrap();
        assert!(client.keepalive.is_none());
        let frame = timeout(Duration::from_secs(5), client.receive_frame()).await.expect("未在期限内收到服务器消息");
        assert_eq!(frame.unwrap().unwrap(), IncomingFrame::Text("hello".to_string()));
        server.await.unwrap();
    }

    #[test]
    fn test_options_map_to_websocket_config() {
        let options = ClientOptions { max_message_size: 4096, ..ClientOptions::default() };
        let config = options.websocket_config();
        assert_eq!(config.max_message_size, Some(4096));
        assert_eq!(config.max_frame_size, Some(4096));
    }
}
