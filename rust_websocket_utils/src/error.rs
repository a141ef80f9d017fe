// rust_websocket_utils/src/error.rs

//! 定义 WebSocket 工具库相关的错误类型。

use thiserror::Error;

/// WebSocket 工具库的统一错误类型。
#[derive(Error, Debug)]
pub enum WsError {
    /// WebSocket 协议相关的错误。
    /// 例如握手失败、连接被重置、帧格式不正确、消息超过大小上限等。
    #[error("WebSocket协议错误: {0}")]
    WebSocketProtocolError(#[from] tokio_tungstenite::tungstenite::Error),

    /// 底层 I/O 错误。
    #[error("I/O错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 当尝试发送消息到一个已关闭的通道时发生。
    #[error("发送错误: 通道已关闭")]
    SendErrorClosed,

    /// 连接超时错误 (建立连接超时，或在设定的期限内未收到 Pong)。
    #[error("连接超时")]
    ConnectionTimeout,

    /// 无效的 URL 格式。
    #[error("无效的URL: {0}")]
    InvalidUrl(String),

    /// 未连接错误，当尝试在未建立连接时进行操作。
    #[error("未连接")]
    NotConnected,
}
