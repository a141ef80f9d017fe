// rust_websocket_utils/src/message.rs

//! 定义 WebSocket 通信中向上层暴露的数据帧。
//!
//! 底层 `tungstenite::Message` 里的 Ping / Pong / Close 等控制帧由本库内部消化，
//! 上层只会看到 `IncomingFrame::Text` 或 `IncomingFrame::Binary` 两类数据帧。

use crate::error::WsError;
use futures_util::{StreamExt, stream::Stream};
use log::debug;
use tokio_tungstenite::tungstenite::{Error as TungsteniteError, protocol::Message};

/// 从对端收到的一条数据消息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingFrame {
    /// UTF-8 文本消息。
    Text(String),
    /// 二进制消息。
    Binary(Vec<u8>),
}

impl IncomingFrame {
    /// 消息负载的字节长度。
    pub fn len(&self) -> usize {
        match self {
            IncomingFrame::Text(text) => text.len(),
            IncomingFrame::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 帧类型名称，用于日志。
    pub fn kind(&self) -> &'static str {
        match self {
            IncomingFrame::Text(_) => "text",
            IncomingFrame::Binary(_) => "binary",
        }
    }
}

/// 对一条底层消息的分类结果。
#[derive(Debug)]
pub(crate) enum Inbound {
    Data(IncomingFrame),
    Pong,
    /// Ping / 原始 Frame 等无需上层处理的控制帧。
    Control,
    Closed,
}

pub(crate) fn classify_message(msg: Message) -> Inbound {
    match msg {
        Message::Text(text) => Inbound::Data(IncomingFrame::Text(text)),
        Message::Binary(bytes) => Inbound::Data(IncomingFrame::Binary(bytes)),
        Message::Pong(_) => Inbound::Pong,
        // Ping 由 tokio-tungstenite 自动回复 Pong
        Message::Ping(_) | Message::Frame(_) => Inbound::Control,
        Message::Close(close_frame) => {
            debug!("收到 Close 控制帧，详细信息: {:?}", close_frame);
            Inbound::Closed
        }
    }
}

/// 从接收流中取出下一条数据帧，跳过控制帧。
///
/// 返回 `None` 表示连接已关闭 (收到 Close 帧、流耗尽或底层报告连接已关闭)。
pub(crate) async fn next_data_frame<S>(stream: &mut S) -> Option<Result<IncomingFrame, WsError>>
where
    S: Stream<Item = Result<Message, TungsteniteError>> + Unpin,
{
    loop {
        match stream.next().await {
            Some(Ok(msg)) => match classify_message(msg) {
                Inbound::Data(frame) => return Some(Ok(frame)),
                Inbound::Pong | Inbound::Control => continue,
                Inbound::Closed => return None,
            },
            Some(Err(TungsteniteError::ConnectionClosed | TungsteniteError::AlreadyClosed)) => {
                return None;
            }
            Some(Err(e)) => return Some(Err(WsError::WebSocketProtocolError(e))),
            None => return None,
        }
    }
}
