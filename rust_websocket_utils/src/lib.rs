//! `rust_websocket_utils` 是一个提供 WebSocket 通信实用功能的 Rust Crate。
//! 它封装 `tokio-tungstenite` 的细节，为遥测中继提供简洁的客户端与服务端传输层。
//!
//! 主要模块包括：
//! - `message`: 向上层暴露的数据帧 `IncomingFrame`。
//! - `error`: 库中使用的错误类型 `WsError`。
//! - `server`: WebSocket 服务器端传输层。
//! - `client`: WebSocket 客户端传输层，支持可调的保活与消息大小上限。

pub mod client;
pub mod error;
pub mod message;
pub mod server;

pub use error::WsError;
pub use message::IncomingFrame;
