// rust_websocket_utils/src/server/mod.rs

//! WebSocket 服务端模块。
//!
//! 负责在指定地址上监听、完成 WebSocket 握手，并把每个连接的发送端句柄
//! (`ConnectionHandler`) 与接收流交给上层回调处理。

pub mod transport;
