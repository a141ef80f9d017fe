// rust_websocket_utils/src/client/mod.rs

//! WebSocket 客户端模块。
//!
//! 提供连接远程 WebSocket 服务器、收发消息以及保活 Ping 的传输层封装。

pub mod transport; // 主要的客户端传输层逻辑
