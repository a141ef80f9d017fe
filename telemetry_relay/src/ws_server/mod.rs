//! 面向观察端的 WebSocket 服务端。

pub mod broadcast_hub;
pub mod client_session;
pub mod message_router;
pub mod service;
