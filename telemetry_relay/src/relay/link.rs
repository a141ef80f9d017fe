//! 上游链路抽象。
//!
//! 端点连接的状态机只依赖 `UpstreamConnector` / `UpstreamLink` 两个 trait，
//! 生产环境使用基于 `rust_websocket_utils` 客户端的 `DeviceConnector`，
//! 测试中可以替换为不做网络 I/O 的实现。

use crate::config::DeviceConfig;
use async_trait::async_trait;
use common_models::enums::EndpointName;
use log::debug;
use rust_websocket_utils::client::transport::{ClientConnection, connect_client_with_options};
use rust_websocket_utils::error::WsError;
use rust_websocket_utils::message::IncomingFrame;

/// 一条已建立的上游链路。
#[async_trait]
pub trait UpstreamLink: Send {
    /// 下一条数据消息；`None` 表示链路已被对端关闭。
    async fn next_frame(&mut self) -> Option<Result<IncomingFrame, WsError>>;

    async fn send_text(&mut self, text: String) -> Result<(), WsError>;

    /// 主动关闭链路，错误只记录不返回。
    async fn close(&mut self);
}

/// 为指定端点建立上游链路。
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    async fn connect(&self, endpoint: EndpointName) -> Result<Box<dyn UpstreamLink>, WsError>;
}

#[async_trait]
impl UpstreamLink for ClientConnection {
    async fn next_frame(&mut self) -> Option<Result<IncomingFrame, WsError>> {
        self.receive_frame().await
    }

    async fn send_text(&mut self, text: String) -> Result<(), WsError> {
        ClientConnection::send_text(self, text).await
    }

    async fn close(&mut self) {
        ClientConnection::close(self).await
    }
}

/// 连接真实设备的 WebSocket 桥接服务。
#[derive(Debug, Clone)]
pub struct DeviceConnector {
    device: DeviceConfig,
}

impl DeviceConnector {
    pub fn new(device: DeviceConfig) -> Self {
        Self { device }
    }
}

#[async_trait]
impl UpstreamConnector for DeviceConnector {
    async fn connect(&self, endpoint: EndpointName) -> Result<Box<dyn UpstreamLink>, WsError> {
        let url = self.device.endpoint_url(endpoint);
        debug!("[上游连接器] 正在连接 {}", url);
        let connection = connect_client_with_options(&url, self.device.client_options()).await?;
        Ok(Box::new(connection))
    }
}
