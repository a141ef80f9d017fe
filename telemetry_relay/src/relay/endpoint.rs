// telemetry_relay/src/relay/endpoint.rs

//! 单个上游端点的重连状态机。
//!
//! `Disconnected -> Connecting -> Connected -> Disconnected -> ...`，一直运行到任务被取消。
//! 链路建立后的具体行为 (解码转发或下发指令) 由 `LinkSession` 决定，
//! 状态推进、状态广播、退避与启动错峰则由 `EndpointConnection` 统一负责。

use crate::relay::backoff::Backoff;
use crate::relay::dispatch::envelope_for_frame;
use crate::relay::link::{UpstreamConnector, UpstreamLink};
use crate::ws_server::broadcast_hub::BroadcastHub;
use async_trait::async_trait;
use common_models::enums::{ConnectionState, EndpointName};
use log::{debug, info, warn};
use rust_websocket_utils::error::WsError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// 一条链路的生命周期内要做的事情。
#[async_trait]
pub trait LinkSession: Send {
    /// 链路刚建立、`Connected` 状态广播之前调用。
    fn on_link_up(&mut self) {}

    /// 持有链路直到其断开。返回 `None` 表示对端正常关闭，`Some(e)` 表示出错。
    async fn serve(&mut self, link: &mut dyn UpstreamLink) -> Option<WsError>;

    /// 链路断开 (或建立失败) 后、`Disconnected` 状态广播之前调用。
    fn on_link_down(&mut self) {}
}

/// 传感器端点：把每条上游消息按到达顺序解码并广播。
pub struct SensorSession {
    endpoint: EndpointName,
    hub: Arc<BroadcastHub>,
}

impl SensorSession {
    pub fn new(endpoint: EndpointName, hub: Arc<BroadcastHub>) -> Self {
        Self { endpoint, hub }
    }
}

#[async_trait]
impl LinkSession for SensorSession {
    async fn serve(&mut self, link: &mut dyn UpstreamLink) -> Option<WsError> {
        loop {
            match link.next_frame().await {
                Some(Ok(frame)) => {
                    if let Some(envelope) = envelope_for_frame(self.endpoint, frame) {
                        self.hub.broadcast(&envelope).await;
                    }
                }
                Some(Err(e)) => return Some(e),
                None => return None,
            }
        }
    }
}

/// 一个端点的重连循环。
pub struct EndpointConnection<S> {
    endpoint: EndpointName,
    connector: Arc<dyn UpstreamConnector>,
    hub: Arc<BroadcastHub>,
    backoff: Backoff,
    initial_delay: Duration,
    session: S,
}

impl<S: LinkSession> EndpointConnection<S> {
    pub fn new(
        endpoint: EndpointName,
        connector: Arc<dyn UpstreamConnector>,
        hub: Arc<BroadcastHub>,
        backoff: Backoff,
        session: S,
    ) -> Self {
        Self {
            endpoint,
            connector,
            hub,
            backoff,
            initial_delay: Duration::ZERO,
            session,
        }
    }

    /// 首次连接前的错峰等待，只生效一次，重连时不再等待。
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// 运行重连循环，直到所在任务被取消。
    pub async fn run(mut self) {
        if !self.initial_delay.is_zero() {
            debug!("[端点 {}] 启动错峰等待 {:?}", self.endpoint, self.initial_delay);
            sleep(self.initial_delay).await;
        }

        loop {
            self.connect_once().await;

            self.hub.transition(self.endpoint, ConnectionState::Disconnected, true).await;

            let delay = self.backoff.next_delay();
            info!("[端点 {}] {:?} 后重连", self.endpoint, delay);
            sleep(delay).await;
        }
    }

    async fn connect_once(&mut self) {
        self.hub.transition(self.endpoint, ConnectionState::Connecting, false).await;
        info!("[端点 {}] 正在连接上游 ...", self.endpoint);

        let mut link = match self.connector.connect(self.endpoint).await {
            Ok(link) => link,
            Err(e) => {
                warn!("[端点 {}] 连接失败: {}", self.endpoint, e);
                self.session.on_link_down();
                return;
            }
        };

        self.backoff.reset();
        self.session.on_link_up();
        info!("[端点 {}] 已连接", self.endpoint);
        self.hub.transition(self.endpoint, ConnectionState::Connected, true).await;

        match self.session.serve(link.as_mut()).await {
            Some(e) => warn!("[端点 {}] 链路中断: {}", self.endpoint, e),
            None => warn!("[端点 {}] 链路已被对端关闭", self.endpoint),
        }
        self.session.on_link_down();
        // 限时关闭，最多耽搁 close_timeout 后才广播 Disconnected 并进入退避等待
        link.close().await;
    }
}
