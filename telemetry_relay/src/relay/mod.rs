//! 中继引擎：每个上游端点一个任务。
//!
//! 五个传感器端点按 `arduino, lidar, camera, flir, imu` 的顺序依次错峰启动，
//! 控制端点排在最后。

pub mod backoff;
pub mod control;
pub mod dispatch;
pub mod endpoint;
pub mod link;

use crate::config::RelayConfig;
use crate::relay::control::{CommandChannel, ControlSession};
use crate::relay::endpoint::{EndpointConnection, SensorSession};
use crate::relay::link::UpstreamConnector;
use crate::ws_server::broadcast_hub::BroadcastHub;
use common_models::enums::EndpointName;
use log::info;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// 已启动的端点任务集合。
pub struct RelayHandle {
    tasks: Vec<(EndpointName, JoinHandle<()>)>,
}

impl RelayHandle {
    pub fn endpoints(&self) -> Vec<EndpointName> {
        self.tasks.iter().map(|(endpoint, _)| *endpoint).collect()
    }

    /// 取消所有端点任务。退避等待与接收都会立即中断。
    pub async fn shutdown(self) {
        for (_, task) in &self.tasks {
            task.abort();
        }
        for (endpoint, task) in self.tasks {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    log::error!("[中继引擎] 端点 {} 的任务异常结束: {}", endpoint, e);
                }
            }
        }
        info!("[中继引擎] 所有端点任务已停止。");
    }
}

/// 为所有端点派生重连任务。
pub fn spawn_relay(
    config: &RelayConfig,
    connector: Arc<dyn UpstreamConnector>,
    hub: Arc<BroadcastHub>,
    commands: Arc<CommandChannel>,
) -> RelayHandle {
    let stagger = config.device.stagger();
    let mut tasks = Vec::with_capacity(EndpointName::ALL.len());

    for (index, endpoint) in EndpointName::SENSORS.into_iter().enumerate() {
        let connection = EndpointConnection::new(
            endpoint,
            Arc::clone(&connector),
            Arc::clone(&hub),
            config.backoff.build(),
            SensorSession::new(endpoint, Arc::clone(&hub)),
        )
        .with_initial_delay(stagger * index as u32);
        tasks.push((endpoint, tokio::spawn(connection.run())));
    }

    let control = EndpointConnection::new(
        EndpointName::Control,
        connector,
        hub,
        config.backoff.build(),
        ControlSession::new(commands),
    )
    .with_initial_delay(stagger * EndpointName::SENSORS.len() as u32);
    tasks.push((EndpointName::Control, tokio::spawn(control.run())));

    info!("[中继引擎] 已启动 {} 个端点任务，错峰间隔 {:?}", tasks.len(), stagger);
    RelayHandle { tasks }
}
