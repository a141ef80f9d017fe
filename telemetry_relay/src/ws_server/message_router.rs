// telemetry_relay/src/ws_server/message_router.rs

//! 负责处理观察端发来的 WebSocket 文本消息，并把指令转交控制通道。

use crate::relay::control::{CommandChannel, SendOutcome};
use common_models::ws_payloads::{DeviceCommand, ObserverCommand};
use log::{debug, info, warn};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 每隔多少条电机指令记录一次 info 日志
const MOTOR_LOG_EVERY: u64 = 20;

/// 观察端指令路由。
#[derive(Debug)]
pub struct Router {
    commands: Arc<CommandChannel>,
    motor_count: AtomicU64,
}

impl Router {
    pub fn new(commands: Arc<CommandChannel>) -> Self {
        Self {
            commands,
            motor_count: AtomicU64::new(0),
        }
    }

    /// 处理一条观察端消息。
    ///
    /// # 返回
    /// 成功识别的指令返回控制通道的发送结果；格式错误或未知类型的消息被忽略，返回 `None`。
    pub fn handle_text(&self, text: &str) -> Option<SendOutcome> {
        let command = match serde_json::from_str::<ObserverCommand>(text) {
            Ok(command) => command,
            Err(e) => {
                debug!("[消息路由] 忽略无法识别的观察端消息: {} ({})", text, e);
                return None;
            }
        };

        let payload = match command {
            ObserverCommand::Motor { left, right } => {
                let count = self.motor_count.fetch_add(1, Ordering::Relaxed) + 1;
                if count % MOTOR_LOG_EVERY == 1 {
                    info!("[消息路由] 电机: L={} R={} (第 {} 条)", left, right, count);
                }
                device_payload(DeviceCommand::motor(&left, &right))?
            }
            ObserverCommand::Stop => device_payload(DeviceCommand::stop())?,
            ObserverCommand::Control { payload } => payload,
        };
        Some(self.commands.send(&payload))
    }

    /// 已处理的电机指令总数。
    pub fn motor_commands_seen(&self) -> u64 {
        self.motor_count.load(Ordering::Relaxed)
    }
}

fn device_payload(command: Result<DeviceCommand, serde_json::Error>) -> Option<Value> {
    match command.and_then(|command| command.to_value()) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("[消息路由] 构造设备指令失败: {}", e);
            None
        }
    }
}
