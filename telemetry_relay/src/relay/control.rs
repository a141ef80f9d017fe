//! 控制通道：向上游 `control` 端点下发指令。
//!
//! 链路由 `EndpointConnection<ControlSession>` 维护。每条链路建立时创建一个新的队列，
//! 断开时丢弃，因此指令不会跨链路排队，也不会重试。

use crate::relay::endpoint::LinkSession;
use crate::relay::link::UpstreamLink;
use async_trait::async_trait;
use log::{debug, warn};
use rust_websocket_utils::error::WsError;
use rust_websocket_utils::message::IncomingFrame;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

/// 每条控制链路上待发送指令的队列容量
const COMMAND_QUEUE_CAPACITY: usize = 32;

/// 一次 `send` 的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// 已交给当前存活的控制链路。
    Delivered,
    /// 没有存活的链路 (或链路队列已满)，指令被丢弃。
    Dropped,
}

/// 控制通道的发送端，可在多个任务间共享。
#[derive(Debug, Default)]
pub struct CommandChannel {
    link: RwLock<Option<mpsc::Sender<String>>>,
}

impl CommandChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前是否存在存活的控制链路。
    pub fn is_linked(&self) -> bool {
        match self.link.read() {
            Ok(guard) => guard.as_ref().is_some_and(|tx| !tx.is_closed()),
            Err(_) => false,
        }
    }

    /// 发送一条指令。没有存活链路时丢弃并记录警告，不返回错误。
    pub fn send(&self, payload: &Value) -> SendOutcome {
        let sender = match self.link.read() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        let Some(sender) = sender else {
            warn!("[控制通道] 指令被丢弃 (设备未连接): {}", payload);
            return SendOutcome::Dropped;
        };
        match sender.try_send(payload.to_string()) {
            Ok(()) => SendOutcome::Delivered,
            Err(e) => {
                warn!("[控制通道] 指令被丢弃 ({}): {}", e, payload);
                SendOutcome::Dropped
            }
        }
    }

    fn attach(&self) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        if let Ok(mut guard) = self.link.write() {
            *guard = Some(tx);
        }
        rx
    }

    fn detach(&self) {
        if let Ok(mut guard) = self.link.write() {
            *guard = None;
        }
    }
}

/// 控制端点的链路会话：转发 `CommandChannel` 中的指令，上游的文本回应只记录调试日志。
pub struct ControlSession {
    channel: Arc<CommandChannel>,
    commands: Option<mpsc::Receiver<String>>,
}

impl ControlSession {
    pub fn new(channel: Arc<CommandChannel>) -> Self {
        Self { channel, commands: None }
    }
}

enum ControlEvent {
    Inbound(Option<Result<IncomingFrame, WsError>>),
    Outbound(Option<String>),
}

#[async_trait]
impl LinkSession for ControlSession {
    fn on_link_up(&mut self) {
        self.commands = Some(self.channel.attach());
    }

    async fn serve(&mut self, link: &mut dyn UpstreamLink) -> Option<WsError> {
        let Some(commands) = self.commands.as_mut() else {
            return Some(WsError::NotConnected);
        };
        loop {
            let event = tokio::select! {
                frame = link.next_frame() => ControlEvent::Inbound(frame),
                command = commands.recv() => ControlEvent::Outbound(command),
            };
            match event {
                ControlEvent::Inbound(Some(Ok(IncomingFrame::Text(text)))) => {
                    debug!("[控制通道] 设备回应: {}", text);
                }
                ControlEvent::Inbound(Some(Ok(_))) => {}
                ControlEvent::Inbound(Some(Err(e))) => return Some(e),
                ControlEvent::Inbound(None) => return None,
                ControlEvent::Outbound(Some(command)) => {
                    if let Err(e) = link.send_text(command).await {
                        // 链路是否失效交给保活与接收路径判断
                        warn!("[控制通道] 发送指令失败: {}", e);
                    }
                }
                ControlEvent::Outbound(None) => return Some(WsError::SendErrorClosed),
            }
        }
    }

    fn on_link_down(&mut self) {
        self.channel.detach();
        self.commands = None;
    }
}
