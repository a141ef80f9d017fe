// telemetry_relay/src/ws_server/broadcast_hub.rs

//! 广播中心：观察端集合与各端点连接状态的唯一持有者。
//!
//! 所有操作都在同一把异步互斥锁下串行执行，广播与加入/离开不会看到不完整的观察端集合。
//! 发送一律使用 `try_send`：出站队列已满或已关闭的观察端在本轮广播结束后被清理，
//! 不对上游施加背压。

use crate::ws_server::client_session::ClientSession;
use common_models::enums::{ConnectionState, EndpointName};
use common_models::ws_payloads::{Envelope, StatusSnapshot};
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
struct HubState {
    clients: HashMap<Uuid, Arc<ClientSession>>,
    connections: BTreeMap<EndpointName, ConnectionState>,
}

impl HubState {
    fn snapshot(&self) -> StatusSnapshot {
        EndpointName::ALL
            .iter()
            .map(|endpoint| {
                let state = self.connections.get(endpoint).copied().unwrap_or_default();
                (*endpoint, state.is_connected())
            })
            .collect()
    }

    /// 把同一段文本推给所有观察端，返回成功入队的数量。失败的观察端在遍历结束后移除。
    fn fan_out(&mut self, text: Arc<str>) -> usize {
        let mut delivered = 0;
        let mut failed = Vec::new();
        for (client_id, session) in &self.clients {
            if let Err(e) = session.sender.try_send(Arc::clone(&text)) {
                debug!("[广播中心] 向观察端 {} 推送消息失败: {}", client_id, e);
                failed.push(*client_id);
            } else {
                delivered += 1;
            }
        }
        for client_id in &failed {
            if let Some(session) = self.clients.remove(client_id) {
                warn!("[广播中心] 观察端 {} ({}) 出站队列不可用，已移除。", client_id, session.addr);
                session.request_close();
            }
        }
        delivered
    }

    fn broadcast(&mut self, envelope: &Envelope) -> usize {
        if self.clients.is_empty() {
            return 0;
        }
        match envelope.to_json() {
            Ok(text) => self.fan_out(Arc::from(text)),
            Err(e) => {
                error!("[广播中心] 序列化 {} 消息失败: {}", envelope.kind(), e);
                0
            }
        }
    }
}

/// 观察端广播中心。
#[derive(Debug, Default)]
pub struct BroadcastHub {
    state: Mutex<HubState>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个观察端，并在其它任何消息之前先推送当前状态快照。
    ///
    /// 快照无法入队时不登记该观察端，返回 `false`。
    pub async fn register(&self, session: Arc<ClientSession>) -> bool {
        let mut state = self.state.lock().await;
        let status = Envelope::Status { connections: state.snapshot() };
        let text = match status.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!("[广播中心] 序列化状态快照失败: {}", e);
                return false;
            }
        };
        if let Err(e) = session.sender.try_send(Arc::from(text)) {
            warn!("[广播中心] 向新观察端 {} 推送初始状态失败: {}", session.client_id, e);
            return false;
        }
        state.clients.insert(session.client_id, Arc::clone(&session));
        info!(
            "[广播中心] 观察端已连接: id={}, addr={} (当前共 {} 个)",
            session.client_id,
            session.addr,
            state.clients.len()
        );
        true
    }

    /// 注销观察端。重复注销无副作用。
    pub async fn unregister(&self, client_id: &Uuid) {
        let mut state = self.state.lock().await;
        if let Some(session) = state.clients.remove(client_id) {
            info!(
                "[广播中心] 观察端已断开: id={}, addr={}, 在线 {} 秒 (当前共 {} 个)",
                client_id,
                session.addr,
                session.connected_for().num_seconds(),
                state.clients.len()
            );
        }
    }

    /// 序列化一次并推送给所有观察端，返回成功入队的观察端数量。
    pub async fn broadcast(&self, envelope: &Envelope) -> usize {
        let mut state = self.state.lock().await;
        state.broadcast(envelope)
    }

    /// 在同一次加锁内记录端点的连接状态，并按需广播新的状态快照。
    ///
    /// 两个端点并发切换状态时，观察端收到的快照顺序与状态写入顺序一致，
    /// 最后一条快照总是反映最终状态。返回状态快照成功入队的观察端数量，未广播时为 0。
    pub async fn transition(&self, endpoint: EndpointName, connection: ConnectionState, publish: bool) -> usize {
        let mut state = self.state.lock().await;
        state.connections.insert(endpoint, connection);
        if !publish {
            return 0;
        }
        let status = Envelope::Status { connections: state.snapshot() };
        state.broadcast(&status)
    }

    /// 按所有端点 (含 `control`) 的当前状态重新计算快照并广播。
    pub async fn publish_status(&self) -> usize {
        let mut state = self.state.lock().await;
        let status = Envelope::Status { connections: state.snapshot() };
        state.broadcast(&status)
    }

    pub async fn status_snapshot(&self) -> StatusSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn connection_state(&self, endpoint: EndpointName) -> ConnectionState {
        self.state.lock().await.connections.get(&endpoint).copied().unwrap_or_default()
    }

    pub async fn client_count(&self) -> usize {
        self.state.lock().await.clients.len()
    }
}
