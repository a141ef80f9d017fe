// telemetry_relay/src/ws_server/service.rs

//! 观察端 WebSocket 服务：接受连接、登记会话、转发指令。

use crate::config::ObserverConfig;
use crate::ws_server::broadcast_hub::BroadcastHub;
use crate::ws_server::client_session::ClientSession;
use crate::ws_server::message_router::Router;
use anyhow::{Context, Result};
use futures_util::stream::SplitStream;
use log::{debug, error, info, warn};
use rust_websocket_utils::message::IncomingFrame;
use rust_websocket_utils::server::transport::{
    ConnectionHandler, ServerTransport, WsStream, receive_message,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// 观察端 WebSocket 服务。
pub struct ObserverService {
    transport: ServerTransport,
    hub: Arc<BroadcastHub>,
    router: Arc<Router>,
    queue_capacity: usize,
}

impl ObserverService {
    /// 绑定监听地址。
    pub async fn bind(config: &ObserverConfig, hub: Arc<BroadcastHub>, router: Arc<Router>) -> Result<Self> {
        let listen_addr = config.listen_addr();
        let transport = ServerTransport::bind(listen_addr.as_str())
            .await
            .with_context(|| format!("观察端服务绑定 {} 失败", listen_addr))?;
        info!("[观察端服务] 已绑定 {}", listen_addr);
        Ok(Self {
            transport,
            hub,
            router,
            queue_capacity: config.client_queue_capacity.max(1),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.transport.local_addr()?)
    }

    /// 持续接受观察端连接，直到任务被取消或监听出错。
    pub async fn run(self) -> Result<()> {
        let hub = self.hub;
        let router = self.router;
        let queue_capacity = self.queue_capacity;

        let on_new_connection = move |handler: ConnectionHandler, receiver: SplitStream<WsStream>| {
            let hub = Arc::clone(&hub);
            let router = Arc::clone(&router);
            async move { handle_connection(handler, receiver, hub, router, queue_capacity).await }
        };

        self.transport
            .serve(on_new_connection)
            .await
            .context("观察端 WebSocket 服务异常停止")?;
        warn!("[观察端服务] WebSocket 服务已停止。");
        Ok(())
    }
}

async fn handle_connection(
    mut handler: ConnectionHandler,
    mut receiver: SplitStream<WsStream>,
    hub: Arc<BroadcastHub>,
    router: Arc<Router>,
    queue_capacity: usize,
) {
    let (tx, mut rx) = mpsc::channel::<Arc<str>>(queue_capacity);
    let session = Arc::new(ClientSession::new(handler.peer_addr(), tx));
    let client_id = session.client_id;

    if !hub.register(Arc::clone(&session)).await {
        handler.close().await;
        return;
    }

    // 发送任务：把出站队列写入套接字。写入本身也与关闭请求赛跑，
    // 对端停止读取、写入卡在满的发送缓冲区时，广播中心的清理仍能让连接结束。
    let sender_session = Arc::clone(&session);
    let sender_task = tokio::spawn(async move {
        loop {
            let text = tokio::select! {
                biased;
                _ = sender_session.closed() => break,
                next = rx.recv() => match next {
                    Some(text) => text,
                    None => break,
                },
            };
            tokio::select! {
                biased;
                _ = sender_session.closed() => break,
                sent = handler.send_text(&text) => {
                    if let Err(e) = sent {
                        debug!("[观察端 {}] 发送失败，判定连接已断开: {}", client_id, e);
                        sender_session.request_close();
                        break;
                    }
                }
            }
        }
        debug!("[观察端 {}] 发送任务结束，关闭连接。", client_id);
        handler.close().await;
    });

    loop {
        let received = tokio::select! {
            biased;
            _ = session.closed() => {
                debug!("[观察端 {}] 收到关闭请求，停止接收。", client_id);
                break;
            }
            received = receive_message(&mut receiver) => received,
        };
        match received {
            Some(Ok(IncomingFrame::Text(text))) => {
                router.handle_text(&text);
            }
            Some(Ok(IncomingFrame::Binary(bytes))) => {
                debug!("[观察端 {}] 忽略二进制消息 ({} 字节)", client_id, bytes.len());
            }
            Some(Err(e)) => {
                warn!("[观察端 {}] 接收出错，断开连接: {}", client_id, e);
                break;
            }
            None => {
                debug!("[观察端 {}] 连接已被对端关闭。", client_id);
                break;
            }
        }
    }

    hub.unregister(&client_id).await;
    session.request_close();
    if let Err(e) = sender_task.await {
        error!("[观察端 {}] 发送任务异常结束: {}", client_id, e);
    }
}
