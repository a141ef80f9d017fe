//! `telemetry_relay` 遥测中继核心库。
//!
//! 把上游设备上多个独立的 WebSocket 数据流 (传感器阵列、激光测距、摄像头、热成像、IMU)
//! 中继给任意数量的观察端，并把观察端的指令经控制通道下发给设备。
//!
//! 主要模块包括：
//! - `config`: 配置的加载与全局访问。
//! - `decoders`: 激光扫描与热成像帧的二进制解码器。
//! - `error`: 应用特定的错误类型。
//! - `relay`: 每个端点一个任务的重连状态机、退避与控制通道。
//! - `ws_server`: 观察端 WebSocket 服务、广播中心与指令路由。

pub mod config;
pub mod decoders;
pub mod error;
pub mod relay;
pub mod ws_server;
