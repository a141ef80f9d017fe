//! `common_models` 公共模型库 crate。
//!
//! 本 crate 集中定义了遥测中继 (`telemetry_relay`) 与其观察端 (仪表盘等) 之间、
//! 以及中继与上游设备控制通道之间共享的核心数据结构和枚举类型。
//!
//! 主要包含以下类型的模型：
//! - **通用枚举 (`enums`)**: 上游端点名称 `EndpointName`、连接状态 `ConnectionState`。
//! - **WebSocket 消息负载 (`ws_payloads`)**: 广播信封 `Envelope`、激光扫描点
//!   `RangeScanPoint`、热成像帧 `ThermalFrame`、状态快照 `StatusSnapshot`、
//!   观察端指令 `ObserverCommand` 以及设备指令 `DeviceCommand`。
//!
//! 所有模型都派生 `serde::Serialize` / `serde::Deserialize`，线上格式即 JSON。

pub mod enums;
pub mod ws_payloads;

pub use enums::{ConnectionState, EndpointName};
pub use ws_payloads::{
    DeviceCommand, Envelope, ObserverCommand, RangeScanPoint, StatusSnapshot, ThermalFrame,
};
