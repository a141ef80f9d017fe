//! 通用枚举模块。
//!
//! 本模块定义了遥测中继各组件之间共享的枚举类型：上游设备的端点名称
//! (`EndpointName`) 以及每个端点的连接状态 (`ConnectionState`)。
//!
//! 所有枚举都派生 `Serialize`, `Deserialize`, `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`，
//! `EndpointName` 额外派生 `Hash` 与 `Ord`，以便作为状态快照 (`BTreeMap`) 的键并保持固定顺序。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 上游设备上的一个具名数据流端点。
///
/// 成员的声明顺序即状态快照中的键顺序：先是五个传感器端点，最后是控制端点。
/// 序列化形式为小写字符串 (例如 `"lidar"`)，与端点的 URL 路径一致。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EndpointName {
    /// 主传感器阵列 (Arduino 下位机)，上行 JSON 文本。
    Arduino,
    /// 旋转激光测距仪，上行 5 字节记录组成的二进制扫描。
    Lidar,
    /// 摄像头，上行 JPEG 二进制帧。
    Camera,
    /// 热成像相机，上行带 12 字节头部的二进制帧。
    Flir,
    /// 惯性测量单元，上行 JSON 文本。
    Imu,
    /// 控制通道，仅用于向设备下发指令。
    Control,
}

impl EndpointName {
    /// 五个传感器端点，按启动错峰顺序排列。
    pub const SENSORS: [EndpointName; 5] = [
        EndpointName::Arduino,
        EndpointName::Lidar,
        EndpointName::Camera,
        EndpointName::Flir,
        EndpointName::Imu,
    ];

    /// 全部端点 (传感器端点 + 控制端点)。
    pub const ALL: [EndpointName; 6] = [
        EndpointName::Arduino,
        EndpointName::Lidar,
        EndpointName::Camera,
        EndpointName::Flir,
        EndpointName::Imu,
        EndpointName::Control,
    ];

    /// 端点的小写名称，同时也是其在设备 WebSocket 桥上的路径。
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointName::Arduino => "arduino",
            EndpointName::Lidar => "lidar",
            EndpointName::Camera => "camera",
            EndpointName::Flir => "flir",
            EndpointName::Imu => "imu",
            EndpointName::Control => "control",
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(self, EndpointName::Control)
    }

    /// 该端点上行的文本消息是否为需要转发的 JSON 记录。
    pub fn carries_json_records(&self) -> bool {
        matches!(self, EndpointName::Arduino | EndpointName::Imu)
    }
}

impl fmt::Display for EndpointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个端点的连接状态。
///
/// 状态只由拥有该端点的连接任务推进：
/// `Disconnected -> Connecting -> Connected -> Disconnected -> ...`，没有终止状态。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// 未连接 (初始状态，或链路丢失后处于退避等待中)。
    #[default]
    Disconnected,
    /// 正在建立链路。
    Connecting,
    /// 链路已建立。
    Connected,
}

impl ConnectionState {
    /// 状态快照中对外暴露的布尔连通性。只有 `Connected` 计为连通。
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}
