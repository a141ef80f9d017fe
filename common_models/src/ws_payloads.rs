// common_models/src/ws_payloads.rs

//! 包含中继与观察端之间、以及中继与设备控制通道之间传输的各种 Payload 结构体定义。
//!
//! - 下行 (中继 -> 观察端)：`Envelope`，每条消息一个 JSON 对象，以 `type` 字段区分。
//! - 上行 (观察端 -> 中继)：`ObserverCommand`。
//! - 设备控制 (中继 -> 设备 `/control`)：`DeviceCommand`。

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

use crate::enums::EndpointName;

/// 电机驱动指令的操作码。
pub const MOTOR_OPCODE: u8 = 7;
/// 停止指令的操作码。
pub const STOP_OPCODE: u8 = 6;

/// 各端点 (含 `control`) 的布尔连通性快照。
///
/// 使用 `BTreeMap` 使键顺序固定为 `EndpointName` 的声明顺序。
pub type StatusSnapshot = BTreeMap<EndpointName, bool>;

/// 激光测距扫描中的单个有效采样点。
///
/// 序列化时字段名缩写为 `a` / `d` / `q`，以减小高频扫描消息的体积。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RangeScanPoint {
    /// 角度 (度)，范围 [0, 360)，保留一位小数。
    #[serde(rename = "a")]
    pub angle: f64,
    /// 距离 (毫米)，保留一位小数。
    #[serde(rename = "d")]
    pub distance: f64,
    /// 信号质量，恒大于等于 1 (质量为 0 的采样已被剔除)。
    #[serde(rename = "q")]
    pub quality: u8,
}

/// 一帧归一化后的热成像数据。
///
/// `pixels` 按接收顺序 (行优先) 排列，每个原始 16 位采样对应一个 [0, 255] 的像素值。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThermalFrame {
    pub width: u16,
    pub height: u16,
    /// 原始传感器单位下的最小值。
    pub min_val: u32,
    /// 原始传感器单位下的最大值。
    pub max_val: u32,
    pub pixels: Vec<u8>,
}

/// 广播给所有观察端的已解码消息。
///
/// 每个 `Envelope` 只由一条上游消息的成功解码产生，序列化一次后共享给所有接收者。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    /// 传感器阵列上行的 JSON 记录，原样转发。
    Arduino { data: Value },
    /// IMU 上行的 JSON 记录，原样转发。
    Imu { data: Value },
    /// 摄像头帧，JPEG 字节的 base64 文本。
    Camera { jpeg: String },
    /// 热成像帧。
    Flir(ThermalFrame),
    /// 一次激光扫描中的全部有效点。
    Lidar { points: Vec<RangeScanPoint> },
    /// 各端点连通性快照。
    Status { connections: StatusSnapshot },
}

impl Envelope {
    /// 为携带 JSON 记录的端点 (`arduino` / `imu`) 构造信封，其余端点返回 `None`。
    pub fn sensor_record(endpoint: EndpointName, data: Value) -> Option<Envelope> {
        match endpoint {
            EndpointName::Arduino => Some(Envelope::Arduino { data }),
            EndpointName::Imu => Some(Envelope::Imu { data }),
            _ => None,
        }
    }

    /// 消息的 `type` 标签，用于日志。
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Arduino { .. } => "arduino",
            Envelope::Imu { .. } => "imu",
            Envelope::Camera { .. } => "camera",
            Envelope::Flir(_) => "flir",
            Envelope::Lidar { .. } => "lidar",
            Envelope::Status { .. } => "status",
        }
    }

    /// 序列化为发送给观察端的 JSON 文本。
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn zero() -> Number {
    Number::from(0)
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// 观察端 (仪表盘) 发来的指令。
///
/// 无法解析为以下任一形状的消息一律忽略。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObserverCommand {
    /// 左右轮电机输出，缺省为 0。
    Motor {
        #[serde(default = "zero")]
        left: Number,
        #[serde(default = "zero")]
        right: Number,
    },
    /// 立即停车。
    Stop,
    /// 原样透传给设备控制通道的任意指令。
    Control {
        #[serde(default = "empty_object")]
        payload: Value,
    },
}

#[derive(Serialize)]
struct MotorDrive<'a> {
    #[serde(rename = "N")]
    opcode: u8,
    #[serde(rename = "D1")]
    left: &'a Number,
    #[serde(rename = "D2")]
    right: &'a Number,
}

#[derive(Serialize)]
struct Opcode {
    #[serde(rename = "N")]
    opcode: u8,
}

/// 发往设备 `/control` 端点、再由设备转交下位机的指令。
///
/// `cmd` 是下位机指令本身的 JSON 文本，例如 `{"N":6}`。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommand {
    pub target: String,
    pub cmd: String,
}

impl DeviceCommand {
    /// 电机驱动指令：`{"N":7,"D1":left,"D2":right}`，发往传感器阵列端点。
    pub fn motor(left: &Number, right: &Number) -> Result<Self, serde_json::Error> {
        let cmd = serde_json::to_string(&MotorDrive {
            opcode: MOTOR_OPCODE,
            left,
            right,
        })?;
        Ok(Self::for_sensor_array(cmd))
    }

    /// 停止指令：`{"N":6}`，发往传感器阵列端点。
    pub fn stop() -> Result<Self, serde_json::Error> {
        let cmd = serde_json::to_string(&Opcode { opcode: STOP_OPCODE })?;
        Ok(Self::for_sensor_array(cmd))
    }

    fn for_sensor_array(cmd: String) -> Self {
        Self {
            target: EndpointName::Arduino.as_str().to_string(),
            cmd,
        }
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lidar_envelope_uses_short_field_names() {
        let envelope = Envelope::Lidar {
            points: vec![RangeScanPoint { angle: 90.5, distance: 1234.2, quality: 15 }],
        };
        let value: Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "lidar", "points": [{"a": 90.5, "d": 1234.2, "q": 15}]}));
    }

    #[test]
    /// 热成像信封是扁平的：帧字段与 `type` 位于同一层，并使用 camelCase。
    fn test_flir_envelope_is_flat_camel_case() {
        let envelope = Envelope::Flir(ThermalFrame {
            width: 2,
            height: 1,
            min_val: 100,
            max_val: 200,
            pixels: vec![0, 255],
        });
        let value: Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "flir", "width": 2, "height": 1, "minVal": 100, "maxVal": 200, "pixels": [0, 255]})
        );
    }

    #[test]
    fn test_status_envelope_keeps_endpoint_order() {
        let connections: StatusSnapshot = EndpointName::ALL
            .into_iter()
            .map(|e| (e, e == EndpointName::Lidar))
            .collect();
        let text = Envelope::Status { connections }.to_json().unwrap();
        assert_eq!(
            text,
            r#"{"type":"status","connections":{"arduino":false,"lidar":true,"camera":false,"flir":false,"imu":false,"control":false}}"#
        );
    }

    #[test]
    fn test_sensor_record_only_for_json_endpoints() {
        let data = json!({"temp": 21});
        assert_eq!(
            Envelope::sensor_record(EndpointName::Imu, data.clone()),
            Some(Envelope::Imu { data: data.clone() })
        );
        assert!(Envelope::sensor_record(EndpointName::Lidar, data).is_none());
    }

    #[test]
    fn test_observer_command_shapes() {
        let motor: ObserverCommand = serde_json::from_str(r#"{"type":"motor","left":120,"right":-80}"#).unwrap();
        assert_eq!(
            motor,
            ObserverCommand::Motor { left: Number::from(120), right: Number::from(-80) }
        );

        let stop: ObserverCommand = serde_json::from_str(r#"{"type":"stop","extra":true}"#).unwrap();
        assert_eq!(stop, ObserverCommand::Stop);

        let control: ObserverCommand =
            serde_json::from_str(r#"{"type":"control","payload":{"target":"camera","cmd":"flash"}}"#).unwrap();
        assert_eq!(
            control,
            ObserverCommand::Control { payload: json!({"target": "camera", "cmd": "flash"}) }
        );
    }

    #[test]
    fn test_observer_command_defaults() {
        let motor: ObserverCommand = serde_json::from_str(r#"{"type":"motor"}"#).unwrap();
        assert_eq!(motor, ObserverCommand::Motor { left: Number::from(0), right: Number::from(0) });

        let control: ObserverCommand = serde_json::from_str(r#"{"type":"control"}"#).unwrap();
        assert_eq!(control, ObserverCommand::Control { payload: json!({}) });
    }

    #[test]
    fn test_observer_command_rejects_unknown_or_malformed() {
        assert!(serde_json::from_str::<ObserverCommand>(r#"{"type":"dance"}"#).is_err());
        assert!(serde_json::from_str::<ObserverCommand>(r#"{"left":1}"#).is_err());
        assert!(serde_json::from_str::<ObserverCommand>(r#"{"type":"motor","left":"fast"}"#).is_err());
        assert!(serde_json::from_str::<ObserverCommand>("not json").is_err());
    }

    #[test]
    fn test_device_commands_wrap_opcodes_for_sensor_array() {
        let stop = DeviceCommand::stop().unwrap();
        assert_eq!(stop.target, "arduino");
        assert_eq!(stop.cmd, r#"{"N":6}"#);

        let motor = DeviceCommand::motor(&Number::from(100), &Number::from(-100)).unwrap();
        assert_eq!(motor.cmd, r#"{"N":7,"D1":100,"D2":-100}"#);
        assert_eq!(
            motor.to_value().unwrap(),
            json!({"target": "arduino", "cmd": "{\"N\":7,\"D1\":100,\"D2\":-100}"})
        );
    }
}
