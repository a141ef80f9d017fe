//! 把一条上游消息转换成广播信封。

use crate::decoders::{decode_range_scan, decode_thermal_frame};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common_models::enums::EndpointName;
use common_models::ws_payloads::Envelope;
use log::debug;
use rust_websocket_utils::message::IncomingFrame;
use serde_json::Value;

/// 按端点与消息类型选择处理方式：
///
/// - `arduino` / `imu` 的文本：解析为 JSON 后原样包装，格式错误的文本被丢弃；
/// - `camera` 的二进制：base64 编码的 JPEG；
/// - `flir` 的二进制：热成像帧解码；
/// - `lidar` 的二进制：激光扫描解码，没有有效点时不产生消息；
/// - 其它组合一律忽略。
pub fn envelope_for_frame(endpoint: EndpointName, frame: IncomingFrame) -> Option<Envelope> {
    match (endpoint, frame) {
        (endpoint, IncomingFrame::Text(text)) if endpoint.carries_json_records() => {
            match serde_json::from_str::<Value>(&text) {
                Ok(data) => Envelope::sensor_record(endpoint, data),
                Err(e) => {
                    debug!("[端点 {}] 丢弃无法解析的 JSON ({} 字节): {}", endpoint, text.len(), e);
                    None
                }
            }
        }
        (EndpointName::Camera, IncomingFrame::Binary(jpeg)) => Some(Envelope::Camera {
            jpeg: STANDARD.encode(jpeg),
        }),
        (EndpointName::Flir, IncomingFrame::Binary(bytes)) => match decode_thermal_frame(&bytes) {
            Some(frame) => Some(Envelope::Flir(frame)),
            None => {
                debug!("[端点 flir] 丢弃过短的热成像帧 ({} 字节)", bytes.len());
                None
            }
        },
        (EndpointName::Lidar, IncomingFrame::Binary(bytes)) => {
            let points = decode_range_scan(&bytes);
            if points.is_empty() {
                None
            } else {
                Some(Envelope::Lidar { points })
            }
        }
        (endpoint, frame) => {
            debug!("[端点 {}] 忽略 {} 消息 ({} 字节)", endpoint, frame.kind(), frame.len());
            None
        }
    }
}
