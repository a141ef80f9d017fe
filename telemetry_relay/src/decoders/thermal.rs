//! 热成像帧解码。
//!
//! 帧格式 (全部小端)：u16 宽度、u16 高度、u32 最小值、u32 最大值，
//! 之后是逐像素的 u16 原始读数，按行优先排列。

use common_models::ws_payloads::ThermalFrame;

/// 帧头字节数
pub const HEADER_LEN: usize = 12;

/// 解码一帧热成像数据。不足 12 字节时返回 `None`；帧体末尾落单的奇数字节被忽略。
///
/// 每个原始读数按帧头中的 `[min, max]` 线性映射到 0..=255，中点取偶后截断到范围内；
/// `max <= min` 时按跨度 1 处理。
pub fn decode_thermal_frame(bytes: &[u8]) -> Option<ThermalFrame> {
    if bytes.len() < HEADER_LEN {
        return None;
    }
    let (header, body) = bytes.split_at(HEADER_LEN);
    let width = u16::from_le_bytes([header[0], header[1]]);
    let height = u16::from_le_bytes([header[2], header[3]]);
    let min_val = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    let max_val = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);

    let range = (i64::from(max_val) - i64::from(min_val)).max(1) as f64;
    let pixels = body
        .chunks_exact(2)
        .map(|sample| {
            let raw = i64::from(u16::from_le_bytes([sample[0], sample[1]]));
            let scaled = ((raw - i64::from(min_val)) as f64 * 255.0 / range).round_ties_even();
            scaled.clamp(0.0, 255.0) as u8
        })
        .collect();

    Some(ThermalFrame {
        width,
        height,
        min_val,
        max_val,
        pixels,
    })
}
